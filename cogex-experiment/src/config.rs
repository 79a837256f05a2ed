use cogex_core::{CaptureKind, KeyChoices};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Beats played by the `beginning` metronome condition.
pub const BEGINNING_BEATS: u32 = 10;

/// Per-trial parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    pub stimulus: Option<PathBuf>,
    pub trial_duration_ms: Option<u64>,
    pub trial_ends_after_audio: bool,
    pub click_to_start: bool,
    pub response_ends_trial: bool,
    pub choices: KeyChoices,
    pub capture: Option<CaptureKind>,
    pub metronome: Option<MetronomeConfig>,
    pub sequence: SequenceConfig,
    pub poll_interval_ms: u64,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            stimulus: None,
            trial_duration_ms: None,
            trial_ends_after_audio: false,
            click_to_start: true,
            response_ends_trial: false,
            choices: KeyChoices::All,
            capture: None,
            metronome: None,
            sequence: SequenceConfig::default(),
            poll_interval_ms: 1,
        }
    }
}

impl TrialConfig {
    pub fn trial_duration(&self) -> Option<Duration> {
        self.trial_duration_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// File name of the stimulus, without its directories.
    pub fn stimulus_name(&self) -> Option<String> {
        self.stimulus.as_ref().map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.to_string_lossy().into_owned())
        })
    }
}

/// When the metronome plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetronomeCondition {
    None,
    /// A fixed count-in of [`BEGINNING_BEATS`].
    Beginning,
    #[default]
    Throughout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    pub bpm: f64,
    /// Stop after this many ticks. Absent means until the trial ends.
    pub beats: Option<NonZeroU32>,
    pub condition: MetronomeCondition,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            bpm: 85.0,
            beats: None,
            condition: MetronomeCondition::Throughout,
        }
    }
}

impl MetronomeConfig {
    /// Tempo and beat bound to start the generator with, or `None` for no metronome.
    pub fn plan(&self) -> Option<(f64, Option<NonZeroU32>)> {
        match self.condition {
            MetronomeCondition::None => None,
            MetronomeCondition::Beginning => Some((self.bpm, NonZeroU32::new(BEGINNING_BEATS))),
            MetronomeCondition::Throughout => Some((self.bpm, self.beats)),
        }
    }
}

/// How a frame list is laid out in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub frame_interval_ms: u64,
    pub iterations: usize,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 1000,
            iterations: 1,
        }
    }
}

impl SequenceConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_plugin_parameters() {
        let config: TrialConfig = serde_json::from_str("{}").unwrap();
        assert!(config.click_to_start);
        assert!(!config.trial_ends_after_audio);
        assert_eq!(config.trial_duration(), None);
        assert_eq!(config.choices, KeyChoices::All);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn midi_recording_config() {
        let config: TrialConfig = serde_json::from_str(
            r#"{
                "trial_duration_ms": 30000,
                "capture": "midi",
                "metronome": { "bpm": 85, "condition": "beginning" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.capture, Some(CaptureKind::Midi));
        let metronome = config.metronome.unwrap();
        assert_eq!(metronome.plan(), Some((85.0, NonZeroU32::new(10))));
    }

    #[test]
    fn metronome_plans() {
        let mut m = MetronomeConfig::default();
        assert_eq!(m.plan(), Some((85.0, None)));
        m.beats = NonZeroU32::new(4);
        assert_eq!(m.plan(), Some((85.0, NonZeroU32::new(4))));
        m.condition = MetronomeCondition::None;
        assert_eq!(m.plan(), None);
    }

    #[test]
    fn zero_beats_is_rejected() {
        let parsed: Result<MetronomeConfig, _> = serde_json::from_str(r#"{"beats": 0}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn stimulus_name_strips_directories() {
        let config = TrialConfig {
            stimulus: Some(PathBuf::from("audio/set1/song.mp3")),
            ..Default::default()
        };
        assert_eq!(config.stimulus_name().as_deref(), Some("song.mp3"));
    }
}
