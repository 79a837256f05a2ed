use anyhow::{Context, Result};
use cogex_core::{FrameAction, PresentationEvent};
use cogex_experiment::{QuestionSpec, TrialConfig, frame_sequence, shuffled_layout};
use rand::Rng;
use serde::Deserialize;
use std::path::Path;

/// One frame of an image/text sequence.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameSpec {
    pub images: Vec<String>,
    pub text: Option<String>,
}

/// A trial description on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrialFile {
    pub config: TrialConfig,
    pub frames: Vec<FrameSpec>,
    pub questions: Vec<QuestionSpec>,
    /// Images shuffled into lettered slots at trial onset.
    pub layout: Vec<String>,
}

/// The presentation timeline plus the slot assignment it used.
pub struct Timeline {
    pub events: Vec<PresentationEvent<FrameAction>>,
    pub layout: Vec<(String, String)>,
}

impl TrialFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read trial file {}", path.display()))?;
        let mut file: TrialFile = serde_json::from_str(&text)
            .with_context(|| format!("invalid trial file {}", path.display()))?;
        if let (Some(stimulus), Some(dir)) = (file.config.stimulus.as_mut(), path.parent()) {
            if stimulus.is_relative() {
                *stimulus = dir.join(&*stimulus);
            }
        }
        Ok(file)
    }

    pub fn timeline<R: Rng + ?Sized>(&self, rng: &mut R) -> Timeline {
        let layout = shuffled_layout(&self.layout, rng);
        let mut events = Vec::new();
        if !layout.is_empty() {
            events.push(PresentationEvent::at_millis(
                0,
                FrameAction::ShowLayout {
                    slots: layout.clone(),
                },
            ));
        }
        let frames: Vec<FrameAction> = self
            .frames
            .iter()
            .enumerate()
            .map(|(frame, spec)| FrameAction::ShowFrame {
                frame,
                images: spec.images.clone(),
                text: spec.text.clone(),
            })
            .collect();
        let sequence = &self.config.sequence;
        events.extend(frame_sequence(
            &frames,
            sequence.frame_interval(),
            sequence.iterations,
        ));
        Timeline { events, layout }
    }
}

/// "A=x.png,B=y.png" for the report.
pub fn describe_layout(layout: &[(String, String)]) -> String {
    layout
        .iter()
        .map(|(slot, image)| format!("{slot}={image}"))
        .collect::<Vec<_>>()
        .join(",")
}
