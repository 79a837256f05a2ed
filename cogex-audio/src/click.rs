use anyhow::Context;
use cogex_core::{AudioError, TickSink};
use kira::AudioManager;
use kira::sound::static_sound::StaticSoundData;
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};

pub const CLICK_SAMPLE_RATE: u32 = 44_100;
pub const CLICK_FREQUENCY_HZ: f32 = 440.0;
pub const CLICK_SECONDS: f32 = 0.1;

/// A 440 Hz sine beep, 100 ms long, with an exponential decay so it ends
/// without a pop.
pub fn click_samples(sample_rate: u32) -> Vec<f32> {
    let len = (sample_rate as f32 * CLICK_SECONDS) as usize;
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let envelope = (-t * 40.0).exp();
            (t * CLICK_FREQUENCY_HZ * std::f32::consts::TAU).sin() * envelope * 0.8
        })
        .collect()
}

/// Encodes the click as a mono float WAV in memory.
pub fn click_wav(sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::new(&mut cursor, spec).context("creating click writer")?;
    for sample in click_samples(sample_rate) {
        writer.write_sample(sample).context("writing click sample")?;
    }
    writer.finalize().context("finalizing click")?;
    Ok(cursor.into_inner())
}

/// Plays one click per metronome beat on the shared manager.
pub struct ClickTrack {
    manager: Arc<Mutex<AudioManager>>,
    click: StaticSoundData,
}

impl ClickTrack {
    pub fn new(manager: Arc<Mutex<AudioManager>>) -> Result<Self, AudioError> {
        let wav = click_wav(CLICK_SAMPLE_RATE).map_err(|e| AudioError::Synthesis(format!("{e:#}")))?;
        let click = StaticSoundData::from_cursor(Cursor::new(wav))
            .map_err(|e| AudioError::Synthesis(e.to_string()))?;
        Ok(Self { manager, click })
    }
}

impl TickSink for ClickTrack {
    fn tick(&mut self, beat: u32) {
        let played = self
            .manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .play(self.click.clone());
        if let Err(err) = played {
            log::warn!("metronome beat {beat} not played: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_is_a_decaying_tenth_of_a_second() {
        let samples = click_samples(CLICK_SAMPLE_RATE);
        assert_eq!(samples.len(), 4_410);

        let peak = |s: &[f32]| s.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        let head = peak(&samples[..441]);
        let tail = peak(&samples[samples.len() - 441..]);
        assert!(head > 0.5);
        assert!(tail < head * 0.1);
    }

    #[test]
    fn click_wav_carries_every_sample() {
        let wav = click_wav(8_000).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.len(), 800);
    }
}
