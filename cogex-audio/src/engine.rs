use crate::click::ClickTrack;
use crate::playback::{AudioClock, CLOCK_TICKS_PER_SECOND, KiraPlayback};
use anyhow::Context;
use cogex_core::{AudioError, AudioLoader, LoadError, PlaybackHandle};
use kira::clock::ClockSpeed;
use kira::sound::static_sound::StaticSoundData;
use kira::{AudioManager, AudioManagerSettings, DefaultBackend};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// The platform audio context, shared by stimulus playback and the metronome.
#[derive(Clone)]
pub struct KiraAudio {
    manager: Arc<Mutex<AudioManager>>,
}

impl KiraAudio {
    pub fn new() -> anyhow::Result<Self> {
        let manager = AudioManager::<DefaultBackend>::new(AudioManagerSettings::default())
            .context("failed to open the audio device")?;
        log::info!("audio engine ready");
        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
        })
    }

    pub fn click_track(&self) -> Result<ClickTrack, AudioError> {
        ClickTrack::new(self.manager.clone())
    }

    fn load_playback(&self, path: PathBuf) -> Result<Box<dyn PlaybackHandle>, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound { path });
        }
        let data = StaticSoundData::from_file(&path).map_err(|e| LoadError::Decode {
            reason: e.to_string(),
            path: path.clone(),
        })?;
        log::debug!("decoded {} ({:?})", path.display(), data.duration());

        let clock = self
            .manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_clock(ClockSpeed::TicksPerSecond(CLOCK_TICKS_PER_SECOND));
        let clock = match clock {
            Ok(handle) => Some(AudioClock::new(handle)),
            Err(err) => {
                log::warn!("no engine clock for {}, timing on the wall clock: {err}", path.display());
                None
            }
        };
        Ok(Box::new(KiraPlayback::new(self.manager.clone(), data, clock)))
    }
}

impl AudioLoader for KiraAudio {
    fn load(
        &mut self,
        source: &Path,
    ) -> impl Future<Output = Result<Box<dyn PlaybackHandle>, LoadError>> {
        let path = source.to_path_buf();
        let engine = self.clone();
        async move { engine.load_playback(path) }
    }
}
