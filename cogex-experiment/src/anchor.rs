use cogex_core::{AudioError, AudioLoader, LoadError, PlaybackHandle};
use cogex_timing::{Clock, ClockSource, ClockValue};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loaded stimulus whose playback onset becomes the trial's anchor time.
pub struct AudioAnchor {
    handle: Box<dyn PlaybackHandle>,
    source: PathBuf,
    started: bool,
    stopped: bool,
    watching_end: bool,
    end_reported: bool,
}

impl AudioAnchor {
    pub async fn load<L: AudioLoader>(loader: &mut L, source: &Path) -> Result<Self, LoadError> {
        let handle = loader.load(source).await?;
        log::info!("loaded stimulus {}", source.display());
        Ok(Self::new(handle, source))
    }

    pub fn new(handle: Box<dyn PlaybackHandle>, source: &Path) -> Self {
        Self {
            handle,
            source: source.to_path_buf(),
            started: false,
            stopped: false,
            watching_end: false,
            end_reported: false,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn engine_clock(&self) -> Option<Arc<dyn Clock>> {
        self.handle.engine_clock()
    }

    /// Starts playback and anchors `clock` at the onset.
    pub fn start(&mut self, clock: &mut ClockSource) -> Result<ClockValue, AudioError> {
        if self.started {
            return Ok(clock.start());
        }
        self.handle.play()?;
        self.started = true;
        let anchor = clock.start();
        log::info!("audio onset at {anchor} on the {:?} clock", clock.kind());
        Ok(anchor)
    }

    /// Registers interest in the end of playback; see [`AudioAnchor::poll_ended`].
    pub fn on_ended(&mut self) {
        self.watching_end = true;
    }

    pub fn clear_on_ended(&mut self) {
        self.watching_end = false;
    }

    /// True exactly once, on the first poll after playback reached the end
    /// while registered.
    pub fn poll_ended(&mut self) -> bool {
        if !self.watching_end || !self.started || self.stopped || self.end_reported {
            return false;
        }
        if self.handle.has_ended() {
            self.end_reported = true;
            log::debug!("stimulus {} finished playing", self.source.display());
            return true;
        }
        false
    }

    pub fn is_playing(&self) -> bool {
        self.started && !self.stopped && !self.handle.has_ended()
    }

    /// Stops playback and drops the end registration. Idempotent.
    pub fn stop(&mut self) {
        self.watching_end = false;
        if self.stopped {
            return;
        }
        self.stopped = true;
        if self.started {
            self.handle.stop();
            log::debug!("stopped stimulus {}", self.source.display());
        }
    }
}

impl std::fmt::Debug for AudioAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioAnchor")
            .field("source", &self.source)
            .field("started", &self.started)
            .field("stopped", &self.stopped)
            .finish()
    }
}

/// Loader for setups without an audio engine. Every load fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAudio;

impl AudioLoader for NoAudio {
    fn load(
        &mut self,
        source: &Path,
    ) -> impl Future<Output = Result<Box<dyn PlaybackHandle>, LoadError>> {
        let path = source.to_path_buf();
        async move { Err(LoadError::NoEngine { path }) }
    }
}
