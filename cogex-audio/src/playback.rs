use cogex_core::{AudioError, PlaybackHandle};
use cogex_timing::{Clock, ClockKind, ClockValue};
use kira::clock::{ClockHandle, ClockTime};
use kira::sound::PlaybackState;
use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle};
use kira::{AudioManager, Tween};
use std::sync::{Arc, Mutex, PoisonError};

/// Ticks per second of the engine clock backing [`AudioClock`].
pub const CLOCK_TICKS_PER_SECOND: f64 = 1000.0;

/// Reads a kira clock advanced by the audio thread, one tick per millisecond.
#[derive(Clone)]
pub struct AudioClock {
    handle: Arc<Mutex<ClockHandle>>,
}

impl AudioClock {
    pub fn new(handle: ClockHandle) -> Self {
        Self {
            handle: Arc::new(Mutex::new(handle)),
        }
    }

    fn start(&self) {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start();
    }
}

/// Converts an engine clock reading to trial time.
pub fn clock_value(time: &ClockTime) -> ClockValue {
    ticks_to_value(time.ticks, time.fraction)
}

fn ticks_to_value(ticks: u64, fraction: f64) -> ClockValue {
    let ns_per_tick = 1_000_000_000.0 / CLOCK_TICKS_PER_SECOND;
    ClockValue::from_nanos(((ticks as f64 + fraction) * ns_per_tick) as u64)
}

impl Clock for AudioClock {
    fn now(&self) -> ClockValue {
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        clock_value(&handle.time())
    }

    fn kind(&self) -> ClockKind {
        ClockKind::Audio
    }
}

/// A decoded stimulus ready to play on the shared manager.
pub struct KiraPlayback {
    manager: Arc<Mutex<AudioManager>>,
    data: StaticSoundData,
    clock: Option<AudioClock>,
    handle: Option<StaticSoundHandle>,
}

impl KiraPlayback {
    pub fn new(
        manager: Arc<Mutex<AudioManager>>,
        data: StaticSoundData,
        clock: Option<AudioClock>,
    ) -> Self {
        Self {
            manager,
            data,
            clock,
            handle: None,
        }
    }
}

impl PlaybackHandle for KiraPlayback {
    fn engine_clock(&self) -> Option<Arc<dyn Clock>> {
        self.clock
            .clone()
            .map(|clock| Arc::new(clock) as Arc<dyn Clock>)
    }

    fn play(&mut self) -> Result<(), AudioError> {
        let handle = self
            .manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .play(self.data.clone())
            .map_err(|e| AudioError::Playback(e.to_string()))?;
        if let Some(clock) = &self.clock {
            clock.start();
        }
        log::debug!("playback started, {:?} long", self.data.duration());
        self.handle = Some(handle);
        Ok(())
    }

    fn has_ended(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| h.state() == PlaybackState::Stopped)
    }

    fn stop(&mut self) {
        if let Some(handle) = &mut self.handle {
            handle.stop(Tween::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_milliseconds() {
        assert_eq!(ticks_to_value(6500, 0.0), ClockValue::from_millis(6500));
        assert_eq!(ticks_to_value(2, 0.5), ClockValue::from_nanos(2_500_000));
        assert_eq!(ticks_to_value(0, 0.0), ClockValue::ZERO);
    }
}
