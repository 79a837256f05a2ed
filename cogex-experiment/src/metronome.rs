use crate::scheduler::Horizon;
use cogex_core::{CancelToken, TickSink, TrialError};
use cogex_timing::ClockValue;
use std::num::NonZeroU32;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetronomeEvent {
    Tick { beat: u32, at: ClockValue },
    /// The beat count was reached. The trial keeps running.
    Finished { beats: u32, at: ClockValue },
}

/// Periodic tick generator, uncoupled from the presentation timeline.
///
/// Tick `k` (zero based) is due at `start + k * 60000/bpm` ms, computed from
/// the beat index rather than accumulated, so long runs do not drift.
#[derive(Debug)]
pub struct MetronomeGenerator {
    bpm: f64,
    beat_count: Option<NonZeroU32>,
    elapsed_beats: u32,
    started_at: ClockValue,
    halt: CancelToken,
    stopped: bool,
    finished: bool,
}

impl MetronomeGenerator {
    pub fn start(
        bpm: f64,
        beat_count: Option<NonZeroU32>,
        at: ClockValue,
        halt: CancelToken,
    ) -> Result<Self, TrialError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(TrialError::InvalidTempo { bpm });
        }
        log::info!("metronome started at {at}: {bpm} bpm, beats {beat_count:?}");
        Ok(Self {
            bpm,
            beat_count,
            elapsed_beats: 0,
            started_at: at,
            halt,
            stopped: false,
            finished: false,
        })
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.bpm)
    }

    fn tick_time(&self, beat: u32) -> ClockValue {
        self.started_at + Duration::from_secs_f64(60.0 * f64::from(beat) / self.bpm)
    }

    pub fn is_running(&self) -> bool {
        !self.stopped && !self.finished && !self.halt.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn elapsed_beats(&self) -> u32 {
        self.elapsed_beats
    }

    pub fn next_tick_at(&self) -> Option<ClockValue> {
        self.is_running().then(|| self.tick_time(self.elapsed_beats))
    }

    /// Emits every tick the horizon admits. Returns the number emitted.
    pub fn poll(
        &mut self,
        horizon: Horizon,
        sink: &mut dyn TickSink,
        mut on_event: impl FnMut(MetronomeEvent),
    ) -> u32 {
        let mut emitted = 0;
        while self.is_running() {
            let at = self.tick_time(self.elapsed_beats);
            if !horizon.admits(at) {
                break;
            }
            self.elapsed_beats += 1;
            emitted += 1;
            sink.tick(self.elapsed_beats);
            on_event(MetronomeEvent::Tick {
                beat: self.elapsed_beats,
                at,
            });
            if self
                .beat_count
                .is_some_and(|n| self.elapsed_beats >= n.get())
            {
                self.finished = true;
                log::info!("metronome finished after {} beats", self.elapsed_beats);
                on_event(MetronomeEvent::Finished {
                    beats: self.elapsed_beats,
                    at,
                });
            }
        }
        emitted
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            log::debug!("metronome stopped after {} beats", self.elapsed_beats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter(Vec<u32>);

    impl TickSink for Counter {
        fn tick(&mut self, beat: u32) {
            self.0.push(beat);
        }
    }

    fn at(ms: u64) -> Horizon {
        Horizon::Through(ClockValue::from_millis(ms))
    }

    #[test]
    fn rejects_non_positive_tempo() {
        for bpm in [0.0, -60.0, f64::NAN, f64::INFINITY] {
            let err = MetronomeGenerator::start(bpm, None, ClockValue::ZERO, CancelToken::new());
            assert!(matches!(err, Err(TrialError::InvalidTempo { .. })));
        }
    }

    #[test]
    fn ticks_immediately_then_every_period() {
        let mut m =
            MetronomeGenerator::start(120.0, None, ClockValue::from_millis(100), CancelToken::new())
                .unwrap();
        assert_eq!(m.period(), Duration::from_millis(500));

        let mut sink = Counter::default();
        let mut times = Vec::new();
        m.poll(at(1600), &mut sink, |e| {
            if let MetronomeEvent::Tick { at, .. } = e {
                times.push(at.as_millis_f64() as u64)
            }
        });
        assert_eq!(times, vec![100, 600, 1100, 1600]);
        assert_eq!(sink.0, vec![1, 2, 3, 4]);
        assert_eq!(m.next_tick_at(), Some(ClockValue::from_millis(2100)));
    }

    #[test]
    fn beat_count_bounds_ticks_exactly() {
        let mut m = MetronomeGenerator::start(
            85.0,
            NonZeroU32::new(3),
            ClockValue::ZERO,
            CancelToken::new(),
        )
        .unwrap();
        let mut sink = Counter::default();
        let mut finished = 0;
        m.poll(at(60_000), &mut sink, |e| {
            if matches!(e, MetronomeEvent::Finished { beats: 3, .. }) {
                finished += 1;
            }
        });
        m.poll(at(120_000), &mut sink, |_| {});
        assert_eq!(sink.0.len(), 3);
        assert_eq!(finished, 1);
        assert!(m.is_finished());
        assert_eq!(m.next_tick_at(), None);
    }

    #[test]
    fn unbounded_runs_until_stopped() {
        let mut m =
            MetronomeGenerator::start(60.0, None, ClockValue::ZERO, CancelToken::new()).unwrap();
        let mut sink = Counter::default();
        m.poll(at(9_500), &mut sink, |_| {});
        assert_eq!(m.elapsed_beats(), 10);

        m.stop();
        m.stop();
        m.poll(at(60_000), &mut sink, |_| {});
        assert_eq!(m.elapsed_beats(), 10);
        assert!(!m.is_running());
    }

    #[test]
    fn halt_token_silences_generator() {
        let halt = CancelToken::new();
        let mut m = MetronomeGenerator::start(60.0, None, ClockValue::ZERO, halt.clone()).unwrap();
        let mut sink = Counter::default();
        m.poll(at(1_000), &mut sink, |_| {});
        halt.cancel();
        m.poll(at(10_000), &mut sink, |_| {});
        assert_eq!(sink.0, vec![1, 2]);
    }
}
