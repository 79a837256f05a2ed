//! Seams to the collaborators around a trial: rendering, audio, input
//! hardware, the metronome's speaker and the output sink.

use crate::error::{AudioError, DeviceUnavailable, LoadError};
use crate::input::{CaptureKind, CapturedInputEvent, InputPayload};
use crate::signal::CancelToken;
use crate::trial::TrialReport;
use cogex_timing::{Clock, ClockValue};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, mpsc};

/// Shows render actions. Fire-and-forget.
pub trait Renderer<A> {
    fn render(&mut self, action: &A);

    /// Blanks the display once the trial is over.
    fn clear(&mut self) {}
}

impl<A, F: FnMut(&A)> Renderer<A> for F {
    fn render(&mut self, action: &A) {
        self(action)
    }
}

/// Receives the final report, exactly once per trial.
pub trait OutputSink {
    fn report(&mut self, report: TrialReport);
}

impl<F: FnMut(TrialReport)> OutputSink for F {
    fn report(&mut self, report: TrialReport) {
        self(report)
    }
}

/// Emits one audible metronome pulse.
pub trait TickSink {
    fn tick(&mut self, beat: u32);
}

/// A loaded, playable audio buffer.
pub trait PlaybackHandle {
    /// The engine's playback clock, when the platform exposes one.
    fn engine_clock(&self) -> Option<Arc<dyn Clock>>;

    fn play(&mut self) -> Result<(), AudioError>;

    /// True once playback has run to the end of the buffer.
    fn has_ended(&self) -> bool;

    fn stop(&mut self);
}

/// Deferred audio asset loading.
pub trait AudioLoader {
    fn load(
        &mut self,
        source: &Path,
    ) -> impl Future<Output = Result<Box<dyn PlaybackHandle>, LoadError>>;
}

/// A hardware input source that pushes events from its own driver thread.
pub trait InputSource {
    fn kind(&self) -> CaptureKind;

    /// Starts delivering events into `sink`.
    fn connect(&mut self, sink: CaptureSink) -> Result<(), DeviceUnavailable>;

    /// Deregisters the driver callback. Safe to call repeatedly.
    fn disconnect(&mut self);
}

/// Thread-safe producer end of a capture queue.
///
/// Stamps each payload on arrival with the session clock, relative to the
/// session origin, and enqueues it. Stamping and sending happen under one
/// lock so queue order and timestamp order agree.
///
/// The sink stops accepting once it is closed or its `halt` token is
/// cancelled. Closing never touches `halt`.
#[derive(Clone)]
pub struct CaptureSink {
    queue: Arc<Mutex<mpsc::Sender<CapturedInputEvent>>>,
    clock: Arc<dyn Clock>,
    origin: ClockValue,
    halt: CancelToken,
    closed: CancelToken,
}

impl CaptureSink {
    pub fn new(
        queue: mpsc::Sender<CapturedInputEvent>,
        clock: Arc<dyn Clock>,
        halt: CancelToken,
    ) -> Self {
        let origin = clock.now();
        Self {
            queue: Arc::new(Mutex::new(queue)),
            clock,
            origin,
            halt,
            closed: CancelToken::new(),
        }
    }

    /// Enqueues a payload. Returns false if the sink was closed.
    pub fn push(&self, payload: InputPayload) -> bool {
        if self.is_closed() {
            return false;
        }
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return false;
        }
        let timestamp = ClockValue::from_duration(
            self.clock.now().saturating_duration_since(self.origin),
        );
        queue.send(CapturedInputEvent { payload, timestamp }).is_ok()
    }

    /// Closes the sink. No push completes after this returns.
    pub fn close(&self) {
        let _queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.halt.is_cancelled()
    }

    pub fn origin(&self) -> ClockValue {
        self.origin
    }
}

impl fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSink")
            .field("origin", &self.origin)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogex_timing::ManualClock;
    use std::thread;

    #[test]
    fn stamps_relative_to_origin() {
        let clock = ManualClock::new();
        clock.set_millis(1_000);
        let (tx, rx) = mpsc::channel();
        let sink = CaptureSink::new(tx, Arc::new(clock.clone()), CancelToken::new());

        clock.set_millis(1_100);
        assert!(sink.push(InputPayload::Key("a".into())));
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.timestamp, ClockValue::from_millis(100));
    }

    #[test]
    fn closed_sink_drops_events() {
        let (tx, rx) = mpsc::channel();
        let sink = CaptureSink::new(tx, Arc::new(ManualClock::new()), CancelToken::new());
        sink.close();
        sink.close();
        assert!(!sink.push(InputPayload::Midi(vec![0x90, 64, 80])));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn close_leaves_the_halt_token_alone() {
        let (tx, _rx) = mpsc::channel();
        let halt = CancelToken::new();
        let sink = CaptureSink::new(tx, Arc::new(ManualClock::new()), halt.clone());
        sink.close();
        assert!(!halt.is_cancelled());

        let (tx, _rx) = mpsc::channel();
        let sink = CaptureSink::new(tx, Arc::new(ManualClock::new()), halt.clone());
        halt.cancel();
        assert!(sink.is_closed());
        assert!(!sink.push(InputPayload::Key("a".into())));
    }

    #[test]
    fn pushes_from_driver_threads_arrive_in_timestamp_order() {
        let (tx, rx) = mpsc::channel();
        let sink = CaptureSink::new(
            tx,
            Arc::new(cogex_timing::WallClock::new()),
            CancelToken::new(),
        );
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let sink = sink.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        sink.push(InputPayload::Midi(vec![0xF8]));
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        let stamps: Vec<_> = rx.try_iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps.len(), 200);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }
}
