use cogex_core::{
    CancelToken, CaptureKind, CaptureSink, CapturedInputEvent, DeviceUnavailable, InputSource,
};
use cogex_timing::{Clock, ClockValue};
use std::sync::{Arc, mpsc};

/// Buffers hardware input pushed from a driver thread.
///
/// The driver only enqueues through its [`CaptureSink`]; the trial loop
/// drains the queue into an append-only buffer. Connection failures are
/// recorded and leave the session empty rather than failing the trial.
pub struct InputCaptureSession {
    kind: CaptureKind,
    source: Option<Box<dyn InputSource>>,
    sink: Option<CaptureSink>,
    queue: Option<mpsc::Receiver<CapturedInputEvent>>,
    buffer: Vec<CapturedInputEvent>,
    unavailable: Option<DeviceUnavailable>,
    stopped: bool,
}

impl InputCaptureSession {
    /// Connects `source`. Events are stamped with `clock` relative to now and
    /// dropped once `halt` is cancelled.
    pub fn start(mut source: Box<dyn InputSource>, clock: Arc<dyn Clock>, halt: CancelToken) -> Self {
        let kind = source.kind();
        let (tx, rx) = mpsc::channel();
        let sink = CaptureSink::new(tx, clock, halt);
        match source.connect(sink.clone()) {
            Ok(()) => {
                log::info!("{kind} capture started");
                Self {
                    kind,
                    source: Some(source),
                    sink: Some(sink),
                    queue: Some(rx),
                    buffer: Vec::new(),
                    unavailable: None,
                    stopped: false,
                }
            }
            Err(err) => {
                sink.close();
                Self::unavailable(err)
            }
        }
    }

    /// A session that never yields events.
    pub fn unavailable(err: DeviceUnavailable) -> Self {
        log::warn!("input capture disabled: {err}");
        Self {
            kind: err.kind(),
            source: None,
            sink: None,
            queue: None,
            buffer: Vec::new(),
            unavailable: Some(err),
            stopped: false,
        }
    }

    pub fn kind(&self) -> CaptureKind {
        self.kind
    }

    pub fn unavailable_reason(&self) -> Option<&DeviceUnavailable> {
        self.unavailable.as_ref()
    }

    /// Moves queued events into the buffer and returns the ones just added.
    pub fn drain(&mut self) -> &[CapturedInputEvent] {
        let start = self.buffer.len();
        if let Some(queue) = &self.queue {
            self.buffer.extend(queue.try_iter());
        }
        &self.buffer[start..]
    }

    /// Drops buffered events stamped after `limit`. Returns how many went.
    pub fn discard_after(&mut self, limit: ClockValue) -> usize {
        let keep = self.buffer.partition_point(|e| e.timestamp <= limit);
        let dropped = self.buffer.len() - keep;
        self.buffer.truncate(keep);
        dropped
    }

    pub fn events(&self) -> &[CapturedInputEvent] {
        &self.buffer
    }

    /// Hands the buffer over, leaving the session empty.
    pub fn take_events(&mut self) -> Vec<CapturedInputEvent> {
        std::mem::take(&mut self.buffer)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Closes the sink, disconnects the driver and drains what was accepted
    /// before the close. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(sink) = &self.sink {
            sink.close();
        }
        if let Some(source) = &mut self.source {
            source.disconnect();
        }
        let late = self.drain().len();
        self.queue = None;
        log::info!(
            "{} capture stopped with {} events ({late} drained at stop)",
            self.kind,
            self.buffer.len()
        );
    }
}

impl std::fmt::Debug for InputCaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputCaptureSession")
            .field("kind", &self.kind)
            .field("events", &self.buffer.len())
            .field("unavailable", &self.unavailable)
            .field("stopped", &self.stopped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogex_core::InputPayload;
    use cogex_timing::ManualClock;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Loopback {
        sink: Arc<Mutex<Option<CaptureSink>>>,
        disconnects: Arc<Mutex<u32>>,
        fail: bool,
    }

    impl Loopback {
        fn press(&self, key: &str) -> bool {
            match self.sink.lock().unwrap().as_ref() {
                Some(sink) => sink.push(InputPayload::Key(key.into())),
                None => false,
            }
        }
    }

    impl InputSource for Loopback {
        fn kind(&self) -> CaptureKind {
            CaptureKind::Keyboard
        }

        fn connect(&mut self, sink: CaptureSink) -> Result<(), DeviceUnavailable> {
            if self.fail {
                return Err(DeviceUnavailable::NoPorts {
                    kind: CaptureKind::Keyboard,
                });
            }
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn disconnect(&mut self) {
            *self.disconnects.lock().unwrap() += 1;
        }
    }

    #[test]
    fn drains_in_arrival_order() {
        let clock = ManualClock::new();
        let input = Loopback::default();
        let mut session =
            InputCaptureSession::start(Box::new(input.clone()), Arc::new(clock.clone()), CancelToken::new());

        clock.set_millis(100);
        input.press("a");
        clock.set_millis(250);
        input.press("b");
        let fresh: Vec<_> = session.drain().iter().map(|e| e.timestamp).collect();
        assert_eq!(fresh, vec![ClockValue::from_millis(100), ClockValue::from_millis(250)]);
        assert!(session.drain().is_empty());
        assert_eq!(session.events().len(), 2);
    }

    #[test]
    fn stop_drops_later_events_and_is_idempotent() {
        let input = Loopback::default();
        let mut session = InputCaptureSession::start(
            Box::new(input.clone()),
            Arc::new(ManualClock::new()),
            CancelToken::new(),
        );
        input.press("a");
        session.stop();
        assert!(!input.press("b"));
        session.stop();

        assert_eq!(*input.disconnects.lock().unwrap(), 1);
        assert_eq!(session.events().len(), 1);
        assert!(session.drain().is_empty());
    }

    #[test]
    fn events_past_the_limit_are_dropped() {
        let clock = ManualClock::new();
        let input = Loopback::default();
        let mut session =
            InputCaptureSession::start(Box::new(input.clone()), Arc::new(clock.clone()), CancelToken::new());
        for ms in [100, 4_900, 5_000, 5_100] {
            clock.set_millis(ms);
            input.press("k");
        }
        session.stop();

        assert_eq!(session.discard_after(ClockValue::from_millis(5_000)), 1);
        let stamps: Vec<_> = session.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(
            stamps,
            [100, 4_900, 5_000].map(ClockValue::from_millis).to_vec()
        );
        assert_eq!(session.discard_after(ClockValue::from_millis(5_000)), 0);
    }

    #[test]
    fn connect_failure_degrades_to_empty_capture() {
        let input = Loopback {
            fail: true,
            ..Default::default()
        };
        let mut session =
            InputCaptureSession::start(Box::new(input), Arc::new(ManualClock::new()), CancelToken::new());
        assert!(matches!(
            session.unavailable_reason(),
            Some(DeviceUnavailable::NoPorts { .. })
        ));
        assert!(session.drain().is_empty());
        session.stop();
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn halt_token_closes_the_sink() {
        let halt = CancelToken::new();
        let input = Loopback::default();
        let mut session =
            InputCaptureSession::start(Box::new(input.clone()), Arc::new(ManualClock::new()), halt.clone());
        halt.cancel();
        assert!(!input.press("a"));
        assert!(session.drain().is_empty());
    }
}
