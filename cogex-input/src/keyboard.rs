use cogex_core::{CaptureKind, CaptureSink, DeviceUnavailable, InputPayload, InputSource};
use std::sync::{Arc, Mutex, PoisonError};

/// Producer side of a keyboard source, held by whatever owns the window
/// event loop.
#[derive(Debug, Clone, Default)]
pub struct KeyFeed {
    sink: Arc<Mutex<Option<CaptureSink>>>,
}

impl KeyFeed {
    /// Forwards a key press. False when no capture session is listening.
    pub fn press(&self, key: &str) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|sink| sink.push(InputPayload::Key(key.to_string())))
    }

    pub fn is_listening(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|sink| !sink.is_closed())
    }
}

/// Key presses delivered by the window system rather than a device driver.
#[derive(Debug)]
pub struct KeyboardSource {
    feed: KeyFeed,
}

impl KeyboardSource {
    pub fn new() -> (Self, KeyFeed) {
        let feed = KeyFeed::default();
        (Self { feed: feed.clone() }, feed)
    }
}

impl InputSource for KeyboardSource {
    fn kind(&self) -> CaptureKind {
        CaptureKind::Keyboard
    }

    fn connect(&mut self, sink: CaptureSink) -> Result<(), DeviceUnavailable> {
        *self.feed.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.feed
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogex_core::CancelToken;
    use cogex_timing::{ClockValue, ManualClock};
    use std::sync::mpsc;

    #[test]
    fn feed_reaches_the_sink_only_while_connected() {
        let (mut source, feed) = KeyboardSource::new();
        assert!(!feed.press("a"));

        let clock = ManualClock::new();
        let (tx, rx) = mpsc::channel();
        source
            .connect(CaptureSink::new(tx, Arc::new(clock.clone()), CancelToken::new()))
            .unwrap();
        assert!(feed.is_listening());

        clock.set_millis(30);
        assert!(feed.press("space"));
        source.disconnect();
        assert!(!feed.press("b"));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, InputPayload::Key("space".into()));
        assert_eq!(events[0].timestamp, ClockValue::from_millis(30));
    }
}
