use cogex_core::{InputSource, OutputSink, Renderer, TickSink};
use cogex_timing::{Clock, WallClock};
use std::sync::{Arc, mpsc};

/// The collaborators a trial talks to, owned by the trial from configure to done.
pub struct TrialContext<A> {
    pub renderer: Box<dyn Renderer<A>>,
    pub output: Box<dyn OutputSink>,
    pub input: Option<Box<dyn InputSource>>,
    pub ticks: Option<Box<dyn TickSink>>,
    /// Trial clock when no audio engine clock is offered.
    pub wall_clock: Arc<dyn Clock>,
    /// Stamps captured input. Always a system clock.
    pub capture_clock: Arc<dyn Clock>,
}

impl<A> TrialContext<A> {
    pub fn new(renderer: impl Renderer<A> + 'static, output: impl OutputSink + 'static) -> Self {
        let wall: Arc<dyn Clock> = Arc::new(WallClock::new());
        Self {
            renderer: Box::new(renderer),
            output: Box::new(output),
            input: None,
            ticks: None,
            wall_clock: wall.clone(),
            capture_clock: wall,
        }
    }

    pub fn with_input(mut self, input: impl InputSource + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    pub fn with_ticks(mut self, ticks: impl TickSink + 'static) -> Self {
        self.ticks = Some(Box::new(ticks));
        self
    }

    /// Replaces both the wall and the capture clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.wall_clock = clock.clone();
        self.capture_clock = clock;
        self
    }

    pub fn with_capture_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.capture_clock = clock;
        self
    }
}

/// A request posted into the trial loop from another thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialSignal {
    Start,
    Stop,
    Response(String),
}

/// Cloneable handle for posting signals to a trial. Signals are acted on at
/// the next poll.
#[derive(Debug, Clone)]
pub struct TrialControl {
    tx: mpsc::Sender<TrialSignal>,
}

impl TrialControl {
    pub(crate) fn new(tx: mpsc::Sender<TrialSignal>) -> Self {
        Self { tx }
    }

    /// Returns false once the trial has been dropped.
    pub fn send(&self, signal: TrialSignal) -> bool {
        self.tx.send(signal).is_ok()
    }

    pub fn signal_start(&self) -> bool {
        self.send(TrialSignal::Start)
    }

    pub fn request_stop(&self) -> bool {
        self.send(TrialSignal::Stop)
    }

    pub fn submit_response(&self, answer: impl Into<String>) -> bool {
        self.send(TrialSignal::Response(answer.into()))
    }
}
