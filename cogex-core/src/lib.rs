pub mod error;
pub mod event;
pub mod event_log;
pub mod input;
pub mod io;
pub mod signal;
pub mod trial;

pub use error::{AudioError, DeviceUnavailable, LoadError, TrialError};
pub use event::{FrameAction, PresentationEvent, RenderAction};
pub use event_log::{EventLog, LogEntry};
pub use input::{CaptureKind, CapturedInputEvent, InputPayload, KeyChoices};
pub use io::{
    AudioLoader, CaptureSink, InputSource, OutputSink, PlaybackHandle, Renderer, TickSink,
};
pub use signal::CancelToken;
pub use trial::{EndReason, TrialReport, TrialState};
