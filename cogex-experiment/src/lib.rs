pub mod anchor;
pub mod capture;
pub mod config;
pub mod metronome;
pub mod runner;
pub mod scheduler;
pub mod sequence;
pub mod state;
pub mod survey;
pub mod trial;

pub use anchor::{AudioAnchor, NoAudio};
pub use capture::InputCaptureSession;
pub use config::{MetronomeCondition, MetronomeConfig, SequenceConfig, TrialConfig};
pub use metronome::{MetronomeEvent, MetronomeGenerator};
pub use runner::run_blocking;
pub use scheduler::{Horizon, ScheduledTimer, TimelineScheduler};
pub use sequence::{frame_sequence, shuffled_layout, slot_label};
pub use state::Trial;
pub use survey::{Answer, Question, QuestionSequence, QuestionSpec, reveal_questions};
pub use trial::{TrialContext, TrialControl, TrialSignal};
