//! kira backend for stimulus playback, the audio-engine clock and the
//! metronome click.

pub mod click;
pub mod engine;
pub mod playback;

pub use click::{ClickTrack, click_samples, click_wav};
pub use engine::KiraAudio;
pub use playback::{AudioClock, KiraPlayback};
