//! Hardware input sources for capture sessions.

pub mod keyboard;
pub mod midi;

pub use keyboard::{KeyFeed, KeyboardSource};
pub use midi::MidiSource;
