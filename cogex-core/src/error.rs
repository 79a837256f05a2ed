use crate::input::CaptureKind;
use crate::trial::TrialState;
use std::path::PathBuf;
use thiserror::Error;

/// The audio stimulus could not be fetched or decoded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("audio source not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("no audio engine available to load {}", path.display())]
    NoEngine { path: PathBuf },
}

/// Input hardware is missing or could not be enumerated. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceUnavailable {
    #[error("no {kind} input ports found")]
    NoPorts { kind: CaptureKind },

    #[error("{kind} backend failed: {reason}")]
    Backend { kind: CaptureKind, reason: String },

    #[error("no {kind} input source configured")]
    NotConfigured { kind: CaptureKind },
}

impl DeviceUnavailable {
    pub fn kind(&self) -> CaptureKind {
        match self {
            DeviceUnavailable::NoPorts { kind }
            | DeviceUnavailable::Backend { kind, .. }
            | DeviceUnavailable::NotConfigured { kind } => *kind,
        }
    }
}

/// Playback or click synthesis failed after the asset was loaded.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("playback failed to start: {0}")]
    Playback(String),

    #[error("click synthesis failed: {0}")]
    Synthesis(String),
}

#[derive(Debug, Error)]
pub enum TrialError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: TrialState,
    },

    #[error("metronome tempo must be a positive number of bpm, got {bpm}")]
    InvalidTempo { bpm: f64 },
}
