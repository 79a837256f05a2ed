use crate::event_log::EventLog;
use cogex_timing::{ClockKind, ClockValue, JitterStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Trial lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialState {
    Idle,
    /// Waiting for the start gesture.
    Armed,
    Running,
    Ending,
    Done,
}

impl TrialState {
    /// True once termination has begun.
    pub fn is_terminating(self) -> bool {
        matches!(self, TrialState::Ending | TrialState::Done)
    }
}

impl fmt::Display for TrialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrialState::Idle => "idle",
            TrialState::Armed => "armed",
            TrialState::Running => "running",
            TrialState::Ending => "ending",
            TrialState::Done => "done",
        };
        f.write_str(name)
    }
}

/// The end condition that won the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    StopRequested,
    Duration,
    AudioEnded,
    Response,
}

impl EndReason {
    /// Tie-break rank when two conditions land on the same instant; lower wins.
    pub fn precedence(self) -> u8 {
        match self {
            EndReason::StopRequested => 0,
            EndReason::Duration => 1,
            EndReason::AudioEnded => 2,
            EndReason::Response => 3,
        }
    }
}

/// Everything handed to the output collaborator when a trial is done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub end_reason: EndReason,
    pub ended_at: ClockValue,
    pub anchor: Option<ClockValue>,
    pub clock: ClockKind,
    /// File name of the audio stimulus, if any.
    pub stimulus: Option<String>,
    pub annotations: BTreeMap<String, String>,
    /// Lateness of fired presentation events.
    pub timing: JitterStats,
    /// Start/stop/ended signals that arrived after termination began.
    pub discarded_signals: u32,
    pub log: EventLog,
}

impl TrialReport {
    pub fn duration(&self) -> Option<std::time::Duration> {
        self.anchor
            .map(|anchor| self.ended_at.saturating_duration_since(anchor))
    }
}
