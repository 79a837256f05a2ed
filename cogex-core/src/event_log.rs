use crate::input::{CaptureKind, CapturedInputEvent};
use crate::trial::{EndReason, TrialState};
use cogex_timing::ClockValue;
use serde::{Deserialize, Serialize};

/// One timestamped occurrence during a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    StateChanged {
        from: TrialState,
        to: TrialState,
        at: Option<ClockValue>,
    },
    AudioOnset {
        stimulus: Option<String>,
        at: ClockValue,
    },
    Presented {
        index: usize,
        label: String,
        scheduled: ClockValue,
        fired: ClockValue,
    },
    MetronomeTick {
        beat: u32,
        at: ClockValue,
    },
    MetronomeFinished {
        beats: u32,
        at: ClockValue,
    },
    Response {
        question: usize,
        name: String,
        answer: String,
        presented: ClockValue,
        at: ClockValue,
        response_time_ms: f64,
    },
    DeviceUnavailable {
        kind: CaptureKind,
        reason: String,
    },
    SubsystemFailed {
        subsystem: String,
        reason: String,
    },
    Ended {
        reason: EndReason,
        at: ClockValue,
    },
}

/// Append-only record of a trial, plus the input events moved in at the end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<LogEntry>,
    captured: Vec<CapturedInputEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Takes ownership of a capture buffer, appending in arrival order.
    pub fn absorb_captured(&mut self, events: Vec<CapturedInputEvent>) {
        if self.captured.is_empty() {
            self.captured = events;
        } else {
            self.captured.extend(events);
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn captured(&self) -> &[CapturedInputEvent] {
        &self.captured
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of transitions into `state`.
    pub fn transitions_to(&self, state: TrialState) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, LogEntry::StateChanged { to, .. } if *to == state))
            .count()
    }

    pub fn into_parts(self) -> (Vec<LogEntry>, Vec<CapturedInputEvent>) {
        (self.entries, self.captured)
    }
}
