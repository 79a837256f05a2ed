use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Something the rendering collaborator knows how to show.
pub trait RenderAction: Clone + std::fmt::Debug {
    /// Short name recorded in the event log when the action fires.
    fn label(&self) -> String;
}

impl RenderAction for &'static str {
    fn label(&self) -> String {
        (*self).to_string()
    }
}

impl RenderAction for String {
    fn label(&self) -> String {
        self.clone()
    }
}

/// One entry of a presentation timeline, fired at anchor + offset.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationEvent<A> {
    pub offset: Duration,
    pub action: A,
}

impl<A> PresentationEvent<A> {
    pub fn new(offset: Duration, action: A) -> Self {
        Self { offset, action }
    }

    pub fn at_millis(ms: u64, action: A) -> Self {
        Self::new(Duration::from_millis(ms), action)
    }
}

/// Stock actions for image/text sequences and survey questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameAction {
    ShowFrame {
        frame: usize,
        images: Vec<String>,
        text: Option<String>,
    },
    /// Images placed into labelled slots (A, B, C, ...).
    ShowLayout {
        slots: Vec<(String, String)>,
    },
    RevealQuestion {
        index: usize,
        name: String,
        prompt: String,
    },
    Prompt {
        text: String,
    },
    Clear,
}

impl RenderAction for FrameAction {
    fn label(&self) -> String {
        match self {
            FrameAction::ShowFrame { frame, .. } => format!("frame {frame}"),
            FrameAction::ShowLayout { slots } => format!("layout of {}", slots.len()),
            FrameAction::RevealQuestion { name, index, .. } if name.is_empty() => {
                format!("question {index}")
            }
            FrameAction::RevealQuestion { name, .. } => format!("question {name}"),
            FrameAction::Prompt { .. } => "prompt".to_string(),
            FrameAction::Clear => "clear".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_action_labels() {
        let show = FrameAction::ShowFrame {
            frame: 2,
            images: vec!["a.png".into()],
            text: None,
        };
        assert_eq!(show.label(), "frame 2");

        let q = FrameAction::RevealQuestion {
            index: 0,
            name: String::new(),
            prompt: "2 + 2".into(),
        };
        assert_eq!(q.label(), "question 0");
        assert_eq!(FrameAction::Clear.label(), "clear");
    }

    #[test]
    fn frame_action_reads_tagged_json() {
        let action: FrameAction =
            serde_json::from_str(r#"{"kind":"prompt","text":"Press Y to start"}"#).unwrap();
        assert_eq!(
            action,
            FrameAction::Prompt {
                text: "Press Y to start".into()
            }
        );
    }
}
