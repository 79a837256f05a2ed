use cogex_timing::ClockValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The hardware a capture session listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    Keyboard,
    Midi,
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureKind::Keyboard => f.write_str("keyboard"),
            CaptureKind::Midi => f.write_str("midi"),
        }
    }
}

/// Raw input as delivered by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPayload {
    Key(String),
    Midi(Vec<u8>),
}

impl InputPayload {
    pub fn key(&self) -> Option<&str> {
        match self {
            InputPayload::Key(k) => Some(k),
            InputPayload::Midi(_) => None,
        }
    }

    pub fn kind(&self) -> CaptureKind {
        match self {
            InputPayload::Key(_) => CaptureKind::Keyboard,
            InputPayload::Midi(_) => CaptureKind::Midi,
        }
    }
}

/// An input event stamped with its arrival time relative to session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedInputEvent {
    pub payload: InputPayload,
    pub timestamp: ClockValue,
}

/// Which inputs count as a response.
///
/// Reads `"all"`, a bare list of key names, or `{"only": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "ChoicesRepr")]
pub enum KeyChoices {
    /// Any input.
    #[default]
    All,
    /// Only these keys, compared ignoring ASCII case.
    Only(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChoicesRepr {
    Keyword(String),
    Keys(Vec<String>),
    Only { only: Vec<String> },
}

impl TryFrom<ChoicesRepr> for KeyChoices {
    type Error = String;

    fn try_from(repr: ChoicesRepr) -> Result<Self, Self::Error> {
        match repr {
            ChoicesRepr::Keyword(word) if word.eq_ignore_ascii_case("all") => Ok(KeyChoices::All),
            ChoicesRepr::Keyword(word) => {
                Err(format!("expected \"all\" or a list of keys, got \"{word}\""))
            }
            ChoicesRepr::Keys(keys) | ChoicesRepr::Only { only: keys } => Ok(KeyChoices::Only(keys)),
        }
    }
}

impl KeyChoices {
    pub fn accepts(&self, payload: &InputPayload) -> bool {
        match self {
            KeyChoices::All => true,
            KeyChoices::Only(keys) => payload
                .key()
                .is_some_and(|k| keys.iter().any(|c| c.eq_ignore_ascii_case(k))),
        }
    }
}
