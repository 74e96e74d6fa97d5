//! Conversation history entries and input modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The kind of action a participant submits with a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Start,
    Continue,
    Do,
    Say,
    Story,
    See,
}

impl Mode {
    /// All modes, in the order the console lists them.
    pub const ALL: [Mode; 6] = [
        Mode::Start,
        Mode::Continue,
        Mode::Do,
        Mode::Say,
        Mode::Story,
        Mode::See,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Start => "start",
            Mode::Continue => "continue",
            Mode::Do => "do",
            Mode::Say => "say",
            Mode::Story => "story",
            Mode::See => "see",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known [`Mode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown input mode '{0}'")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

/// One line of the conversation.
///
/// AI turns are recorded without a mode, which renders as the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub mode: Option<Mode>,
    pub text: String,
}

impl HistoryEntry {
    pub fn new(mode: Option<Mode>, text: impl Into<String>) -> Self {
        Self {
            mode,
            text: text.into(),
        }
    }

    /// The mode as scripts and snapshots see it: `""` when omitted.
    pub fn mode_str(&self) -> &'static str {
        self.mode.map(|m| m.as_str()).unwrap_or("")
    }
}
