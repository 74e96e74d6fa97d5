//! Shared world state.
//!
//! Contains the conversation history, the story-card registry, the memory
//! fields, and the script-persistent variables that hooks read and write.

mod history;
mod shared;
mod story_cards;

pub use history::{HistoryEntry, Mode, UnknownMode};
pub use shared::SharedWorld;
pub use story_cards::{StoryCard, StoryCardError, StoryCardRegistry};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Memory fields besides the derived context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    pub authors_note: String,
    pub front_memory: String,
    /// Most recent context-hook output.
    pub transformed_context: String,
}

/// The complete world of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub session_id: Uuid,
    history: Vec<HistoryEntry>,
    pub story_cards: StoryCardRegistry,
    pub memory: MemoryState,
    /// Values hooks store with `setState` and read back through `state`.
    pub vars: BTreeMap<String, serde_json::Value>,
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            history: Vec::new(),
            story_cards: StoryCardRegistry::new(),
            memory: MemoryState::default(),
            vars: BTreeMap::new(),
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// History only grows; entries are never edited after this call.
    pub fn append_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Newline join of every history entry's text, in order.
    ///
    /// Always recomputed from the full history.
    pub fn context(&self) -> String {
        self.history
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}
