//! Reference-counted handle to a session's world.

use super::{HistoryEntry, StoryCard, StoryCardError, WorldState};
use std::sync::{Arc, Mutex, MutexGuard};

/// A cloneable handle to one [`WorldState`].
///
/// The turn engine owns one handle and passes clones into each hook
/// invocation, so mutations a hook makes are visible to the engine as soon as
/// the hook returns. The lock is held only for the duration of a single
/// accessor and never across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedWorld {
    inner: Arc<Mutex<WorldState>>,
}

impl SharedWorld {
    pub fn new() -> Self {
        Self::from_state(WorldState::new())
    }

    pub fn from_state(state: WorldState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorldState> {
        // Every write is a single registry/history call; a poisoned lock
        // still guards a consistent world.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with shared access to the world.
    pub fn read<R>(&self, f: impl FnOnce(&WorldState) -> R) -> R {
        f(&self.lock())
    }

    /// Run `f` with exclusive access to the world.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Copy of the whole world.
    pub fn state(&self) -> WorldState {
        self.read(|w| w.clone())
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.read(|w| w.history().to_vec())
    }

    pub fn history_len(&self) -> usize {
        self.read(|w| w.history().len())
    }

    pub(crate) fn append_history(&self, entry: HistoryEntry) {
        self.write(|w| w.append_history(entry));
    }

    pub fn context(&self) -> String {
        self.read(|w| w.context())
    }

    pub fn transformed_context(&self) -> String {
        self.read(|w| w.memory.transformed_context.clone())
    }

    pub(crate) fn set_transformed_context(&self, context: String) {
        self.write(|w| w.memory.transformed_context = context);
    }

    pub fn authors_note(&self) -> String {
        self.read(|w| w.memory.authors_note.clone())
    }

    pub fn front_memory(&self) -> String {
        self.read(|w| w.memory.front_memory.clone())
    }

    pub fn var(&self, key: &str) -> Option<serde_json::Value> {
        self.read(|w| w.vars.get(key).cloned())
    }

    pub fn story_cards(&self) -> Vec<StoryCard> {
        self.read(|w| w.story_cards.as_slice().to_vec())
    }

    pub fn story_card(&self, index: usize) -> Option<StoryCard> {
        self.read(|w| w.story_cards.get(index).cloned())
    }

    /// See [`StoryCardRegistry::add`](super::StoryCardRegistry::add).
    pub fn add_story_card(
        &self,
        keys: Vec<String>,
        entry: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Option<usize> {
        self.write(|w| w.story_cards.add(keys, entry, card_type))
    }

    pub fn remove_story_card(&self, index: usize) -> Result<StoryCard, StoryCardError> {
        self.write(|w| w.story_cards.remove(index))
    }

    pub fn update_story_card(
        &self,
        index: usize,
        keys: Vec<String>,
        entry: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Result<(), StoryCardError> {
        self.write(|w| w.story_cards.update(index, keys, entry, card_type))
    }
}
