//! Story-card registry.
//!
//! Cards are keyed lore entries. A card's id is its current position in the
//! registry, so removing a card renumbers every card after it. Callers that
//! hold on to an id across a removal must look the card up again.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from story-card operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoryCardError {
    /// The index does not name a card (the registry's RangeError).
    #[error("story card index {index} is out of range ({len} cards)")]
    OutOfRange { index: usize, len: usize },

    /// Another card already uses this exact key sequence.
    #[error("another story card already has the keys {keys:?}")]
    DuplicateKeys { keys: Vec<String> },
}

/// A keyed lore entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryCard {
    /// Position in the registry; reassigned on removal.
    pub id: usize,
    pub keys: Vec<String>,
    pub entry: String,
    #[serde(rename = "type")]
    pub card_type: String,
}

impl StoryCard {
    /// Whether any of this card's keys equals `key`.
    pub fn has_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Ordered collection of story cards with unique key sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryCardRegistry {
    cards: Vec<StoryCard>,
}

impl StoryCardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a card.
    ///
    /// Returns the new card's id, or `None` when a card with the identical
    /// key sequence (same keys, same order) already exists.
    pub fn add(
        &mut self,
        keys: Vec<String>,
        entry: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Option<usize> {
        if self.position_of_keys(&keys).is_some() {
            return None;
        }

        let id = self.cards.len();
        self.cards.push(StoryCard {
            id,
            keys,
            entry: entry.into(),
            card_type: card_type.into(),
        });
        Some(id)
    }

    /// Remove the card at `index`; every later card's id drops by one.
    pub fn remove(&mut self, index: usize) -> Result<StoryCard, StoryCardError> {
        self.check_index(index)?;
        let removed = self.cards.remove(index);
        self.renumber_from(index);
        Ok(removed)
    }

    /// Overwrite the card at `index` in place. Its id is unchanged.
    pub fn update(
        &mut self,
        index: usize,
        keys: Vec<String>,
        entry: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Result<(), StoryCardError> {
        self.check_index(index)?;
        if self
            .position_of_keys(&keys)
            .is_some_and(|existing| existing != index)
        {
            return Err(StoryCardError::DuplicateKeys { keys });
        }

        let card = &mut self.cards[index];
        card.keys = keys;
        card.entry = entry.into();
        card.card_type = card_type.into();
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&StoryCard> {
        self.cards.get(index)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoryCard> {
        self.cards.iter()
    }

    pub fn as_slice(&self) -> &[StoryCard] {
        &self.cards
    }

    /// Cards that list `key` among their keys, in registry order.
    pub fn find_by_key(&self, key: &str) -> Vec<&StoryCard> {
        self.cards.iter().filter(|c| c.has_key(key)).collect()
    }

    fn position_of_keys(&self, keys: &[String]) -> Option<usize> {
        self.cards.iter().position(|c| c.keys == keys)
    }

    fn check_index(&self, index: usize) -> Result<(), StoryCardError> {
        if index < self.cards.len() {
            Ok(())
        } else {
            Err(StoryCardError::OutOfRange {
                index,
                len: self.cards.len(),
            })
        }
    }

    fn renumber_from(&mut self, start: usize) {
        for (id, card) in self.cards.iter_mut().enumerate().skip(start) {
            card.id = id;
        }
    }
}
