//! The two-party turn engine.
//!
//! Inputs alternate between the user and the AI. A user turn runs the input
//! modifier, records the result, then runs the context modifier over the
//! whole history. An AI turn runs the output modifier and records the result.
//! A hook that fails for any reason is replaced by the identity function for
//! that turn; the failure is reported but never stops the turn.

use crate::hooks::{HookKind, HookRunner};
use crate::script::HookError;
use crate::world::{HistoryEntry, Mode, SharedWorld, StoryCard, StoryCardError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Whose input the engine expects next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    User,
    Ai,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::User => Side::Ai,
            Side::Ai => Side::User,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::User => f.write_str("user"),
            Side::Ai => f.write_str("ai"),
        }
    }
}

/// A hook that fell back to identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    pub hook: HookKind,
    pub error: HookError,
}

/// What happened during one completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    /// Side that produced the input.
    pub side: Side,
    /// Entry appended to history by the engine.
    pub entry: HistoryEntry,
    pub failures: Vec<HookFailure>,
    /// Script log lines, in emission order across hooks.
    pub logs: Vec<String>,
}

impl TurnReport {
    pub fn failed(&self, hook: HookKind) -> bool {
        self.failures.iter().any(|f| f.hook == hook)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input; nothing ran and the side did not change.
    Ignored,
    Completed(TurnReport),
}

impl TurnOutcome {
    pub fn report(&self) -> Option<&TurnReport> {
        match self {
            TurnOutcome::Ignored => None,
            TurnOutcome::Completed(report) => Some(report),
        }
    }
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub current_side: Side,
    pub history: Vec<HistoryEntry>,
    pub story_cards: Vec<StoryCard>,
    pub context: String,
    pub transformed_context: String,
    pub authors_note: String,
    pub front_memory: String,
}

/// Drives turns for one session.
pub struct TurnEngine {
    runner: HookRunner,
    world: SharedWorld,
    side: Side,
}

impl TurnEngine {
    /// A fresh session: empty world, user to move.
    pub fn new(runner: HookRunner) -> Self {
        Self::with_world(runner, SharedWorld::new())
    }

    pub fn with_world(runner: HookRunner, world: SharedWorld) -> Self {
        Self {
            runner,
            world,
            side: Side::User,
        }
    }

    /// Process one input from the side whose turn it is.
    ///
    /// `mode` is recorded for user turns and ignored for AI turns.
    pub async fn handle_input(&mut self, mode: Option<Mode>, text: &str) -> TurnOutcome {
        if text.trim().is_empty() {
            debug!(side = %self.side, "ignoring blank input");
            return TurnOutcome::Ignored;
        }

        let side = self.side;
        let mut failures = Vec::new();
        let mut logs = Vec::new();

        let entry = match side {
            Side::User => {
                let text = self
                    .apply(HookKind::Input, text, &mut failures, &mut logs)
                    .await;
                let entry = HistoryEntry::new(mode, text);
                self.world.append_history(entry.clone());

                let context = self.world.context();
                let transformed = self
                    .apply(HookKind::Context, &context, &mut failures, &mut logs)
                    .await;
                self.world.set_transformed_context(transformed);
                entry
            }
            Side::Ai => {
                let text = self
                    .apply(HookKind::Output, text, &mut failures, &mut logs)
                    .await;
                let entry = HistoryEntry::new(None, text);
                self.world.append_history(entry.clone());
                entry
            }
        };

        self.side = side.other();
        info!(
            session = %self.session_id(),
            %side,
            history = self.world.history_len(),
            failed_hooks = failures.len(),
            "turn completed"
        );

        TurnOutcome::Completed(TurnReport {
            side,
            entry,
            failures,
            logs,
        })
    }

    /// Run `kind`, falling back to `text` unchanged on any failure.
    async fn apply(
        &self,
        kind: HookKind,
        text: &str,
        failures: &mut Vec<HookFailure>,
        logs: &mut Vec<String>,
    ) -> String {
        match self.runner.run(kind, text, &self.world).await {
            Ok(output) => {
                logs.extend(output.logs);
                output.text
            }
            Err(error) => {
                warn!(hook = %kind, %error, "hook failed; using input unchanged");
                failures.push(HookFailure { hook: kind, error });
                text.to_string()
            }
        }
    }

    pub fn current_side(&self) -> Side {
        self.side
    }

    pub fn session_id(&self) -> Uuid {
        self.world.read(|w| w.session_id)
    }

    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.world.history()
    }

    pub fn context(&self) -> String {
        self.world.context()
    }

    pub fn transformed_context(&self) -> String {
        self.world.transformed_context()
    }

    pub fn front_memory(&self) -> String {
        self.world.front_memory()
    }

    pub fn authors_note(&self) -> String {
        self.world.authors_note()
    }

    pub fn story_cards(&self) -> Vec<StoryCard> {
        self.world.story_cards()
    }

    pub fn add_story_card(
        &self,
        keys: Vec<String>,
        entry: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Option<usize> {
        self.world.add_story_card(keys, entry, card_type)
    }

    pub fn remove_story_card(&self, index: usize) -> Result<StoryCard, StoryCardError> {
        self.world.remove_story_card(index)
    }

    pub fn update_story_card(
        &self,
        index: usize,
        keys: Vec<String>,
        entry: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Result<(), StoryCardError> {
        self.world.update_story_card(index, keys, entry, card_type)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.world.read(|w| SessionSnapshot {
            session_id: w.session_id,
            current_side: self.side,
            history: w.history().to_vec(),
            story_cards: w.story_cards.as_slice().to_vec(),
            context: w.context(),
            transformed_context: w.memory.transformed_context.clone(),
            authors_note: w.memory.authors_note.clone(),
            front_memory: w.memory.front_memory.clone(),
        })
    }
}
