//! Session construction and the shared session handle.
//!
//! [`SessionConfig`] says where scripts live. [`SessionHandle`] owns a
//! [`TurnEngine`] on a background task and serializes every request through
//! a queue, so concurrent callers never observe a half-finished turn.

use crate::engine::{SessionSnapshot, TurnEngine, TurnOutcome};
use crate::hooks::{HookConfig, HookRunner};
use crate::script::FileSource;
use crate::world::{Mode, StoryCard, StoryCardError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Requests buffered before callers wait on the queue.
const QUEUE_DEPTH: usize = 32;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session task has stopped")]
    Closed,

    #[error("Story card error: {0}")]
    StoryCard(#[from] StoryCardError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for opening a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory hook locations are resolved against.
    pub scripts_dir: PathBuf,

    pub hooks: HookConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("scripts")
    }
}

impl SessionConfig {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            hooks: HookConfig::default(),
        }
    }

    /// Read `SCRIPTBED_SCRIPTS_DIR` and `SCRIPTBED_MAX_OPERATIONS`.
    pub fn from_env() -> Result<Self, SessionError> {
        let mut config = match std::env::var("SCRIPTBED_SCRIPTS_DIR") {
            Ok(dir) => Self::new(dir),
            Err(_) => Self::default(),
        };
        if let Ok(limit) = std::env::var("SCRIPTBED_MAX_OPERATIONS") {
            let limit = parse_max_operations("SCRIPTBED_MAX_OPERATIONS", &limit)?;
            config = config.with_max_operations(limit);
        }
        Ok(config)
    }

    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = dir.into();
        self
    }

    pub fn with_hooks(mut self, hooks: HookConfig) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_max_operations(mut self, limit: u64) -> Self {
        self.hooks = self.hooks.with_max_operations(limit);
        self
    }

    /// A fresh engine reading scripts from `scripts_dir`.
    pub fn build_engine(&self) -> TurnEngine {
        let source = FileSource::new(self.scripts_dir.clone());
        TurnEngine::new(HookRunner::new(Arc::new(source), self.hooks.clone()))
    }
}

/// Parse an operation cap taken from `setting`.
///
/// Zero is rejected: the interpreter reads a zero cap as no cap at all.
pub fn parse_max_operations(setting: &str, raw: &str) -> Result<u64, SessionError> {
    match raw.trim().parse::<u64>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(SessionError::InvalidConfig(format!(
            "{setting} must be a positive integer, got '{raw}'"
        ))),
    }
}

enum Command {
    Input {
        mode: Option<Mode>,
        text: String,
        reply: oneshot::Sender<TurnOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    AddCard {
        keys: Vec<String>,
        entry: String,
        card_type: String,
        reply: oneshot::Sender<Option<usize>>,
    },
    RemoveCard {
        index: usize,
        reply: oneshot::Sender<Result<StoryCard, StoryCardError>>,
    },
    UpdateCard {
        index: usize,
        keys: Vec<String>,
        entry: String,
        card_type: String,
        reply: oneshot::Sender<Result<(), StoryCardError>>,
    },
}

/// Cloneable handle to a session running on its own task.
///
/// Requests are applied one at a time in arrival order. The task stops once
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Move `engine` onto a new task. Must be called inside a tokio runtime.
    pub fn spawn(engine: TurnEngine) -> Self {
        let (commands, queue) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run_session(engine, queue));
        Self { commands }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }

    pub async fn handle_input(
        &self,
        mode: Option<Mode>,
        text: impl Into<String>,
    ) -> Result<TurnOutcome, SessionError> {
        let text = text.into();
        self.request(|reply| Command::Input { mode, text, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn add_story_card(
        &self,
        keys: Vec<String>,
        entry: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Result<Option<usize>, SessionError> {
        let (entry, card_type) = (entry.into(), card_type.into());
        self.request(|reply| Command::AddCard {
            keys,
            entry,
            card_type,
            reply,
        })
        .await
    }

    pub async fn remove_story_card(&self, index: usize) -> Result<StoryCard, SessionError> {
        Ok(self
            .request(|reply| Command::RemoveCard { index, reply })
            .await??)
    }

    pub async fn update_story_card(
        &self,
        index: usize,
        keys: Vec<String>,
        entry: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Result<(), SessionError> {
        let (entry, card_type) = (entry.into(), card_type.into());
        Ok(self
            .request(|reply| Command::UpdateCard {
                index,
                keys,
                entry,
                card_type,
                reply,
            })
            .await??)
    }
}

async fn run_session(mut engine: TurnEngine, mut queue: mpsc::Receiver<Command>) {
    debug!(session = %engine.session_id(), "session task started");
    while let Some(command) = queue.recv().await {
        // A dropped reply receiver means the caller stopped waiting.
        match command {
            Command::Input { mode, text, reply } => {
                let outcome = engine.handle_input(mode, &text).await;
                let _ = reply.send(outcome);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(engine.snapshot());
            }
            Command::AddCard {
                keys,
                entry,
                card_type,
                reply,
            } => {
                let _ = reply.send(engine.add_story_card(keys, entry, card_type));
            }
            Command::RemoveCard { index, reply } => {
                let _ = reply.send(engine.remove_story_card(index));
            }
            Command::UpdateCard {
                index,
                keys,
                entry,
                card_type,
                reply,
            } => {
                let _ = reply.send(engine.update_story_card(index, keys, entry, card_type));
            }
        }
    }
    debug!(session = %engine.session_id(), "session task stopped");
}
