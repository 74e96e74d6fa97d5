//! Testing utilities for hook scripts and turn flow.
//!
//! This module provides tools for integration testing:
//! - `MockAi` for scripted AI replies
//! - `TestHarness` for driving a session from in-memory scripts
//! - Assertion helpers for verifying world state

use crate::engine::{Side, TurnEngine, TurnOutcome};
use crate::hooks::{HookConfig, HookKind, HookRunner};
use crate::script::MemorySource;
use crate::world::{Mode, SharedWorld};
use std::collections::VecDeque;
use std::sync::Arc;

/// A hook that returns its input unchanged.
pub const IDENTITY_HOOK: &str = "fn modifier(text) { text }";

/// Queued AI replies, returned in order.
#[derive(Debug, Clone, Default)]
pub struct MockAi {
    replies: VecDeque<String>,
}

impl MockAi {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
        }
    }

    pub fn queue(&mut self, reply: impl Into<String>) {
        self.replies.push_back(reply.into());
    }

    /// Next reply, or a fixed line once the queue is empty.
    pub fn next_reply(&mut self) -> String {
        self.replies
            .pop_front()
            .unwrap_or_else(|| "The narrator has nothing more to say.".to_string())
    }
}

/// Test harness for scripted sessions.
///
/// Every hook starts as the identity; replace one with [`set_hook`].
///
/// [`set_hook`]: TestHarness::set_hook
pub struct TestHarness {
    pub engine: TurnEngine,
    pub ai: MockAi,
    source: Arc<MemorySource>,
    config: HookConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(HookConfig::default())
    }

    pub fn with_config(config: HookConfig) -> Self {
        let source = MemorySource::new().with(config.library.clone(), "");
        for kind in HookKind::ALL {
            source.insert(config.location(kind), IDENTITY_HOOK);
        }
        let source = Arc::new(source);
        let runner = HookRunner::new(source.clone(), config.clone());
        Self {
            engine: TurnEngine::new(runner),
            ai: MockAi::default(),
            source,
            config,
        }
    }

    pub fn set_library(&self, body: &str) {
        self.source.insert(self.config.library.clone(), body);
    }

    pub fn set_hook(&self, kind: HookKind, body: &str) {
        self.source.insert(self.config.location(kind), body);
    }

    /// Make `kind`'s script unfetchable.
    pub fn remove_hook(&self, kind: HookKind) {
        self.source.remove(self.config.location(kind));
    }

    pub async fn input(&mut self, mode: Option<Mode>, text: &str) -> TurnOutcome {
        self.engine.handle_input(mode, text).await
    }

    pub async fn say(&mut self, text: &str) -> TurnOutcome {
        self.input(Some(Mode::Say), text).await
    }

    pub async fn act(&mut self, text: &str) -> TurnOutcome {
        self.input(Some(Mode::Do), text).await
    }

    /// Feed the next [`MockAi`] reply as the AI turn.
    pub async fn reply(&mut self) -> TurnOutcome {
        let reply = self.ai.next_reply();
        self.input(None, &reply).await
    }

    /// A user `do` turn followed by the next scripted AI reply.
    pub async fn exchange(&mut self, text: &str) -> (TurnOutcome, TurnOutcome) {
        let user = self.act(text).await;
        let ai = self.reply().await;
        (user, ai)
    }

    pub fn world(&self) -> &SharedWorld {
        self.engine.world()
    }

    pub fn side(&self) -> Side {
        self.engine.current_side()
    }

    pub fn history_texts(&self) -> Vec<String> {
        self.engine.history().into_iter().map(|e| e.text).collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.engine.history().pop().map(|e| e.text)
    }

    pub fn card_count(&self) -> usize {
        self.world().story_cards().len()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert the engine expects input from `side`.
#[track_caller]
pub fn assert_side(harness: &TestHarness, side: Side) {
    assert_eq!(harness.side(), side, "unexpected side to move");
}

#[track_caller]
pub fn assert_history_len(harness: &TestHarness, len: usize) {
    let actual = harness.world().history_len();
    assert_eq!(actual, len, "expected {len} history entries, found {actual}");
}

/// Assert the derived context is the newline join of the history.
#[track_caller]
pub fn assert_context_matches_history(harness: &TestHarness) {
    let expected = harness.history_texts().join("\n");
    assert_eq!(harness.engine.context(), expected);
}

#[track_caller]
pub fn assert_hook_failed(outcome: &TurnOutcome, kind: HookKind) {
    let Some(report) = outcome.report() else {
        panic!("turn was ignored");
    };
    assert!(
        report.failed(kind),
        "expected {kind} hook to fail, failures: {:?}",
        report.failures
    );
}

#[track_caller]
pub fn assert_no_failures(outcome: &TurnOutcome) {
    let Some(report) = outcome.report() else {
        panic!("turn was ignored");
    };
    assert!(
        report.failures.is_empty(),
        "unexpected hook failures: {:?}",
        report.failures
    );
}

#[track_caller]
pub fn assert_has_card(harness: &TestHarness, key: &str) {
    assert!(
        harness.world().story_cards().iter().any(|c| c.has_key(key)),
        "no story card with key '{key}'"
    );
}
