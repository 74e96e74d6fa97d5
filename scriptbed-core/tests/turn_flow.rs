//! Turn flow tests against in-memory hook scripts.
//!
//! These tests verify the engine's turn contract:
//! - Side alternation and blank-input handling
//! - Hook ordering within a user turn
//! - Identity fallback for failing or malformed hooks
//! - Story-card changes made by hooks
//! - Serialized turns through a shared session handle

use scriptbed_core::testing::{
    assert_context_matches_history, assert_has_card, assert_history_len, assert_hook_failed,
    assert_no_failures, assert_side, TestHarness,
};
use scriptbed_core::{
    HookConfig, HookError, HookKind, HookRunner, MemorySource, Mode, SessionHandle, Side,
    TurnEngine, TurnOutcome,
};
use std::sync::Arc;

// =============================================================================
// BASIC TURNS
// =============================================================================

#[tokio::test]
async fn test_first_user_turn_with_identity_hooks() {
    let mut harness = TestHarness::new();

    let outcome = harness.say("hello").await;
    assert_no_failures(&outcome);

    let history = harness.engine.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].mode, Some(Mode::Say));
    assert_eq!(history[0].text, "hello");
    assert_side(&harness, Side::Ai);
    assert_eq!(harness.engine.context(), "hello");
}

#[tokio::test]
async fn test_ai_reply_has_empty_mode_and_returns_to_user() {
    let mut harness = TestHarness::new();
    harness.say("hello").await;

    harness.input(None, "world").await;

    let history = harness.engine.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].mode_str(), "");
    assert_eq!(history[1].text, "world");
    assert_side(&harness, Side::User);
}

#[tokio::test]
async fn test_whitespace_input_changes_nothing_on_either_side() {
    let mut harness = TestHarness::new();

    assert_eq!(harness.say("   ").await, TurnOutcome::Ignored);
    assert_history_len(&harness, 0);
    assert_side(&harness, Side::User);

    harness.say("hi").await;
    assert_eq!(harness.input(Some(Mode::Say), "\n\t ").await, TurnOutcome::Ignored);
    assert_history_len(&harness, 1);
    assert_side(&harness, Side::Ai);
}

#[tokio::test]
async fn test_context_tracks_history_over_many_turns() {
    let mut harness = TestHarness::new();
    harness.set_hook(HookKind::Output, r#"fn modifier(text) { text + "." }"#);

    for turn in 0..6 {
        harness.ai.queue(format!("reply {turn}"));
        harness.exchange(&format!("action {turn}")).await;
        assert_context_matches_history(&harness);
    }

    assert_history_len(&harness, 12);
    assert_eq!(harness.last_text().as_deref(), Some("reply 5."));
}

// =============================================================================
// HOOK ORDERING
// =============================================================================

#[tokio::test]
async fn test_context_hook_sees_entry_just_appended() {
    let mut harness = TestHarness::new();
    harness.set_hook(HookKind::Input, r#"fn modifier(text) { text.to_upper() }"#);
    harness.set_hook(
        HookKind::Context,
        r#"fn modifier(text) { "last=" + history[history.len() - 1].text + "|" + text }"#,
    );

    harness.act("open the chest").await;

    assert_eq!(
        harness.engine.transformed_context(),
        "last=OPEN THE CHEST|OPEN THE CHEST"
    );
    assert_eq!(harness.engine.context(), "OPEN THE CHEST");
}

#[tokio::test]
async fn test_context_is_recomputed_after_hook_appends_history() {
    let mut harness = TestHarness::new();
    harness.set_hook(
        HookKind::Input,
        r#"fn modifier(text) { appendHistory("story", "A bell rings."); text }"#,
    );

    harness.act("wait").await;

    assert_eq!(harness.history_texts(), vec!["A bell rings.", "wait"]);
    assert_eq!(harness.engine.transformed_context(), "A bell rings.\nwait");
    assert_context_matches_history(&harness);
}

#[tokio::test]
async fn test_output_hook_does_not_touch_transformed_context() {
    let mut harness = TestHarness::new();
    harness.set_hook(HookKind::Context, r#"fn modifier(text) { "ctx" }"#);

    harness.say("hi").await;
    harness.input(None, "hello there").await;

    assert_eq!(harness.engine.transformed_context(), "ctx");
}

// =============================================================================
// FAILURE CONTAINMENT
// =============================================================================

#[tokio::test]
async fn test_throwing_hook_still_completes_turn() {
    let mut harness = TestHarness::new();
    harness.set_hook(HookKind::Input, r#"fn modifier(text) { throw "broken"; }"#);

    let outcome = harness.act("jump").await;

    assert_hook_failed(&outcome, HookKind::Input);
    assert_history_len(&harness, 1);
    assert_eq!(harness.last_text().as_deref(), Some("jump"));
    assert_side(&harness, Side::Ai);
}

#[tokio::test]
async fn test_invalid_shapes_fall_back_to_input() {
    for body in [
        "fn modifier(text) { #{ text: 42 } }",
        "fn modifier(text) { #{} }",
        "fn modifier(text) { [text] }",
    ] {
        let mut harness = TestHarness::new();
        harness.set_hook(HookKind::Output, body);
        harness.say("hi").await;

        let outcome = harness.input(None, "the cave is cold").await;

        let report = outcome.report().unwrap();
        assert!(matches!(
            report.failures[0].error,
            HookError::Shape { .. }
        ));
        assert_eq!(report.entry.text, "the cave is cold");
    }
}

#[tokio::test]
async fn test_broken_library_fails_every_hook() {
    let mut harness = TestHarness::new();
    harness.set_library("fn helper( {");

    let outcome = harness.say("hi").await;

    assert_hook_failed(&outcome, HookKind::Input);
    assert_hook_failed(&outcome, HookKind::Context);
    assert_eq!(harness.engine.transformed_context(), "hi");
}

#[tokio::test]
async fn test_state_persists_between_invocations() {
    let mut harness = TestHarness::new();
    harness.set_library(
        r#"
        fn bump() {
            let count = if state.turns == () { 0 } else { state.turns };
            setState("turns", count + 1);
            count + 1
        }
        "#,
    );
    harness.set_hook(HookKind::Input, r#"fn modifier(text) { text + " #" + bump() }"#);

    harness.act("one").await;
    harness.reply().await;
    harness.act("two").await;

    assert_eq!(harness.history_texts()[2], "two #2");
    assert_eq!(harness.world().var("turns"), Some(serde_json::json!(2)));
}

#[tokio::test]
async fn test_trailing_modifier_call_has_one_side_effect() {
    let mut harness = TestHarness::new();
    harness.set_hook(
        HookKind::Input,
        "fn modifier(text) { appendHistory(\"side effect\"); text }\nmodifier(text);",
    );

    let outcome = harness.say("hello").await;

    assert_no_failures(&outcome);
    assert_history_len(&harness, 2);
    assert_eq!(harness.history_texts(), vec!["side effect", "hello"]);
}

#[tokio::test]
async fn test_trailing_modifier_call_without_separator_counts_once() {
    let mut harness = TestHarness::new();
    harness.set_hook(
        HookKind::Input,
        r#"
        fn modifier(text) {
            let n = if state.n == () { 0 } else { state.n };
            setState("n", n + 1);
            text
        }
        modifier(text)
        "#,
    );

    let outcome = harness.act("wait").await;

    assert_no_failures(&outcome);
    assert_history_len(&harness, 1);
    assert_eq!(harness.world().var("n"), Some(serde_json::json!(1)));
}

// =============================================================================
// STORY CARDS
// =============================================================================

#[tokio::test]
async fn test_hook_injected_card_is_visible_after_turn() {
    let mut harness = TestHarness::new();
    harness.set_hook(
        HookKind::Input,
        r#"
        fn modifier(text) {
            if text.contains("dragon") {
                addStoryCard(["dragon"], "A red dragon sleeps on gold.", "creature");
            }
            text
        }
        "#,
    );

    harness.act("look for the dragon").await;
    harness.reply().await;
    harness.act("look for the dragon again").await;

    assert_has_card(&harness, "dragon");
    assert_eq!(harness.card_count(), 1);
}

#[tokio::test]
async fn test_duplicate_card_is_rejected() {
    let harness = TestHarness::new();
    let keys = vec!["a".to_string(), "b".to_string()];

    assert_eq!(harness.engine.add_story_card(keys.clone(), "first", ""), Some(0));
    assert_eq!(harness.engine.add_story_card(keys, "second", ""), None);
    assert_eq!(harness.card_count(), 1);
}

#[tokio::test]
async fn test_removing_first_card_renumbers_second() {
    let harness = TestHarness::new();
    harness
        .engine
        .add_story_card(vec!["inn".to_string()], "The Gilded Goose", "location");
    harness
        .engine
        .add_story_card(vec!["innkeeper".to_string()], "Marta, gruff", "character");

    harness.engine.remove_story_card(0).unwrap();

    let cards = harness.engine.story_cards();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].id, 0);
    assert_eq!(cards[0].keys, vec!["innkeeper"]);
    assert_eq!(cards[0].entry, "Marta, gruff");
}

// =============================================================================
// SESSION HANDLE
// =============================================================================

#[tokio::test]
async fn test_concurrent_inputs_are_serialized() {
    let source = MemorySource::new()
        .with("library.rhai", "")
        .with("input.rhai", "fn modifier(text) { text }")
        .with(
            "context.rhai",
            r#"fn modifier(text) { "" + history.len() }"#,
        )
        .with("output.rhai", "fn modifier(text) { text }");
    let engine = TurnEngine::new(HookRunner::new(Arc::new(source), HookConfig::default()));
    let handle = SessionHandle::spawn(engine);

    let turns = (0..10).map(|i| {
        let handle = handle.clone();
        async move {
            let mode = if i % 2 == 0 { Some(Mode::Do) } else { None };
            handle.handle_input(mode, format!("input {i}")).await
        }
    });
    let outcomes = futures::future::join_all(turns).await;

    assert!(outcomes.iter().all(|o| o.is_ok()));
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.history.len(), 10);
    assert_eq!(snapshot.current_side, Side::User);
    assert_eq!(
        snapshot.context,
        snapshot
            .history
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    );

    let sides: Vec<Side> = outcomes
        .iter()
        .filter_map(|o| o.as_ref().ok().and_then(|o| o.report()).map(|r| r.side))
        .collect();
    for pair in sides.windows(2) {
        assert_ne!(pair[0], pair[1], "turns must alternate");
    }
}
