use super::bindings::{HookGlobals, LogBuffer};
use super::{HookError, HookOutput, ScriptSource};
use rhai::{CallFnOptions, Dynamic, Engine, Map, Scope};
use std::sync::Arc;
use tracing::debug;

/// Function every hook unit must define, taking the input text.
pub const ENTRY_POINT: &str = "modifier";

/// Fetches, assembles and runs hook scripts.
///
/// Each call builds a fresh interpreter, so nothing a script defines survives
/// to the next invocation; persistent values go through `setState`.
pub struct ScriptLoader {
    source: Arc<dyn ScriptSource>,
    max_operations: Option<u64>,
}

impl ScriptLoader {
    pub fn new(source: Arc<dyn ScriptSource>) -> Self {
        Self {
            source,
            max_operations: None,
        }
    }

    /// Abort a script after `limit` interpreter operations.
    pub fn with_max_operations(mut self, limit: u64) -> Self {
        self.max_operations = Some(limit);
        self
    }

    /// Fetch `library` then `hook`, and run the pair against `globals`.
    pub async fn load(
        &self,
        library: &str,
        hook: &str,
        globals: &HookGlobals,
    ) -> Result<HookOutput, HookError> {
        let library_body = self.fetch(library).await?;
        let hook_body = self.fetch(hook).await?;
        self.execute(&library_body, &hook_body, hook, globals)
    }

    async fn fetch(&self, location: &str) -> Result<String, HookError> {
        self.source
            .fetch(location)
            .await
            .map_err(|err| HookError::Load {
                location: location.to_string(),
                reason: err.to_string(),
            })
    }

    /// Run already-fetched bodies. `location` names the hook in errors.
    ///
    /// The library's definitions come first, so a hook may redefine a
    /// library function of the same arity. Top-level statements are never
    /// evaluated: a trailing `modifier(text)` call, with or without `;`, is
    /// inert and `modifier` runs exactly once.
    pub fn execute(
        &self,
        library: &str,
        hook: &str,
        location: &str,
        globals: &HookGlobals,
    ) -> Result<HookOutput, HookError> {
        let script_error = |message: String| HookError::Script {
            location: location.to_string(),
            message,
        };

        let logs = LogBuffer::default();
        let mut engine = Engine::new();
        if let Some(limit) = self.max_operations {
            engine.set_max_operations(limit);
        }
        globals.install(&mut engine, &logs);

        let library_ast = engine
            .compile(library)
            .map_err(|e| script_error(format!("library: {e}")))?;
        let hook_ast = engine.compile(hook).map_err(|e| script_error(e.to_string()))?;
        let unit = library_ast.merge(&hook_ast);

        let defines_entry = unit
            .iter_functions()
            .any(|f| f.name == ENTRY_POINT && f.params.len() == 1);
        if !defines_entry {
            return Err(script_error(format!(
                "no `{ENTRY_POINT}(text)` function defined"
            )));
        }

        let mut scope = Scope::new();
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let value: Dynamic = engine
            .call_fn_with_options(
                options,
                &mut scope,
                &unit,
                ENTRY_POINT,
                (globals.text().to_string(),),
            )
            .map_err(|e| script_error(e.to_string()))?;

        let text = captured_text(value)?;
        let logs = std::mem::take(&mut *logs.borrow_mut());
        debug!(hook = %globals.kind(), location, lines = logs.len(), "hook returned");
        Ok(HookOutput { text, logs })
    }
}

/// Accept a string, or a map whose `text` field is a string.
fn captured_text(value: Dynamic) -> Result<String, HookError> {
    if value.is_map() {
        let text = value.try_cast::<Map>().and_then(|mut map| map.remove("text"));
        return match text.map(Dynamic::into_string) {
            Some(Ok(text)) => Ok(text),
            Some(Err(found)) => Err(HookError::Shape {
                found: format!("a map whose `text` is {found}"),
            }),
            None => Err(HookError::Shape {
                found: "a map without `text`".to_string(),
            }),
        };
    }
    let found = value.type_name();
    value
        .into_string()
        .map_err(|_| HookError::Shape { found: found.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookKind;
    use crate::script::MemorySource;
    use crate::world::{HistoryEntry, Mode, SharedWorld};

    const IDENTITY: &str = "fn modifier(text) { text }";

    fn loader() -> ScriptLoader {
        ScriptLoader::new(Arc::new(MemorySource::new()))
    }

    fn run(library: &str, hook: &str, text: &str, world: &SharedWorld) -> Result<HookOutput, HookError> {
        let globals = HookGlobals::new(HookKind::Input, text, world.clone());
        loader().execute(library, hook, "input.rhai", &globals)
    }

    #[test]
    fn test_identity_hook() {
        let out = run("", IDENTITY, "open the door", &SharedWorld::new()).unwrap();
        assert_eq!(out.text, "open the door");
        assert!(out.logs.is_empty());
    }

    #[test]
    fn test_map_with_text_is_accepted() {
        let out = run("", "fn modifier(text) { #{ text: text + \"!\" } }", "hi", &SharedWorld::new())
            .unwrap();
        assert_eq!(out.text, "hi!");
    }

    #[test]
    fn test_library_helpers_are_callable() {
        let library = "fn shout(s) { s.to_upper() }";
        let hook = "fn modifier(text) { shout(text) }";
        let out = run(library, hook, "hello", &SharedWorld::new()).unwrap();
        assert_eq!(out.text, "HELLO");
    }

    #[test]
    fn test_bindings_visible_inside_modifier() {
        let world = SharedWorld::new();
        world.append_history(HistoryEntry::new(Some(Mode::Say), "first"));
        let hook = r#"
            fn modifier(text) {
                text + "|" + history.len() + "|" + info.actionCount + "|" + info.hook
            }
        "#;
        let out = run("", hook, "x", &world).unwrap();
        assert_eq!(out.text, "x|1|1|input");
    }

    #[test]
    fn test_card_added_by_hook_is_visible_immediately() {
        let world = SharedWorld::new();
        let hook = r#"
            fn modifier(text) {
                let index = addStoryCard(["wizard"], "An old wizard", "character");
                storyCards[index].entry
            }
        "#;
        let out = run("", hook, "x", &world).unwrap();
        assert_eq!(out.text, "An old wizard");
        assert_eq!(world.story_cards().len(), 1);
    }

    #[test]
    fn test_duplicate_keys_return_false() {
        let world = SharedWorld::new();
        world.add_story_card(vec!["wizard".to_string()], "first", "");
        let hook = r#"fn modifier(text) { if addStoryCard("wizard", "second") == false { "dup" } else { "added" } }"#;
        assert_eq!(run("", hook, "x", &world).unwrap().text, "dup");
        assert_eq!(world.story_cards().len(), 1);
    }

    #[test]
    fn test_bad_remove_is_catchable() {
        let hook = r#"
            fn modifier(text) {
                let result = "removed";
                try { removeStoryCard(9); } catch (err) { result = "caught"; }
                result
            }
        "#;
        assert_eq!(run("", hook, "x", &SharedWorld::new()).unwrap().text, "caught");
    }

    #[test]
    fn test_uncaught_error_is_script_error() {
        let err = run("", r#"fn modifier(text) { throw "boom"; }"#, "x", &SharedWorld::new())
            .unwrap_err();
        match err {
            HookError::Script { location, message } => {
                assert_eq!(location, "input.rhai");
                assert!(message.contains("boom"));
            }
            other => panic!("expected script error, got {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error_is_script_error() {
        let err = run("", "fn modifier(text) { text +", "x", &SharedWorld::new()).unwrap_err();
        assert!(matches!(err, HookError::Script { .. }));
    }

    #[test]
    fn test_missing_modifier() {
        let err = run("", "fn other(text) { text }", "x", &SharedWorld::new()).unwrap_err();
        assert!(matches!(err, HookError::Script { ref message, .. } if message.contains("modifier")));
    }

    #[test]
    fn test_wrong_shapes() {
        let world = SharedWorld::new();
        let err = run("", "fn modifier(text) { #{ text: 42 } }", "x", &world).unwrap_err();
        assert!(matches!(err, HookError::Shape { .. }));

        let err = run("", "fn modifier(text) { #{} }", "x", &world).unwrap_err();
        assert!(matches!(err, HookError::Shape { .. }));

        let err = run("", "fn modifier(text) { 7 }", "x", &world).unwrap_err();
        assert!(matches!(err, HookError::Shape { ref found } if found == "i64"));
    }

    #[test]
    fn test_modifier_runs_once() {
        let world = SharedWorld::new();
        let hook = r#"fn modifier(text) { appendHistory("ran"); text }"#;
        run("", hook, "x", &world).unwrap();
        assert_eq!(world.history_len(), 1);
    }

    #[test]
    fn test_trailing_call_with_semicolon_runs_once() {
        let world = SharedWorld::new();
        let hook = "fn modifier(text) { appendHistory(\"side effect\"); text }\nmodifier(text);";
        let out = run("", hook, "hello", &world).unwrap();
        assert_eq!(out.text, "hello");
        assert_eq!(world.history_len(), 1);
    }

    #[test]
    fn test_trailing_call_without_semicolon_runs_once() {
        let world = SharedWorld::new();
        let hook = r#"
            fn modifier(text) {
                let n = if state.n == () { 0 } else { state.n };
                setState("n", n + 1);
                text
            }
            modifier(text)
        "#;
        let out = run("", hook, "hello", &world).unwrap();
        assert_eq!(out.text, "hello");
        assert_eq!(world.var("n"), Some(serde_json::json!(1)));
    }

    #[test]
    fn test_state_and_memory_writes() {
        let world = SharedWorld::new();
        let hook = r#"
            fn modifier(text) {
                setState("turns", 3);
                setAuthorsNote("dark and stormy");
                appendHistory("say", "hello");
                "" + state.turns + ":" + state.memory.authorsNote
            }
        "#;
        let out = run("", hook, "x", &world).unwrap();
        assert_eq!(out.text, "3:dark and stormy");
        assert_eq!(world.var("turns"), Some(serde_json::json!(3)));
        assert_eq!(world.history()[0].mode, Some(Mode::Say));
    }

    #[test]
    fn test_memory_key_is_reserved() {
        let hook = r#"fn modifier(text) { setState("memory", 1); text }"#;
        let err = run("", hook, "x", &SharedWorld::new()).unwrap_err();
        assert!(matches!(err, HookError::Script { .. }));
    }

    #[test]
    fn test_logs_are_captured() {
        let hook = r#"fn modifier(text) { log("one"); print("two"); text }"#;
        let out = run("", hook, "x", &SharedWorld::new()).unwrap();
        assert_eq!(out.logs, vec!["one", "two"]);
    }

    #[test]
    fn test_operation_limit_aborts_runaway_loop() {
        let globals = HookGlobals::new(HookKind::Output, "x", SharedWorld::new());
        let err = loader()
            .with_max_operations(1_000)
            .execute("", "fn modifier(text) { loop {} }", "output.rhai", &globals)
            .unwrap_err();
        assert!(matches!(err, HookError::Script { .. }));
    }

    #[tokio::test]
    async fn test_load_reports_missing_script() {
        let source = MemorySource::new().with("library.rhai", "");
        let loader = ScriptLoader::new(Arc::new(source));
        let globals = HookGlobals::new(HookKind::Context, "", SharedWorld::new());
        let err = loader
            .load("library.rhai", "context.rhai", &globals)
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Load { ref location, .. } if location == "context.rhai"));
    }
}
