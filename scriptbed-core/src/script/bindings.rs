//! The globals view a hook runs against.
//!
//! Read bindings are served by a variable resolver that consults the live
//! world on every access, so a hook that adds a story card sees it in
//! `storyCards` on the next line. Bindings are read-only inside the script;
//! all writes go through the host functions registered here.

use crate::hooks::HookKind;
use crate::world::{HistoryEntry, Mode, SharedWorld, StoryCard, StoryCardError, WorldState};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, INT};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

/// Names a hook can read without declaring them.
pub const BINDINGS: [&str; 5] = ["text", "state", "history", "storyCards", "info"];

/// Lines captured from one invocation.
pub(crate) type LogBuffer = Rc<RefCell<Vec<String>>>;

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Per-invocation globals: the hook's input text plus a handle to the world.
///
/// Lives for a single hook call.
#[derive(Debug, Clone)]
pub struct HookGlobals {
    kind: HookKind,
    text: String,
    world: SharedWorld,
}

impl HookGlobals {
    pub fn new(kind: HookKind, text: impl Into<String>, world: SharedWorld) -> Self {
        Self {
            kind,
            text: text.into(),
            world,
        }
    }

    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    /// Current value of a read binding, or `None` if `name` is not one.
    pub fn resolve(&self, name: &str) -> Option<Dynamic> {
        match name {
            "text" => Some(Dynamic::from(self.text.clone())),
            "state" => Some(self.world.read(state_view)),
            "history" => Some(self.world.read(|w| history_view(w.history()))),
            "storyCards" => Some(self.world.read(|w| cards_view(w.story_cards.as_slice()))),
            "info" => Some(self.world.read(|w| info_view(self.kind, w))),
            _ => None,
        }
    }

    /// Register the resolver and host functions on a fresh engine.
    pub(crate) fn install(&self, engine: &mut Engine, logs: &LogBuffer) {
        let globals = self.clone();
        engine.on_var(move |name, _index, context| {
            // Locals and parameters shadow bindings.
            if context.scope().contains(name) {
                return Ok(None);
            }
            Ok(globals.resolve(name))
        });

        self.install_story_cards(engine);
        self.install_memory(engine);
        self.install_logging(engine, logs);
    }

    fn install_story_cards(&self, engine: &mut Engine) {
        let world = self.world.clone();
        engine.register_fn(
            "addStoryCard",
            move |keys: Array, entry: &str, card_type: &str| -> ScriptResult<Dynamic> {
                Ok(add_card(&world, keys_from_array(keys)?, entry, card_type))
            },
        );
        let world = self.world.clone();
        engine.register_fn(
            "addStoryCard",
            move |keys: &str, entry: &str, card_type: &str| -> Dynamic {
                add_card(&world, keys_from_str(keys), entry, card_type)
            },
        );
        let world = self.world.clone();
        engine.register_fn(
            "addStoryCard",
            move |keys: Array, entry: &str| -> ScriptResult<Dynamic> {
                Ok(add_card(&world, keys_from_array(keys)?, entry, ""))
            },
        );
        let world = self.world.clone();
        engine.register_fn("addStoryCard", move |keys: &str, entry: &str| -> Dynamic {
            add_card(&world, keys_from_str(keys), entry, "")
        });

        let world = self.world.clone();
        engine.register_fn("removeStoryCard", move |index: INT| -> ScriptResult<()> {
            world
                .remove_story_card(card_index(index)?)
                .map(|_| ())
                .map_err(card_error)
        });

        let world = self.world.clone();
        engine.register_fn(
            "updateStoryCard",
            move |index: INT, keys: Array, entry: &str, card_type: &str| -> ScriptResult<()> {
                world
                    .update_story_card(card_index(index)?, keys_from_array(keys)?, entry, card_type)
                    .map_err(card_error)
            },
        );
        let world = self.world.clone();
        engine.register_fn(
            "updateStoryCard",
            move |index: INT, keys: &str, entry: &str, card_type: &str| -> ScriptResult<()> {
                world
                    .update_story_card(card_index(index)?, keys_from_str(keys), entry, card_type)
                    .map_err(card_error)
            },
        );
    }

    fn install_memory(&self, engine: &mut Engine) {
        let world = self.world.clone();
        engine.register_fn("appendHistory", move |text: &str| {
            world.append_history(HistoryEntry::new(None, text));
        });
        let world = self.world.clone();
        engine.register_fn(
            "appendHistory",
            move |mode: &str, text: &str| -> ScriptResult<()> {
                let mode = if mode.is_empty() {
                    None
                } else {
                    Some(mode.parse::<Mode>().map_err(|e| script_error(e.to_string()))?)
                };
                world.append_history(HistoryEntry::new(mode, text));
                Ok(())
            },
        );

        let world = self.world.clone();
        engine.register_fn("setAuthorsNote", move |note: &str| {
            world.write(|w| w.memory.authors_note = note.to_string());
        });
        let world = self.world.clone();
        engine.register_fn("setFrontMemory", move |memory: &str| {
            world.write(|w| w.memory.front_memory = memory.to_string());
        });

        let world = self.world.clone();
        engine.register_fn(
            "setState",
            move |key: &str, value: Dynamic| -> ScriptResult<()> {
                if key == "memory" {
                    return Err(script_error(
                        "`state.memory` is read-only; use setAuthorsNote or setFrontMemory".to_string(),
                    ));
                }
                let value: serde_json::Value = rhai::serde::from_dynamic(&value)?;
                world.write(|w| {
                    if value.is_null() {
                        w.vars.remove(key);
                    } else {
                        w.vars.insert(key.to_string(), value);
                    }
                });
                Ok(())
            },
        );
    }

    fn install_logging(&self, engine: &mut Engine, logs: &LogBuffer) {
        let kind = self.kind;

        let buffer = logs.clone();
        engine.register_fn("log", move |value: Dynamic| {
            record(&buffer, kind, value.to_string());
        });
        let buffer = logs.clone();
        engine.on_print(move |line| record(&buffer, kind, line.to_string()));
        let buffer = logs.clone();
        engine.on_debug(move |line, _source, _pos| record(&buffer, kind, line.to_string()));
    }
}

fn record(logs: &LogBuffer, kind: HookKind, line: String) {
    info!(target: "scriptbed::hook", hook = %kind, "{line}");
    logs.borrow_mut().push(line);
}

fn script_error(message: String) -> Box<EvalAltResult> {
    message.into()
}

fn card_error(err: StoryCardError) -> Box<EvalAltResult> {
    script_error(err.to_string())
}

fn card_index(index: INT) -> ScriptResult<usize> {
    usize::try_from(index)
        .map_err(|_| script_error(format!("story card index {index} is out of range")))
}

fn add_card(world: &SharedWorld, keys: Vec<String>, entry: &str, card_type: &str) -> Dynamic {
    match world.add_story_card(keys, entry, card_type) {
        Some(index) => Dynamic::from(index as INT),
        None => Dynamic::from(false),
    }
}

fn keys_from_array(keys: Array) -> ScriptResult<Vec<String>> {
    keys.into_iter()
        .map(|key| {
            key.into_string()
                .map_err(|found| script_error(format!("story card keys must be strings, found {found}")))
        })
        .collect()
}

/// `"a, b"` is shorthand for `["a", "b"]`.
fn keys_from_str(keys: &str) -> Vec<String> {
    keys.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

fn json_to_dynamic(value: &serde_json::Value) -> Dynamic {
    rhai::serde::to_dynamic(value).unwrap_or(Dynamic::UNIT)
}

fn state_view(world: &WorldState) -> Dynamic {
    let mut state = Map::new();
    for (key, value) in &world.vars {
        state.insert(key.as_str().into(), json_to_dynamic(value));
    }

    let mut memory = Map::new();
    memory.insert("context".into(), Dynamic::from(world.context()));
    memory.insert(
        "authorsNote".into(),
        Dynamic::from(world.memory.authors_note.clone()),
    );
    memory.insert(
        "frontMemory".into(),
        Dynamic::from(world.memory.front_memory.clone()),
    );
    memory.insert(
        "transformedContext".into(),
        Dynamic::from(world.memory.transformed_context.clone()),
    );
    state.insert("memory".into(), Dynamic::from_map(memory));

    Dynamic::from_map(state)
}

fn history_view(history: &[HistoryEntry]) -> Dynamic {
    let entries: Array = history
        .iter()
        .map(|entry| {
            let mut map = Map::new();
            map.insert("mode".into(), Dynamic::from(entry.mode_str().to_string()));
            map.insert("text".into(), Dynamic::from(entry.text.clone()));
            Dynamic::from_map(map)
        })
        .collect();
    Dynamic::from_array(entries)
}

fn cards_view(cards: &[StoryCard]) -> Dynamic {
    let cards: Array = cards
        .iter()
        .map(|card| {
            let keys: Array = card.keys.iter().cloned().map(Dynamic::from).collect();
            let mut map = Map::new();
            map.insert("id".into(), Dynamic::from(card.id as INT));
            map.insert("keys".into(), Dynamic::from_array(keys));
            map.insert("entry".into(), Dynamic::from(card.entry.clone()));
            map.insert("type".into(), Dynamic::from(card.card_type.clone()));
            Dynamic::from_map(map)
        })
        .collect();
    Dynamic::from_array(cards)
}

fn info_view(kind: HookKind, world: &WorldState) -> Dynamic {
    let mut info = Map::new();
    info.insert(
        "actionCount".into(),
        Dynamic::from(world.history().len() as INT),
    );
    info.insert("hook".into(), Dynamic::from(kind.as_str().to_string()));
    Dynamic::from_map(info)
}
