//! The three modifier hooks and where their scripts live.

use crate::script::{HookError, HookGlobals, HookOutput, ScriptLoader, ScriptSource};
use crate::world::SharedWorld;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which modifier a script implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    /// Runs on user text before it is recorded.
    Input,
    /// Runs on the assembled context after a user turn.
    Context,
    /// Runs on AI text before it is recorded.
    Output,
}

impl HookKind {
    pub const ALL: [HookKind; 3] = [HookKind::Input, HookKind::Context, HookKind::Output];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Input => "input",
            HookKind::Context => "context",
            HookKind::Output => "output",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Script locations and interpreter limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// Shared helpers prepended to every hook.
    pub library: String,
    pub input: String,
    pub context: String,
    pub output: String,
    /// Interpreter operation cap per invocation; unlimited when `None`.
    pub max_operations: Option<u64>,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            library: "library.rhai".to_string(),
            input: "input.rhai".to_string(),
            context: "context.rhai".to_string(),
            output: "output.rhai".to_string(),
            max_operations: None,
        }
    }
}

impl HookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, location: impl Into<String>) -> Self {
        self.library = location.into();
        self
    }

    pub fn with_location(mut self, kind: HookKind, location: impl Into<String>) -> Self {
        let location = location.into();
        match kind {
            HookKind::Input => self.input = location,
            HookKind::Context => self.context = location,
            HookKind::Output => self.output = location,
        }
        self
    }

    pub fn with_max_operations(mut self, limit: u64) -> Self {
        self.max_operations = Some(limit);
        self
    }

    pub fn location(&self, kind: HookKind) -> &str {
        match kind {
            HookKind::Input => &self.input,
            HookKind::Context => &self.context,
            HookKind::Output => &self.output,
        }
    }
}

/// Runs a hook's script against the world.
pub struct HookRunner {
    loader: ScriptLoader,
    config: HookConfig,
}

impl HookRunner {
    pub fn new(source: Arc<dyn ScriptSource>, config: HookConfig) -> Self {
        let mut loader = ScriptLoader::new(source);
        if let Some(limit) = config.max_operations {
            loader = loader.with_max_operations(limit);
        }
        Self { loader, config }
    }

    pub async fn run_input_modifier(
        &self,
        text: &str,
        world: &SharedWorld,
    ) -> Result<HookOutput, HookError> {
        self.run(HookKind::Input, text, world).await
    }

    pub async fn run_context_modifier(
        &self,
        text: &str,
        world: &SharedWorld,
    ) -> Result<HookOutput, HookError> {
        self.run(HookKind::Context, text, world).await
    }

    pub async fn run_output_modifier(
        &self,
        text: &str,
        world: &SharedWorld,
    ) -> Result<HookOutput, HookError> {
        self.run(HookKind::Output, text, world).await
    }

    /// Fetch the library and `kind`'s script, then call `modifier(text)`.
    pub async fn run(
        &self,
        kind: HookKind,
        text: &str,
        world: &SharedWorld,
    ) -> Result<HookOutput, HookError> {
        let globals = HookGlobals::new(kind, text, world.clone());
        self.loader
            .load(&self.config.library, self.config.location(kind), &globals)
            .await
    }
}
