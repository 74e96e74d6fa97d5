//! Hook script pipeline.
//!
//! A hook invocation fetches two script bodies (the shared library and the
//! hook itself), compiles them into one unit, exposes the invocation's
//! globals to it, and calls its `modifier` function once. Every failure along
//! the way comes back as a [`HookError`].

mod bindings;
mod loader;
mod source;

pub use bindings::{HookGlobals, BINDINGS};
pub use loader::{ScriptLoader, ENTRY_POINT};
pub use source::{FileSource, MemorySource, ScriptSource};

use thiserror::Error;

/// Why a hook produced no usable text.
///
/// The turn engine treats every variant the same way: the hook's input is
/// used unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// A script body could not be fetched.
    #[error("could not load script '{location}': {reason}")]
    Load { location: String, reason: String },

    /// The assembled unit failed to compile or raised an error while running.
    #[error("script '{location}' failed: {message}")]
    Script { location: String, message: String },

    /// `modifier` returned something other than a string or a map with a
    /// string `text` field.
    #[error("modifier returned {found}; expected a string or a map with a string `text` field")]
    Shape { found: String },
}

/// Successful result of one hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutput {
    pub text: String,
    /// Lines the script emitted with `log`, `print` or `debug`.
    pub logs: Vec<String>,
}
