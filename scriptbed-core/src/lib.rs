//! Scripted turn engine for interactive fiction.
//!
//! This crate provides:
//! - A sandbox that runs user-authored Rhai hook scripts against a shared world
//! - A two-party turn engine that alternates user and AI input through the hooks
//! - Story cards, memory fields and script-persistent state
//! - A queue-backed session handle that serializes turns
//!
//! # Quick Start
//!
//! ```ignore
//! use scriptbed_core::{Mode, SessionConfig, SessionHandle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new("scripts").with_max_operations(100_000);
//!     let session = SessionHandle::spawn(config.build_engine());
//!
//!     session.handle_input(Some(Mode::Do), "open the door").await?;
//!     session.handle_input(None, "The door swings open.").await?;
//!
//!     println!("{}", session.snapshot().await?.context);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod hooks;
pub mod script;
pub mod session;
pub mod testing;
pub mod world;

// Re-export for convenience
pub use engine::{HookFailure, SessionSnapshot, Side, TurnEngine, TurnOutcome, TurnReport};
pub use hooks::{HookConfig, HookKind, HookRunner};
pub use script::{FileSource, HookError, HookOutput, MemorySource, ScriptSource};
pub use session::{parse_max_operations, SessionConfig, SessionError, SessionHandle};
pub use world::{
    HistoryEntry, Mode, SharedWorld, StoryCard, StoryCardError, StoryCardRegistry, WorldState,
};
