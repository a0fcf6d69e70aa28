//! Developer tooling: engine inspector for the window title and the CLI.
//!
//! # Invariants
//! - Tools only read engine state; they never mutate it.

mod inspector;

pub use inspector::{EngineInspector, EngineSummary, LightSummary};
