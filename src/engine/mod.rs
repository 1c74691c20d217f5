// src/engine/mod.rs

//! Workflow execution engine.
//!
//! The pure status folding lives in [`rollup`]; the async shell that borrows
//! sessions from the pool and records results is [`runner`].

pub mod rollup;
pub mod runner;

pub use rollup::{step_status, workflow_status};
pub use runner::Runner;
