// src/config/mod.rs

//! Configuration loading and validation for fleetrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load config and workflow files from disk (`loader.rs`).
//! - Validate interpreter settings (`validate.rs`). Pool sizes are never
//!   rejected; they are normalised by [`crate::pool::PoolOptions::resolve`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default, load_workflow};
pub use model::{ConfigFile, InterpreterSection, RawConfigFile};
