//! Infrastructure layer.
//!
//! Provides technical concerns that support the application without containing
//! business logic: configuration, position persistence, the stop file and runtime wiring.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation
//! - [`snapshot`] - Open position snapshot and auto-save
//! - [`stop_file`] - Shutdown on request through a marker file

pub mod bootstrap;
pub mod config;
pub mod snapshot;
pub mod stop_file;
