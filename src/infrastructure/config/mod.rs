//! Infrastructure configuration modules.

pub mod engine;
pub mod logging;
pub mod persistence;
pub mod settings;
pub mod trading;
pub mod venue;
