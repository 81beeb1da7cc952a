#![allow(dead_code)]

pub mod engine;
pub mod notifier;
pub mod position;
