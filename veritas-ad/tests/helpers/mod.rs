//! Test Helper Utilities
//!
//! Shared utilities for testing veritas-ad

#![allow(dead_code)]

pub mod engines;

pub use engines::{
    orchestrator_with, scratch_entries, Behavior, ScriptedEngine, FAKE_RESULT, VALID_RESULT,
};

#[cfg(unix)]
pub use engines::{process_alive, sh_engine};
