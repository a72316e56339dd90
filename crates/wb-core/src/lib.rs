//! Core of the welcome bot: config, persistence, template rendering, delayed
//! verification and admin commands.
//!
//! This crate is framework-agnostic. The chat platform lives behind
//! [`messaging::port::ChatPort`], implemented in the adapter crate.

pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod onboarding;
pub mod reaper;
pub mod render;
pub mod scheduler;
pub mod security;
pub mod settings;
pub mod store;
pub mod tasks;
pub mod welcome;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
