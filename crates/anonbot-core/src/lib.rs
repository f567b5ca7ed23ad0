//! Core domain + application logic for the anonymous-message relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind a
//! port (trait) implemented in the adapter crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod relay;
pub mod store;

pub use errors::{Error, Result};
