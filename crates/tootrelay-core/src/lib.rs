//! Core of the Mastodon → chat webhook relay.
//!
//! This crate is framework-agnostic. The streaming server and the outgoing
//! webhook live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod logging;
pub mod ports;
pub mod supervisor;
pub mod watcher;

pub use errors::{Error, Result};
