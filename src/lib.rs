//! Oxichat - a lightweight real-time chat client core.
//!
//! This crate provides the state-management core of a chat client with clean
//! architecture: normalized channel/message state, optimistic message sends
//! reconciled against server push events, and pluggable transports.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the store, dispatcher, and reconciler.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing transport and configuration adapters.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "oxichat";
