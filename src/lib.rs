#![doc = include_str!("../docs/rustdoc.md")]

/// REST client for check runs, status, history and config.
pub mod api;
/// Command-line argument definitions.
pub mod cli;
/// Reconnecting push-channel client and its driver task.
pub mod client;
/// Shared connection state and counters.
pub mod client_state;
/// Runtime configuration model.
pub mod config;
/// Error types used across the crate.
pub mod error;
/// Event kinds and payloads delivered to listeners.
pub mod events;
/// Terminal output formatters.
pub mod formatter;
/// Metrics and health status structures.
pub mod monitoring;
/// Listener registry and dispatch.
pub mod registry;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Transport seam and the WebSocket implementation.
pub mod transport;
/// Wire models for the push channel and REST api.
pub mod types;
/// Dashboard controller.
pub mod ui;

pub use client::ChannelClient;
pub use error::{ApiError, ChannelError, SetupError};
