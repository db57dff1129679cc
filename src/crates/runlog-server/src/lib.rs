//! HTTP query server and CLI support for runlog run stores
//!
//! The server reads run files written by `runlog::Run` while training is
//! still going on and serves them as JSON for the browser frontend.

pub mod api;
pub mod cli;
pub mod config;
pub mod server;
pub mod services;

pub use config::{ServerConfig, ServerConfigError};
pub use server::{bind, serve, shutdown_signal, ServerError};
pub use services::{MetricPointRecord, QueryService, RunSummary};
