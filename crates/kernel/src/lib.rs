//! Vetrina kernel library.
//!
//! Page versioning, the publishing lifecycle and its approval workflow, and
//! the scheduler tick, plus the HTTP API over them. The `vetrina` binary is
//! the entry point for running the server.

pub mod config;
pub mod content;
pub mod cron;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use state::AppState;
