//! `HotPatch` Core Library
//!
//! Shared functionality for `HotPatch` components:
//! - Environment-driven configuration
//! - `SQLite` pool helpers and shared database error type
//! - Tracing/logging initialization

pub mod config;
pub mod db;
pub mod tracing_init;

pub use config::Config;
