//! SQLite storage layer for the HotPatch server.

mod db;
pub mod models;
mod queries;
mod queries_apps;
mod queries_audit;
mod queries_channels;
mod queries_devices;
mod queries_webhooks;

pub use db::Database;
pub use hotpatch_core::db::DatabaseError;

#[cfg(test)]
mod tests;
