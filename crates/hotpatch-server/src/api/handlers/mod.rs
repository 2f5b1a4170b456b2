//! Request handlers, grouped by resource.

pub mod apps;
pub mod channels;
pub mod devices;
pub mod releases;
pub mod system;
pub mod update;
pub mod webhooks;
