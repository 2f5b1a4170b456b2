//! Signed outbound webhook notifications.

mod dispatcher;

pub use dispatcher::{sign_payload, RetryPolicy, WebhookDispatcher, WebhookEvent};

/// Event verb dispatched after a successful publish.
pub const EVENT_RELEASE_CREATED: &str = "release.created";

/// Event verb dispatched after a rollback.
pub const EVENT_RELEASE_ROLLED_BACK: &str = "release.rolled_back";
