//! JWT claims structure for HotPatch publication tokens.

use serde::{Deserialize, Serialize};

/// JWT claims embedded in bearer tokens issued to CLIs and dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// JWT ID (unique per token).
    pub jti: String,
    /// Subject (app ID).
    pub sub: String,
    /// App name, for log readability.
    pub app_name: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// The app this token authorizes.
    pub fn app_id(&self) -> &str {
        &self.sub
    }
}
