use serde::{Deserialize, Serialize};

/// Body returned by the token endpoint after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token_type: String,
    pub access_token: String,
    /// Lifetime in seconds. Some servers omit it for long-lived tokens.
    #[serde(default)]
    pub expires_in: Option<u64>,
}
