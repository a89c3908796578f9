use serde::{Deserialize, Serialize};

/// JWT claims carried by access tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// User email at issue time - optional
    #[serde(default)]
    pub email: Option<String>,

    /// User role at issue time - optional, informational only
    #[serde(default)]
    pub role: Option<String>,
}
