//! Password sign-in request and response types

use serde::{Deserialize, Serialize};

use super::users::{Role, User, UserCreate};

/// Sign up request
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl SignUpRequest {
    /// Self-service accounts cannot be admins.
    pub fn validate(&self) -> Result<(), String> {
        if self.role == Some(Role::Admin) {
            return Err("Admin accounts cannot be self-registered".to_string());
        }
        crate::auth::credentials::check_password(&self.password)
    }

    pub fn to_create(&self) -> UserCreate {
        UserCreate {
            email: self.email.trim().to_lowercase(),
            name: self
                .name
                .as_ref()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            role: self.role,
        }
    }
}

/// Sign in request
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Sign out request; the refresh token is revoked when given
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignOutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Auth response with tokens
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: Option<Role>, password: &str) -> SignUpRequest {
        SignUpRequest {
            email: "  Farid@Contractors.MY ".to_string(),
            password: password.to_string(),
            name: Some("  Farid  ".to_string()),
            role,
        }
    }

    #[test]
    fn signup_rejects_admin_role_and_short_password() {
        assert!(request(Some(Role::Admin), "long-enough-1").validate().is_err());
        assert!(request(Some(Role::Contractor), "short").validate().is_err());
        assert!(request(Some(Role::Contractor), "long-enough-1").validate().is_ok());
        assert!(request(None, "long-enough-1").validate().is_ok());
    }

    #[test]
    fn signup_normalizes_email_and_name() {
        let create = request(Some(Role::Contractor), "long-enough-1").to_create();
        assert_eq!(create.email, "farid@contractors.my");
        assert_eq!(create.name.as_deref(), Some("Farid"));
        assert_eq!(create.role, Some(Role::Contractor));
    }
}
