use uuid::Uuid;

use super::Claims;
use crate::domain::{Role, User};

/// Authenticated caller, attached to handlers by the auth extractors.
/// The user row is reloaded on every request so role changes and deletions
/// take effect before the token expires.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    claims: Claims,
}

impl AuthContext {
    pub fn new(user: User, claims: Claims) -> Self {
        Self { user, claims }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    /// Admins may act on anything; everyone else only on what they own.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.user.id == owner_id
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn context(role: Role) -> AuthContext {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            name: None,
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let claims = Claims {
            sub: user.id.to_string(),
            iss: "sitebuild".into(),
            iat: 0,
            exp: 0,
            email: None,
            role: None,
        };
        AuthContext::new(user, claims)
    }

    #[test]
    fn ownership_checks() {
        let client = context(Role::Client);
        assert!(client.can_access(client.user_id()));
        assert!(!client.can_access(Uuid::new_v4()));

        let admin = context(Role::Admin);
        assert!(admin.can_access(Uuid::new_v4()));
    }
}
