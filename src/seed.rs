//! Sample users for local development.

use anyhow::{Context, Result};

use crate::client::Client;
use crate::domain::{Role, User, UserCreate, UserUnique, UserUpdate};

pub const SAMPLE_USERS: [(&str, &str, Role); 4] = [
    ("admin@contractors.my", "System Administrator", Role::Admin),
    ("ahmad@civileng.my", "Ahmad bin Abdullah", Role::Contractor),
    ("sarah@electrical.my", "Sarah Lim", Role::Contractor),
    ("mohd@consultant.my", "Mohd Hassan", Role::Client),
];

/// Upsert the sample users by email. Safe to run repeatedly.
pub async fn seed_users(client: &Client) -> Result<Vec<User>> {
    let mut users = Vec::with_capacity(SAMPLE_USERS.len());
    for (email, name, role) in SAMPLE_USERS {
        let user = client
            .user()
            .upsert(
                UserUnique::Email(email.to_string()),
                UserCreate {
                    email: email.to_string(),
                    name: Some(name.to_string()),
                    role: Some(role),
                },
                UserUpdate {
                    name: Some(Some(name.to_string())),
                    role: Some(role),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("Failed to seed user {}", email))?;
        users.push(user);
    }

    tracing::info!(count = users.len(), "Seeded sample users");
    Ok(users)
}
