use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::api::DataResponse;
use crate::auth::RequireAuth;
use crate::domain::User;

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// Get current authenticated user info
pub async fn get_me(auth: RequireAuth) -> DataResponse<MeResponse> {
    let token_expires_at = Utc.timestamp_opt(auth.claims().exp, 0).single();
    DataResponse::new(MeResponse {
        user: auth.user.clone(),
        token_expires_at,
    })
}
