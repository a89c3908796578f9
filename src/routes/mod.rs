pub mod admin;
pub mod auth;
pub mod bids;
pub mod compliance;
pub mod designs;
pub mod health;
pub mod materials;
pub mod me;
pub mod projects;
pub mod tasks;
pub mod users;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app::AppState;
use crate::client::GroupByRow;

/// Group-by rows keyed on `status`, as status label to row count
pub(crate) fn counts_by_status(groups: &[GroupByRow]) -> BTreeMap<String, i64> {
    groups
        .iter()
        .filter_map(|row| {
            row.key_str("status")
                .map(|status| (status.to_string(), row.aggregates.count_all()))
        })
        .collect()
}

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/refresh", post(auth::refresh_token))
        // Protected routes
        .route("/auth/signout", post(auth::sign_out))
        .route("/me", get(me::get_me))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:user_id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        // Projects
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/projects/stats", get(projects::project_stats))
        .route(
            "/projects/:project_id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        // Bids
        .route(
            "/projects/:project_id/bids",
            get(bids::list_bids).post(bids::create_bid),
        )
        .route("/projects/:project_id/bids/summary", get(bids::bid_summary))
        .route("/bids/analytics", get(bids::bid_analytics))
        .route("/bids/estimate", post(bids::estimate_bid))
        .route(
            "/bids/:bid_id",
            patch(bids::update_bid).delete(bids::delete_bid),
        )
        // Materials
        .route(
            "/projects/:project_id/materials",
            get(materials::list_materials)
                .post(materials::create_materials)
                .delete(materials::clear_materials),
        )
        .route(
            "/projects/:project_id/materials/cost",
            get(materials::material_cost),
        )
        .route(
            "/materials/:material_id",
            put(materials::update_material).delete(materials::delete_material),
        )
        // Tasks
        .route(
            "/projects/:project_id/tasks",
            get(tasks::list_project_tasks).post(tasks::create_task),
        )
        .route("/tasks", get(tasks::my_tasks))
        .route(
            "/tasks/:task_id",
            put(tasks::update_task).delete(tasks::delete_task),
        )
        // Structural designs
        .route("/designs/calculate", post(designs::calculate_design))
        .route("/designs/standards", get(designs::list_standards))
        .route(
            "/projects/:project_id/designs",
            get(designs::list_designs).post(designs::create_design),
        )
        .route(
            "/designs/:design_id",
            get(designs::get_design).delete(designs::delete_design),
        )
        // Compliance checks
        .route(
            "/projects/:project_id/compliance-checks",
            get(compliance::list_checks).post(compliance::create_check),
        )
        .route(
            "/projects/:project_id/compliance-checks/summary",
            get(compliance::check_summary),
        )
        .route(
            "/compliance-checks/:check_id",
            patch(compliance::update_check),
        )
        // Admin query console
        .route("/admin/:model/:operation", post(admin::console_query))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::app::{create_app, test_support::lazy_state};

    async fn send(request: Request<Body>) -> Response {
        create_app(lazy_state()).oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_token_is_rejected_with_error_envelope() {
        let response = send(
            Request::builder()
                .uri("/projects")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let response = send(
            Request::builder()
                .uri("/me")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let response = send(
            Request::builder()
                .uri("/tasks")
                .header(header::AUTHORIZATION, "Basic YWRtaW46YWRtaW4=")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn calculator_requires_authentication() {
        let response = send(
            Request::builder()
                .method(Method::POST)
                .uri("/designs/calculate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"structure_type":"beam","material":"steel","loads":{"dead_load":1}}"#,
                ))
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_console_requires_authentication() {
        let response = send(
            Request::builder()
                .method(Method::POST)
                .uri("/admin/bids/count")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let response = send(
            Request::builder()
                .uri("/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert!(response.headers().contains_key("x-request-id"));
    }

    fn post_json(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn signup_rejects_weak_password_before_touching_the_database() {
        let response = send(post_json(
            "/auth/signup",
            r#"{"email":"farid@contractors.my","password":"short"}"#,
        ))
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn signup_cannot_claim_admin() {
        let response = send(post_json(
            "/auth/signup",
            r#"{"email":"farid@contractors.my","password":"long-enough-1","role":"ADMIN"}"#,
        ))
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_refresh_token_is_unauthorized() {
        let response = send(post_json(
            "/auth/refresh",
            r#"{"refresh_token":"not-a-token"}"#,
        ))
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signout_requires_authentication() {
        let response = send(post_json("/auth/signout", "{}")).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = send(
            Request::builder()
                .uri("/tenders")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
