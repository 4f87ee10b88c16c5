//! JSON API and overview page.
//!
//! - routes: JSON endpoints under `/api`
//! - page: the server-rendered overview at `/`

pub mod error;
pub mod page;
pub mod routes;

use std::path::PathBuf;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::settings::Settings;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub settings: Settings,
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    tracing::info!(%method, %uri, status = response.status().as_u16(), "request");
    response
}

pub fn create_router(state: AppState) -> Router {
    use routes::*;

    Router::new()
        .route("/api/health", get(health))
        .route("/api/accounts", get(api_accounts))
        .route("/api/contacts", get(api_contacts))
        .route("/api/postings", get(api_postings).post(api_create_posting))
        .route("/api/drafts", get(api_drafts))
        .route("/api/drafts/book", post(api_book_drafts))
        .route("/api/budget/rules", get(api_budget_rules))
        .route("/api/budget/report", get(api_budget_report))
        .route("/api/savings", get(api_savings))
        .route("/api/securities/holdings", get(api_holdings))
        .route("/", get(page::index_page))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

pub async fn serve(settings: Settings, db_path: PathBuf) -> Result<()> {
    let addr = settings.server_bind.clone();
    let state = AppState { db_path, settings };
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "server listening");
    println!("Serving on http://{addr}");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::db::{get_connection, init_db};

    fn app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("api.db");
        let conn = get_connection(&db_path).unwrap();
        init_db(&conn).unwrap();
        conn.execute(
            "INSERT INTO accounts (name, account_type, opening_balance) VALUES ('Giro', 'checking', 100.0)",
            [],
        )
        .unwrap();
        let state = AppState {
            db_path,
            settings: Settings::default(),
        };
        (dir, create_router(state))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, body) = send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = send(app, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = app();
        let (status, body) = get_json(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_and_list_postings() {
        let (_dir, app) = app();
        let (status, body) = post_json(
            &app,
            "/api/postings",
            serde_json::json!({
                "account": "Giro",
                "booking_date": "2025-03-02",
                "amount": -42.5,
                "description": "Pharmacy",
                "category": "Health"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].as_i64().unwrap() > 0);

        let (status, body) = get_json(&app, "/api/postings?account=Giro&from=2025-03-01").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["category"], "Health");

        let (_, accounts) = get_json(&app, "/api/accounts").await;
        assert_eq!(accounts[0]["balance"], 57.5);
    }

    #[tokio::test]
    async fn test_unknown_account_is_404() {
        let (_dir, app) = app();
        let (status, body) = post_json(
            &app,
            "/api/postings",
            serde_json::json!({
                "account": "Nowhere",
                "booking_date": "2025-03-02",
                "amount": 1.0,
                "description": "x"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("Nowhere"));

        let (status, body) = post_json(
            &app,
            "/api/postings",
            serde_json::json!({
                "account": "Giro",
                "booking_date": "2025-03-02",
                "amount": -20.0,
                "description": "Transfer",
                "savings_plan": "Nope"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Unknown savings plan: Nope");
    }

    #[tokio::test]
    async fn test_budget_report_endpoint() {
        let (_dir, app) = app();
        let (status, body) =
            get_json(&app, "/api/budget/report?from=2025-01-01&to=2025-06-30&granularity=quarter").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["periods"].as_array().unwrap().len(), 2);
        assert_eq!(body["periods"][1]["period"]["label"], "2025-Q2");

        let (status, _) = get_json(&app, "/api/budget/report?granularity=fortnight").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get_json(&app, "/api/budget/report?from=2025-06-01&to=2025-01-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_book_unknown_draft_is_404() {
        let (_dir, app) = app();
        let (status, _) = post_json(&app, "/api/drafts/book", serde_json::json!({ "ids": [999] })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = post_json(&app, "/api/drafts/book", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["booked"], 0);
    }

    #[tokio::test]
    async fn test_overview_page() {
        let (_dir, app) = app();
        let (status, body) = send(&app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("<h2>Accounts</h2>"));
        assert!(html.contains("Giro"));
    }
}
