//! JSON endpoints. Every handler opens its own connection on the blocking pool.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::budget::{self, BudgetReport, Granularity};
use crate::db::get_connection;
use crate::models::{Account, Contact, NewPosting, Posting, StatementDraft};
use crate::postings::PostingFilter;
use crate::savings::SavingsProgress;
use crate::securities::Holding;

pub(crate) async fn with_conn<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Connection) -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let path = state.db_path.clone();
    tokio::task::spawn_blocking(move || {
        let conn = get_connection(&path)?;
        f(&conn)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(ApiError::from)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn api_accounts(State(state): State<AppState>) -> Result<Json<Vec<Account>>, ApiError> {
    with_conn(&state, |conn| crate::accounts::list_accounts(conn, false))
        .await
        .map(Json)
}

pub async fn api_contacts(State(state): State<AppState>) -> Result<Json<Vec<Contact>>, ApiError> {
    with_conn(&state, crate::contacts::list_contacts).await.map(Json)
}

#[derive(Debug, Default, Deserialize)]
pub struct PostingQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub account: Option<String>,
}

pub async fn api_postings(
    State(state): State<AppState>,
    Query(query): Query<PostingQuery>,
) -> Result<Json<Vec<Posting>>, ApiError> {
    let filter = PostingFilter {
        from: query.from,
        to: query.to,
        account: query.account,
    };
    with_conn(&state, move |conn| crate::postings::list_postings(conn, &filter))
        .await
        .map(Json)
}

pub async fn api_create_posting(
    State(state): State<AppState>,
    Json(posting): Json<NewPosting>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let id = with_conn(&state, move |conn| crate::postings::add_posting(conn, &posting)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Debug, Default, Deserialize)]
pub struct DraftQuery {
    pub status: Option<String>,
}

pub async fn api_drafts(
    State(state): State<AppState>,
    Query(query): Query<DraftQuery>,
) -> Result<Json<Vec<StatementDraft>>, ApiError> {
    with_conn(&state, move |conn| crate::drafting::list_drafts(conn, query.status.as_deref()))
        .await
        .map(Json)
}

#[derive(Debug, Default, Deserialize)]
pub struct BookRequest {
    /// Omit to book every open draft.
    pub ids: Option<Vec<i64>>,
}

pub async fn api_book_drafts(
    State(state): State<AppState>,
    Json(request): Json<BookRequest>,
) -> Result<Json<Value>, ApiError> {
    let booked = with_conn(&state, move |conn| {
        crate::drafting::book_drafts(conn, request.ids.as_deref())
    })
    .await?;
    Ok(Json(json!({ "booked": booked })))
}

pub async fn api_budget_rules(
    State(state): State<AppState>,
) -> Result<Json<Vec<budget::report::BudgetRule>>, ApiError> {
    with_conn(&state, budget::list_rules).await.map(Json)
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub granularity: Option<String>,
}

pub(crate) fn report_params(
    state: &AppState,
    query: &ReportQuery,
    today: NaiveDate,
) -> crate::error::Result<(NaiveDate, NaiveDate, Granularity)> {
    budget::resolve_range(
        &state.settings,
        query.from.as_deref(),
        query.to.as_deref(),
        query.granularity.as_deref(),
        today,
    )
}

pub async fn api_budget_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<BudgetReport>, ApiError> {
    let today = chrono::Local::now().date_naive();
    let (from, to, granularity) = report_params(&state, &query, today)?;
    with_conn(&state, move |conn| budget::build_report(conn, from, to, granularity))
        .await
        .map(Json)
}

pub async fn api_savings(State(state): State<AppState>) -> Result<Json<Vec<SavingsProgress>>, ApiError> {
    let today = chrono::Local::now().date_naive();
    with_conn(&state, move |conn| crate::savings::plan_progress(conn, today))
        .await
        .map(Json)
}

pub async fn api_holdings(State(state): State<AppState>) -> Result<Json<Vec<Holding>>, ApiError> {
    with_conn(&state, crate::securities::holdings).await.map(Json)
}
