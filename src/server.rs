//! HTTP API over the log pipeline
//!
//! Every request re-reads both logs. The read and the parse/filter/aggregate
//! passes are synchronous, so they run on the blocking pool.

use crate::error::LogError;
use crate::logs::log_filters::{FilterCriteria, DEFAULT_PAGE};
use crate::logs::{
    build_listing, export, summarize, ExportFormat, LogListing, LogRepository, Statistics,
};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub repository: LogRepository,
    pub default_limit: usize,
}

impl AppState {
    pub fn new(repository: LogRepository, default_limit: usize) -> Self {
        Self {
            repository,
            default_limit,
        }
    }
}

/// Query string of `GET /api/logs`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub level: Option<String>,
    pub method: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "date_from")]
    pub date_from: Option<String>,
    #[serde(alias = "date_to")]
    pub date_to: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            level: self.level.clone(),
            method: self.method.clone(),
            status: self.status.clone(),
            date_from: self.date_from.clone(),
            date_to: self.date_to.clone(),
            search: self.search.clone(),
        }
    }
}

/// Query string of `GET /api/logs/export`
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// Parse an optional positive integer parameter; blank means `default`
fn parse_count(name: &str, value: Option<&str>, default: usize) -> Result<usize, LogError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| {
            LogError::InvalidQuery(format!("{} must be a positive integer, got '{}'", name, v))
        }),
    }
}

/// Error response body: `{ "success": false, "message": ... }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<LogError> for ApiError {
    fn from(err: LogError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("log processing task failed: {}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.message);
        }
        (
            self.status,
            Json(json!({ "success": false, "message": self.message })),
        )
            .into_response()
    }
}

async fn blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(task).await??)
}

pub async fn health_check() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<LogListing>, ApiError> {
    let page = parse_count("page", query.page.as_deref(), DEFAULT_PAGE)?;
    let limit = parse_count("limit", query.limit.as_deref(), state.default_limit)?;
    let criteria = query.criteria();

    let repository = state.repository.clone();
    let listing = blocking(move || {
        let records = repository.load_merged()?;
        build_listing(&records, &criteria, page, limit)
    })
    .await?;

    info!(
        "Listed {} of {} matching records (page {})",
        listing.logs.len(),
        listing.pagination.total,
        listing.pagination.page
    );
    Ok(Json(listing))
}

pub async fn log_statistics(State(state): State<AppState>) -> Result<Json<Statistics>, ApiError> {
    let repository = state.repository.clone();
    let statistics = blocking(move || Ok(summarize(&repository.load_merged()?))).await?;
    Ok(Json(statistics))
}

pub async fn export_logs(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = query.format.as_deref().unwrap_or_default().parse()?;

    let repository = state.repository.clone();
    let exported = blocking(move || export(&repository.load_merged()?, format)).await?;

    info!("Exported logs as {} ({} bytes)", exported.filename, exported.body.len());
    Ok((
        [
            (header::CONTENT_TYPE, exported.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", exported.filename),
            ),
        ],
        exported.body,
    )
        .into_response())
}

pub async fn clear_logs(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let repository = state.repository.clone();
    blocking(move || repository.clear()).await?;

    info!("Cleared app and error logs");
    Ok(Json(json!({ "success": true })))
}

/// Build the API router
pub fn router(state: AppState, cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/logs", get(list_logs).delete(clear_logs))
        .route("/api/logs/statistics", get(log_statistics))
        .route("/api/logs/export", get(export_logs))
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Serve the API until Ctrl+C
pub async fn serve(addr: SocketAddr, state: AppState, cors: bool) -> anyhow::Result<()> {
    let app = router(state, cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting HTTP server on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Received shutdown signal");
        })
        .await?;

    Ok(())
}
