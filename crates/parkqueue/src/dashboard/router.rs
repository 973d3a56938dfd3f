use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::stats::DashboardService;
use crate::directory::{DirectoryStore, StoreError};
use crate::session::{authorize, AdminGate};

const DEFAULT_ACTIVITY_LIMIT: usize = 10;
const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

pub struct DashboardApi<S> {
    pub service: Arc<DashboardService<S>>,
    pub gate: Arc<AdminGate<S>>,
}

impl<S> Clone for DashboardApi<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            gate: Arc::clone(&self.gate),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

/// Router builder for dashboard figures, the CSV export, and the audit trail.
pub fn dashboard_router<S>(service: Arc<DashboardService<S>>, gate: Arc<AdminGate<S>>) -> Router
where
    S: DirectoryStore + 'static,
{
    Router::new()
        .route("/api/v1/dashboard/stats", get(stats_handler::<S>))
        .route("/api/v1/dashboard/activity", get(activity_handler::<S>))
        .route("/api/v1/dashboard/export.csv", get(export_handler::<S>))
        .route("/api/v1/admin/logs", get(logs_handler::<S>))
        .with_state(DashboardApi { service, gate })
}

async fn stats_handler<S>(State(api): State<DashboardApi<S>>, headers: HeaderMap) -> Response
where
    S: DirectoryStore + 'static,
{
    if let Err(response) = authorize(&api.gate, &headers).await {
        return response;
    }

    let figures = tokio::try_join!(api.service.stats(), api.service.year_levels());
    match figures {
        Ok((stats, year_levels)) => (
            StatusCode::OK,
            Json(json!({ "stats": stats, "year_levels": year_levels })),
        )
            .into_response(),
        Err(err) => store_failure("dashboard stats", err),
    }
}

async fn activity_handler<S>(
    State(api): State<DashboardApi<S>>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response
where
    S: DirectoryStore + 'static,
{
    if let Err(response) = authorize(&api.gate, &headers).await {
        return response;
    }

    let limit = query.resolve(DEFAULT_ACTIVITY_LIMIT);
    match api.service.recent_activity(limit).await {
        Ok(items) => (StatusCode::OK, Json(json!({ "limit": limit, "items": items })))
            .into_response(),
        Err(err) => store_failure("recent activity", err),
    }
}

async fn export_handler<S>(State(api): State<DashboardApi<S>>, headers: HeaderMap) -> Response
where
    S: DirectoryStore + 'static,
{
    let operator = match authorize(&api.gate, &headers).await {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    match api.service.export_csv(&operator).await {
        Ok(export) => {
            let disposition = format!("attachment; filename=\"{}\"", export.filename);
            let mut response = (StatusCode::OK, export.body).into_response();
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            );
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                headers.insert(header::CONTENT_DISPOSITION, value);
            }
            response
        }
        Err(err) => {
            error!(error = %err, "dashboard export failed");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

async fn logs_handler<S>(
    State(api): State<DashboardApi<S>>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response
where
    S: DirectoryStore + 'static,
{
    if let Err(response) = authorize(&api.gate, &headers).await {
        return response;
    }

    let limit = query.resolve(DEFAULT_LOG_LIMIT);
    match api.service.store.recent_logs(limit).await {
        Ok(entries) => (StatusCode::OK, Json(json!({ "limit": limit, "entries": entries })))
            .into_response(),
        Err(err) => store_failure("admin logs", err),
    }
}

fn store_failure(what: &str, err: StoreError) -> Response {
    error!(error = %err, "failed to load {what}");
    let payload = json!({ "error": format!("failed to load {what}: {err}") });
    (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
}
