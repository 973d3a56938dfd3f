use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use parkqueue::approvals::{approvals_router, ApprovalsManager};
use parkqueue::dashboard::{dashboard_router, DashboardService};
use parkqueue::directory::DirectoryStore;
use parkqueue::notifications::{mailer_router, MailTransport, MailerService, Notifier};
use parkqueue::session::AdminGate;
use serde_json::json;
use std::sync::Arc;

/// Admin API: approval workflow, session, dashboard, and the operational probes.
pub(crate) fn with_admin_routes<S, N>(
    manager: Arc<ApprovalsManager<S, N>>,
    dashboard: Arc<DashboardService<S>>,
    gate: Arc<AdminGate<S>>,
) -> axum::Router
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    approvals_router(manager, gate.clone())
        .merge(dashboard_router(dashboard, gate))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

/// Email microservice; `/health` comes from the mailer router itself.
pub(crate) fn with_mailer_routes<M>(service: Arc<MailerService<M>>) -> axum::Router
where
    M: MailTransport + 'static,
{
    mailer_router(service)
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
