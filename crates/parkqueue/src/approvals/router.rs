use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::command::ApprovalCommand;
use super::domain::{ApproveOutcome, LoadOutcome, LoadState, SortKey};
use super::engine::{ApprovalError, ApprovalsManager};
use crate::directory::{AccountId, DirectoryStore};
use crate::notifications::Notifier;
use crate::session::{authorize, identity_headers, session_rejection, AdminGate};

/// Shared state behind the approval and session routes.
pub struct ApprovalsApi<S, N> {
    pub manager: Arc<ApprovalsManager<S, N>>,
    pub gate: Arc<AdminGate<S>>,
}

impl<S, N> Clone for ApprovalsApi<S, N> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            gate: Arc::clone(&self.gate),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub sort: Option<SortKey>,
    pub page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    #[serde(default)]
    pub display_label: Option<String>,
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub display_label: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Router builder for the pending-approval workflow and the admin session.
pub fn approvals_router<S, N>(
    manager: Arc<ApprovalsManager<S, N>>,
    gate: Arc<AdminGate<S>>,
) -> Router
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/session",
            post(sign_in_handler::<S, N>).delete(sign_out_handler::<S, N>),
        )
        .route("/api/v1/approvals", get(list_handler::<S, N>))
        .route("/api/v1/approvals/reload", post(reload_handler::<S, N>))
        .route("/api/v1/approvals/commands", post(command_handler::<S, N>))
        .route(
            "/api/v1/approvals/:account_id",
            get(details_handler::<S, N>),
        )
        .route(
            "/api/v1/approvals/:account_id/approve",
            post(approve_handler::<S, N>),
        )
        .route(
            "/api/v1/approvals/:account_id/reject",
            post(reject_handler::<S, N>),
        )
        .route(
            "/api/v1/approvals/:account_id/notification/retry",
            post(retry_handler::<S, N>),
        )
        .with_state(ApprovalsApi { manager, gate })
}

async fn sign_in_handler<S, N>(
    State(api): State<ApprovalsApi<S, N>>,
    headers: HeaderMap,
) -> Response
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    let (uid, email) = match identity_headers(&headers) {
        Ok(identity) => identity,
        Err(err) => return session_rejection(err),
    };

    match api.gate.sign_in(&uid, &email).await {
        Ok(operator) => {
            let payload = json!({
                "uid": operator.uid,
                "email": operator.email,
                "display_name": operator.display_name,
                "initials": operator.initials(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => session_rejection(err),
    }
}

async fn sign_out_handler<S, N>(
    State(api): State<ApprovalsApi<S, N>>,
    headers: HeaderMap,
) -> Response
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    let operator = match authorize(&api.gate, &headers).await {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let audit = api.gate.sign_out(&operator).await;
    (StatusCode::OK, Json(json!({ "signed_out": true, "audit": audit }))).into_response()
}

pub(crate) async fn list_handler<S, N>(
    State(api): State<ApprovalsApi<S, N>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    let operator = match authorize(&api.gate, &headers).await {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    let manager = &api.manager;
    if manager.load_state() == LoadState::Idle {
        if let Err(err) = manager.load_accounts().await {
            return load_failure(&err);
        }
    }
    if let Some(search) = query.search {
        manager.set_search(&operator, search);
    }
    if let Some(sort) = query.sort {
        manager.set_sort(&operator, sort);
    }
    if let Some(page) = query.page {
        manager.set_page(&operator, page);
    }

    (StatusCode::OK, Json(manager.snapshot(&operator))).into_response()
}

pub(crate) async fn reload_handler<S, N>(
    State(api): State<ApprovalsApi<S, N>>,
    headers: HeaderMap,
) -> Response
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    let operator = match authorize(&api.gate, &headers).await {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    match api.manager.load_accounts().await {
        Ok(outcome @ LoadOutcome::Loaded { .. }) => {
            let payload = json!({
                "load": outcome,
                "snapshot": api.manager.snapshot(&operator),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(LoadOutcome::AlreadyLoading) => {
            (StatusCode::ACCEPTED, Json(json!({ "load": LoadOutcome::AlreadyLoading })))
                .into_response()
        }
        Err(err) => load_failure(&err),
    }
}

pub(crate) async fn command_handler<S, N>(
    State(api): State<ApprovalsApi<S, N>>,
    headers: HeaderMap,
    Json(command): Json<ApprovalCommand>,
) -> Response
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    let operator = match authorize(&api.gate, &headers).await {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let result = api.manager.dispatch(&operator, command).await;
    (StatusCode::OK, Json(result)).into_response()
}

pub(crate) async fn details_handler<S, N>(
    State(api): State<ApprovalsApi<S, N>>,
    headers: HeaderMap,
    Path(account_id): Path<String>,
) -> Response
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    let operator = match authorize(&api.gate, &headers).await {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let id = AccountId(account_id);

    match api.manager.view_student_details(&id).await {
        Ok(details) => {
            api.manager
                .audit()
                .view_student(&operator, &id, &details.full_name)
                .await;
            (StatusCode::OK, Json(details)).into_response()
        }
        Err(err) => approval_failure(&err),
    }
}

pub(crate) async fn approve_handler<S, N>(
    State(api): State<ApprovalsApi<S, N>>,
    headers: HeaderMap,
    Path(account_id): Path<String>,
    Json(body): Json<ApproveBody>,
) -> Response
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    let operator = match authorize(&api.gate, &headers).await {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let id = AccountId(account_id);
    let label = display_label(&api.manager, &id, body.display_label);

    match api
        .manager
        .approve_student(&operator, &id, &label, body.confirmed)
        .await
    {
        Ok(ApproveOutcome::Cancelled) => {
            let payload = json!({
                "account_id": id,
                "outcome": "cancelled",
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(ApproveOutcome::Applied(report)) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => approval_failure(&err),
    }
}

pub(crate) async fn reject_handler<S, N>(
    State(api): State<ApprovalsApi<S, N>>,
    headers: HeaderMap,
    Path(account_id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Response
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    let operator = match authorize(&api.gate, &headers).await {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let id = AccountId(account_id);
    let label = display_label(&api.manager, &id, body.display_label);

    match api
        .manager
        .reject_student(&operator, &id, &label, body.reason.as_deref())
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => approval_failure(&err),
    }
}

pub(crate) async fn retry_handler<S, N>(
    State(api): State<ApprovalsApi<S, N>>,
    headers: HeaderMap,
    Path(account_id): Path<String>,
) -> Response
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    if let Err(response) = authorize(&api.gate, &headers).await {
        return response;
    }
    let id = AccountId(account_id);

    match api.manager.retry_notification(&id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => approval_failure(&err),
    }
}

fn display_label<S, N>(
    manager: &ApprovalsManager<S, N>,
    id: &AccountId,
    supplied: Option<String>,
) -> String
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    supplied
        .filter(|label| !label.trim().is_empty())
        .or_else(|| manager.account(id).map(|account| account.label()))
        .unwrap_or_else(|| id.to_string())
}

fn load_failure(err: &ApprovalError) -> Response {
    let payload = json!({
        "error": err.to_string(),
    });
    (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
}

fn approval_failure(err: &ApprovalError) -> Response {
    let status = match err {
        ApprovalError::UnknownAccount(_) | ApprovalError::NoRetainedNotification(_) => {
            StatusCode::NOT_FOUND
        }
        ApprovalError::NoRejectionInProgress => StatusCode::CONFLICT,
        ApprovalError::LoadFailed { .. } | ApprovalError::DetailsUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ApprovalError::TransitionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
