//! Operator identity and the admin gate in front of the workflow.
//!
//! Credentials are verified by the upstream identity provider; this module only
//! decides whether an authenticated identity belongs to an administrator and
//! records the login/logout trail.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::audit::{AuditLogger, AuditOutcome};
use crate::directory::{DirectoryStore, StoreError};

pub const ADMIN_UID_HEADER: &str = "x-admin-uid";
pub const ADMIN_EMAIL_HEADER: &str = "x-admin-email";

/// Authenticated administrator acting on the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

impl Operator {
    /// Upper-cased first letter of each word of the display name.
    pub fn initials(&self) -> String {
        let initials: String = self
            .display_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect();

        if initials.is_empty() {
            self.email
                .chars()
                .next()
                .map(|first| first.to_uppercase().collect())
                .unwrap_or_default()
        } else {
            initials
        }
    }
}

/// Local part of an email address, used when no admin name is on record.
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("missing {0} header")]
    MissingIdentity(&'static str),
    #[error("access denied: {0} is not an admin account")]
    NotAdmin(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Checks identities against the `Admin` collection.
pub struct AdminGate<S> {
    store: Arc<S>,
    audit: AuditLogger<S>,
}

impl<S> AdminGate<S>
where
    S: DirectoryStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditLogger::new(Arc::clone(&store));
        Self { store, audit }
    }

    /// Resolves an authenticated identity into an [`Operator`] without logging.
    pub async fn resolve(&self, uid: &str, email: &str) -> Result<Operator, SessionError> {
        let email = email.trim();
        let admin = self
            .store
            .find_admin(email)
            .await?
            .ok_or_else(|| SessionError::NotAdmin(email.to_string()))?;

        let display_name = admin
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email_local_part(email).to_string());

        Ok(Operator {
            uid: uid.trim().to_string(),
            email: email.to_string(),
            display_name,
        })
    }

    pub async fn sign_in(&self, uid: &str, email: &str) -> Result<Operator, SessionError> {
        let operator = self.resolve(uid, email).await?;
        info!(email = %operator.email, "admin signed in");
        self.audit.login(&operator).await;
        Ok(operator)
    }

    pub async fn sign_out(&self, operator: &Operator) -> AuditOutcome {
        info!(email = %operator.email, "admin signed out");
        self.audit.logout(operator).await
    }

    /// Reads the identity forwarded by the upstream identity proxy.
    pub async fn from_headers(&self, headers: &HeaderMap) -> Result<Operator, SessionError> {
        let (uid, email) = identity_headers(headers)?;
        self.resolve(&uid, &email).await
    }
}

/// `(uid, email)` forwarded in the identity headers.
pub fn identity_headers(headers: &HeaderMap) -> Result<(String, String), SessionError> {
    Ok((
        header_text(headers, ADMIN_UID_HEADER)?,
        header_text(headers, ADMIN_EMAIL_HEADER)?,
    ))
}

/// Resolves the request's operator or produces the 401/403 response.
pub(crate) async fn authorize<S>(gate: &AdminGate<S>, headers: &HeaderMap) -> Result<Operator, Response>
where
    S: DirectoryStore + 'static,
{
    gate.from_headers(headers).await.map_err(session_rejection)
}

pub(crate) fn session_rejection(err: SessionError) -> Response {
    let status = match &err {
        SessionError::MissingIdentity(_) => StatusCode::UNAUTHORIZED,
        SessionError::NotAdmin(_) => StatusCode::FORBIDDEN,
        SessionError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn header_text(headers: &HeaderMap, name: &'static str) -> Result<String, SessionError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(SessionError::MissingIdentity(name))
}
