//! Append-only `admin_logs` entries for operator actions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::directory::{AccountId, DirectoryStore};
use crate::session::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Approval,
    Rejection,
    View,
    Export,
    Login,
    Logout,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            AuditAction::Approval => "approval",
            AuditAction::Rejection => "rejection",
            AuditAction::View => "view",
            AuditAction::Export => "export",
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
        }
    }
}

/// Entry as submitted; the store assigns `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub message: String,
    pub performed_by: String,
    pub admin_email: String,
    pub admin_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user: Option<AccountId>,
}

impl NewAuditEntry {
    pub fn into_entry(self, id: String, timestamp: DateTime<Utc>) -> AuditLogEntry {
        AuditLogEntry {
            id,
            action: self.action,
            message: self.message,
            performed_by: self.performed_by,
            admin_email: self.admin_email,
            admin_name: self.admin_name,
            target_user: self.target_user,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub action: AuditAction,
    pub message: String,
    pub performed_by: String,
    pub admin_email: String,
    pub admin_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user: Option<AccountId>,
    pub timestamp: DateTime<Utc>,
}

/// Result of a best-effort audit append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditOutcome {
    Recorded { entry_id: String },
    Failed { reason: String },
}

impl AuditOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditOutcome::Recorded { .. })
    }
}

/// Writes audit entries on behalf of an operator. Failures are logged and
/// reported as [`AuditOutcome::Failed`], never propagated.
pub struct AuditLogger<S> {
    store: Arc<S>,
}

impl<S> Clone for AuditLogger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> AuditLogger<S>
where
    S: DirectoryStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        operator: &Operator,
        action: AuditAction,
        message: String,
        target_user: Option<&AccountId>,
    ) -> AuditOutcome {
        let entry = NewAuditEntry {
            action,
            message,
            performed_by: operator.uid.clone(),
            admin_email: operator.email.clone(),
            admin_name: operator.display_name.clone(),
            target_user: target_user.cloned(),
        };

        match self.store.append_log(entry).await {
            Ok(stored) => {
                info!(action = action.label(), entry_id = %stored.id, "admin action logged");
                AuditOutcome::Recorded {
                    entry_id: stored.id,
                }
            }
            Err(err) => {
                warn!(action = action.label(), error = %err, "failed to log admin action");
                AuditOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    pub async fn approve_student(
        &self,
        operator: &Operator,
        account: &AccountId,
        name: &str,
    ) -> AuditOutcome {
        self.record(
            operator,
            AuditAction::Approval,
            format!("Approved student account: {name}"),
            Some(account),
        )
        .await
    }

    pub async fn reject_student(
        &self,
        operator: &Operator,
        account: &AccountId,
        name: &str,
    ) -> AuditOutcome {
        self.record(
            operator,
            AuditAction::Rejection,
            format!("Rejected student account: {name}"),
            Some(account),
        )
        .await
    }

    pub async fn view_student(
        &self,
        operator: &Operator,
        account: &AccountId,
        name: &str,
    ) -> AuditOutcome {
        self.record(
            operator,
            AuditAction::View,
            format!("Viewed student account: {name}"),
            Some(account),
        )
        .await
    }

    pub async fn export_data(&self, operator: &Operator, data_kind: &str) -> AuditOutcome {
        self.record(
            operator,
            AuditAction::Export,
            format!("Exported {data_kind} data"),
            None,
        )
        .await
    }

    pub async fn login(&self, operator: &Operator) -> AuditOutcome {
        self.record(
            operator,
            AuditAction::Login,
            "Admin logged into the system".to_string(),
            None,
        )
        .await
    }

    pub async fn logout(&self, operator: &Operator) -> AuditOutcome {
        self.record(
            operator,
            AuditAction::Logout,
            "Admin logged out of the system".to_string(),
            None,
        )
        .await
    }
}
