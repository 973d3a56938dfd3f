use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    ApproveOutcome, LoadOutcome, NotifyOutcome, SortKey, StudentDetails, TransitionReport,
    WorkflowSnapshot,
};
use super::engine::{ApprovalError, ApprovalsManager};
use crate::directory::{AccountId, DirectoryStore};
use crate::notifications::Notifier;
use crate::session::Operator;

/// Intent issued by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ApprovalCommand {
    SearchChanged {
        term: String,
    },
    SortChanged {
        sort: SortKey,
    },
    PageChanged {
        page: usize,
    },
    Reload,
    View {
        account_id: AccountId,
    },
    Approve {
        account_id: AccountId,
        display_label: String,
        #[serde(default)]
        confirmed: bool,
    },
    BeginReject {
        account_id: AccountId,
        display_label: String,
    },
    CancelReject,
    ConfirmReject {
        #[serde(default)]
        reason: Option<String>,
    },
    RetryNotification {
        account_id: AccountId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

/// Transient banner shown after a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResult {
    pub notice: Option<Notice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<StudentDetails>,
    pub snapshot: WorkflowSnapshot,
}

impl<S, N> ApprovalsManager<S, N>
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    /// Routes a command to the engine and turns the result into a notice.
    pub async fn dispatch(&self, operator: &Operator, command: ApprovalCommand) -> DispatchResult {
        debug!(?command, operator = %operator.email, "dispatching approval command");
        let (notice, details) = match command {
            ApprovalCommand::SearchChanged { term } => {
                self.set_search(operator, term);
                (None, None)
            }
            ApprovalCommand::SortChanged { sort } => {
                self.set_sort(operator, sort);
                (None, None)
            }
            ApprovalCommand::PageChanged { page } => {
                self.set_page(operator, page);
                (None, None)
            }
            ApprovalCommand::Reload => match self.load_accounts().await {
                Ok(LoadOutcome::Loaded { pending, .. }) => {
                    (Some(Notice::info(format!("{pending} Pending"))), None)
                }
                Ok(LoadOutcome::AlreadyLoading) => (None, None),
                Err(_) => (
                    Some(Notice::error(
                        "Error loading pending students. Please refresh the page.",
                    )),
                    None,
                ),
            },
            ApprovalCommand::View { account_id } => match self.view_student_details(&account_id).await {
                Ok(details) => {
                    self.audit()
                        .view_student(operator, &account_id, &details.full_name)
                        .await;
                    (None, Some(details))
                }
                Err(ApprovalError::UnknownAccount(_)) => {
                    (Some(Notice::error("Student not found")), None)
                }
                Err(_) => (Some(Notice::error("Error loading student details")), None),
            },
            ApprovalCommand::Approve {
                account_id,
                display_label,
                confirmed,
            } => {
                let outcome = self
                    .approve_student(operator, &account_id, &display_label, confirmed)
                    .await;
                (Some(approve_notice(&display_label, outcome)), None)
            }
            ApprovalCommand::BeginReject {
                account_id,
                display_label,
            } => match self.begin_reject(operator, &account_id, &display_label) {
                Ok(_) => (None, None),
                Err(_) => (Some(Notice::error("Student not found")), None),
            },
            ApprovalCommand::CancelReject => {
                self.cancel_reject(operator);
                (None, None)
            }
            ApprovalCommand::ConfirmReject { reason } => {
                let label = self
                    .pending_rejection(operator)
                    .map(|draft| draft.display_label)
                    .unwrap_or_default();
                let outcome = self.confirm_reject(operator, reason.as_deref()).await;
                (Some(reject_notice(&label, outcome)), None)
            }
            ApprovalCommand::RetryNotification { account_id } => {
                let notice = match self.retry_notification(&account_id).await {
                    Ok(NotifyOutcome::Sent { .. }) => Notice::success("Notification email sent"),
                    Ok(NotifyOutcome::Failed { reason }) => {
                        Notice::error(format!("Notification email failed again: {reason}"))
                    }
                    Ok(NotifyOutcome::Skipped { reason }) => Notice::info(reason),
                    Err(err) => Notice::info(err.to_string()),
                };
                (Some(notice), None)
            }
        };

        DispatchResult {
            notice,
            details,
            snapshot: self.snapshot(operator),
        }
    }
}

fn approve_notice(label: &str, outcome: Result<ApproveOutcome, ApprovalError>) -> Notice {
    match outcome {
        Ok(ApproveOutcome::Cancelled) => Notice::info(format!("Approval cancelled for {label}")),
        Ok(ApproveOutcome::Applied(report)) => transition_notice(
            format!("Account approved for {label}"),
            &report,
        ),
        Err(ApprovalError::UnknownAccount(_)) => Notice::error("Student not found"),
        Err(_) => Notice::error("Error approving student. Please try again."),
    }
}

fn reject_notice(label: &str, outcome: Result<TransitionReport, ApprovalError>) -> Notice {
    match outcome {
        Ok(report) => transition_notice(format!("Account rejected for {label}"), &report),
        Err(ApprovalError::NoRejectionInProgress) => {
            Notice::info("Choose a student to reject first")
        }
        Err(_) => Notice::error("Error rejecting student. Please try again."),
    }
}

/// Notification failures stay a success; the banner only mentions the retry.
fn transition_notice(message: String, report: &TransitionReport) -> Notice {
    match report.notification {
        NotifyOutcome::Failed { .. } => Notice::success(format!(
            "{message}. The notification email could not be sent and can be retried."
        )),
        _ => Notice::success(message),
    }
}
