use chrono::{DateTime, Utc};

use crate::directory::AccountPatch;
use crate::notifications::{ApprovalEmailRequest, ReviewStatus};
use crate::session::Operator;

pub const DEFAULT_REJECTION_REASON: &str = "No reason provided";

/// Fields written to `users/{id}` when an operator approves an account.
pub fn approval_patch(operator: &Operator, now: DateTime<Utc>) -> AccountPatch {
    AccountPatch {
        approval_status: ReviewStatus::Approved.label().to_string(),
        admin_approved: true,
        admin_reviewed: true,
        updated_at: now,
        approved_at: Some(now),
        approved_by: Some(operator.uid.clone()),
        approved_by_name: Some(operator.display_name.clone()),
        ..AccountPatch::default()
    }
}

/// Fields written when an operator rejects an account. `reason` is expected
/// to be normalized already.
pub fn rejection_patch(operator: &Operator, reason: &str, now: DateTime<Utc>) -> AccountPatch {
    AccountPatch {
        approval_status: ReviewStatus::Rejected.label().to_string(),
        admin_approved: false,
        admin_reviewed: true,
        updated_at: now,
        rejected_at: Some(now),
        rejected_by: Some(operator.uid.clone()),
        rejected_by_name: Some(operator.display_name.clone()),
        rejection_reason: Some(reason.to_string()),
        ..AccountPatch::default()
    }
}

pub fn normalize_reason(reason: Option<&str>) -> String {
    reason
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .unwrap_or(DEFAULT_REJECTION_REASON)
        .to_string()
}

pub(crate) fn email_request(
    student_email: &str,
    student_name: &str,
    status: ReviewStatus,
    operator: &Operator,
    rejection_reason: Option<&str>,
    now: DateTime<Utc>,
) -> ApprovalEmailRequest {
    ApprovalEmailRequest {
        student_email: student_email.to_string(),
        student_name: student_name.to_string(),
        action: "approval".to_string(),
        status: Some(status),
        admin_name: operator.display_name.clone(),
        rejection_reason: rejection_reason.unwrap_or_default().to_string(),
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn operator() -> Operator {
        Operator {
            uid: "admin-1".to_string(),
            email: "dana@campus.edu".to_string(),
            display_name: "Dana Cruz".to_string(),
        }
    }

    #[test]
    fn approval_patch_writes_approver_fields() {
        let now = Utc::now();
        let fields = approval_patch(&operator(), now).to_document();

        assert_eq!(fields.get("approval_status"), Some(&json!("approved")));
        assert_eq!(fields.get("admin_approved"), Some(&json!(true)));
        assert_eq!(fields.get("admin_reviewed"), Some(&json!(true)));
        assert_eq!(fields.get("approved_by"), Some(&json!("admin-1")));
        assert_eq!(fields.get("approved_by_name"), Some(&json!("Dana Cruz")));
        assert_eq!(fields.get("approved_at"), fields.get("updated_at"));
        assert!(!fields.contains_key("rejection_reason"));
    }

    #[test]
    fn rejection_patch_writes_reason_and_rejecter_fields() {
        let fields = rejection_patch(&operator(), "Expired license", Utc::now()).to_document();

        assert_eq!(fields.get("approval_status"), Some(&json!("rejected")));
        assert_eq!(fields.get("admin_approved"), Some(&json!(false)));
        assert_eq!(fields.get("rejected_by"), Some(&json!("admin-1")));
        assert_eq!(fields.get("rejection_reason"), Some(&json!("Expired license")));
        assert!(!fields.contains_key("approved_by"));
    }

    #[test]
    fn blank_reasons_use_the_default_text() {
        assert_eq!(normalize_reason(None), DEFAULT_REJECTION_REASON);
        assert_eq!(normalize_reason(Some("   ")), DEFAULT_REJECTION_REASON);
        assert_eq!(normalize_reason(Some(" Blurry ID ")), "Blurry ID");
    }
}
