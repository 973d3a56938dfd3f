use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditOutcome;
use crate::directory::{AccountId, DocumentRecord, PersonalInfo, VehicleInfo};
use crate::notifications::ReviewStatus;

/// Ordering applied to the filtered working set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    Name,
}

impl SortKey {
    pub const fn label(self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::Name => "name",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort key {0:?} (expected newest, oldest or name)")]
pub struct UnknownSortKey(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(SortKey::Newest),
            "oldest" => Ok(SortKey::Oldest),
            "name" => Ok(SortKey::Name),
            _ => Err(UnknownSortKey(value.to_string())),
        }
    }
}

/// Where a pending account's student id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentIdSource {
    Recorded,
    /// Shortened account id; shown flagged in the table.
    Fallback,
    /// The personal-info lookup failed; the id is left empty.
    Unavailable,
}

/// Account in the engine's working set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAccount {
    pub id: AccountId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub student_id: String,
    pub student_id_source: StudentIdSource,
    pub created_at: DateTime<Utc>,
    /// `created_at` was absent in the store and set to load time.
    pub created_at_estimated: bool,
    pub verification_submitted: bool,
}

impl PendingAccount {
    /// displayName, else "first last", else username, else email.
    pub fn label(&self) -> String {
        if let Some(name) = present(&self.display_name) {
            return name.to_string();
        }

        let full_name = [present(&self.first_name), present(&self.last_name)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !full_name.is_empty() {
            return full_name;
        }

        present(&self.username)
            .or_else(|| present(&self.email))
            .unwrap_or_default()
            .to_string()
    }

    /// Case-insensitive substring match; `needle` must already be lower-cased.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        [
            self.email.as_deref(),
            self.display_name.as_deref(),
            self.username.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            Some(self.student_id.as_str()),
            Some(self.id.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Read-only detail view assembled by `view_student_details`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentDetails {
    pub account: PendingAccount,
    pub full_name: String,
    pub personal: Option<PersonalInfo>,
    pub vehicle: Option<VehicleInfo>,
    pub documents: Vec<DocumentRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    pub search: String,
    pub sort: SortKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<PendingAccount>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub page_size: usize,
}

/// What the presentation layer needs to render the pending table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub load_state: LoadState,
    pub pending_count: usize,
    pub search: String,
    pub sort: SortKey,
    pub page: Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded { pending: usize, attempts: u32 },
    /// Another load was in flight; nothing happened.
    AlreadyLoading,
}

/// Result of the best-effort notification step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotifyOutcome {
    Sent { message_id: Option<String> },
    Skipped { reason: String },
    Failed { reason: String },
}

impl NotifyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotifyOutcome::Sent { .. })
    }
}

/// Side effects of a committed approve/reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    pub account_id: AccountId,
    pub status: ReviewStatus,
    pub audit: AuditOutcome,
    pub notification: NotifyOutcome,
    /// Whether the follow-up reload succeeded.
    pub refreshed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApproveOutcome {
    Cancelled,
    Applied(TransitionReport),
}

/// Reject flow waiting for the operator to supply a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionDraft {
    pub account_id: AccountId,
    pub display_label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> PendingAccount {
        PendingAccount {
            id: AccountId::new("u1"),
            email: Some("Jane.Doe@x.com".to_string()),
            display_name: None,
            username: Some("jdoe".to_string()),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            student_id: "2023-0001".to_string(),
            student_id_source: StudentIdSource::Recorded,
            created_at: Utc::now(),
            created_at_estimated: false,
            verification_submitted: true,
        }
    }

    #[test]
    fn label_falls_back_through_name_fields() {
        let mut account = account();
        assert_eq!(account.label(), "Jane Doe");

        account.first_name = None;
        account.last_name = Some("  ".to_string());
        assert_eq!(account.label(), "jdoe");

        account.username = None;
        assert_eq!(account.label(), "Jane.Doe@x.com");

        account.display_name = Some("J. Doe".to_string());
        assert_eq!(account.label(), "J. Doe");
    }

    #[test]
    fn matching_is_case_insensitive_across_fields() {
        let account = account();

        assert!(account.matches("jane"));
        assert!(account.matches("2023-00"));
        assert!(!account.matches("zzz"));
    }

    #[test]
    fn sort_keys_parse_from_query_text() {
        assert_eq!("Oldest".parse::<SortKey>(), Ok(SortKey::Oldest));
        assert!("alphabetical".parse::<SortKey>().is_err());
    }
}
