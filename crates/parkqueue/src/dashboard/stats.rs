use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::approvals::is_pending;
use crate::audit::AuditLogger;
use crate::directory::{AccountDocument, AccountId, DirectoryStore, StoreError};

pub const UNSPECIFIED_YEAR_LEVEL: &str = "Unspecified";
const UNNAMED_STUDENT: &str = "New Student";

/// Head counts over every non-admin account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub verified: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearLevelCount {
    pub year_level: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Registration,
    AccountApproved,
    AccountRejected,
    AccountVerified,
}

impl ActivityKind {
    pub const fn label(self) -> &'static str {
        match self {
            ActivityKind::Registration => "Registration",
            ActivityKind::AccountApproved => "Account Approved",
            ActivityKind::AccountRejected => "Account Rejected",
            ActivityKind::AccountVerified => "Account Verified",
        }
    }

    /// Verification outranks the review outcome.
    fn of(account: &AccountDocument) -> (Self, &'static str) {
        if account.is_verified == Some(true) || account.email_verified == Some(true) {
            return (ActivityKind::AccountVerified, "Verified");
        }
        match account.status() {
            Some("approved") => (ActivityKind::AccountApproved, "Approved"),
            Some("rejected") => (ActivityKind::AccountRejected, "Rejected"),
            _ => (ActivityKind::Registration, "New"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub account_id: AccountId,
    pub user: String,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub activity: ActivityKind,
    pub activity_label: &'static str,
    pub status: &'static str,
    /// Raw review status, `pending` when nothing is recorded.
    pub approval_status: String,
}

impl ActivityEntry {
    fn from_account(account: &AccountDocument) -> Self {
        let (activity, status) = ActivityKind::of(account);
        let user = [&account.first_name, &account.username]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .unwrap_or(UNNAMED_STUDENT)
            .to_string();

        Self {
            account_id: account.id.clone(),
            user,
            email: account.email.clone(),
            created_at: account.created_at,
            activity,
            activity_label: activity.label(),
            status,
            approval_status: account.status().unwrap_or("pending").to_string(),
        }
    }
}

/// Read-only aggregates for the admin dashboard, plus the audited export.
pub struct DashboardService<S> {
    pub(crate) store: Arc<S>,
    pub(crate) audit: AuditLogger<S>,
}

impl<S> DashboardService<S>
where
    S: DirectoryStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self { store, audit }
    }

    async fn students(&self) -> Result<Vec<AccountDocument>, StoreError> {
        let accounts = self.store.list_accounts().await?;
        Ok(accounts
            .into_iter()
            .filter(|account| !account.is_admin())
            .collect())
    }

    pub async fn stats(&self) -> Result<DashboardStats, StoreError> {
        let students = self.students().await?;
        Ok(tally(&students))
    }

    pub async fn year_levels(&self) -> Result<Vec<YearLevelCount>, StoreError> {
        let records = self.store.list_personal_info().await?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in &records {
            let label = record
                .year_level
                .as_deref()
                .map(str::trim)
                .filter(|level| !level.is_empty())
                .unwrap_or(UNSPECIFIED_YEAR_LEVEL);
            *counts.entry(label.to_string()).or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(year_level, count)| YearLevelCount { year_level, count })
            .collect())
    }

    /// Newest registrations first; undated accounts trail.
    pub async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, StoreError> {
        let mut students = self.students().await?;
        students.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        Ok(students
            .iter()
            .take(limit)
            .map(ActivityEntry::from_account)
            .collect())
    }
}

pub(crate) fn tally(students: &[AccountDocument]) -> DashboardStats {
    let mut stats = DashboardStats {
        total: students.len(),
        ..DashboardStats::default()
    };
    for account in students {
        if account.is_verified() {
            stats.verified += 1;
        }
        if is_pending(account) {
            stats.pending += 1;
        }
        match account.status() {
            Some("approved") => stats.approved += 1,
            Some("rejected") => stats.rejected += 1,
            _ => {}
        }
    }
    stats
}
