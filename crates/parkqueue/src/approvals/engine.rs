use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::classify::{is_pending, pending_account, resolve_student_id};
use super::domain::{
    ApproveOutcome, Filters, LoadOutcome, LoadState, NotifyOutcome, Page, PendingAccount,
    RejectionDraft, SortKey, StudentDetails, TransitionReport, WorkflowSnapshot,
};
use super::filter::{apply_filters, paginate};
use super::transition::{approval_patch, email_request, normalize_reason, rejection_patch};
use crate::audit::AuditLogger;
use crate::config::ApprovalsConfig;
use crate::directory::{AccountId, DirectoryStore, StoreError, VehicleInfo};
use crate::notifications::{ApprovalEmailRequest, Notifier, ReviewStatus};
use crate::session::Operator;

#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("loading pending accounts failed after {attempts} attempts: {source}")]
    LoadFailed { attempts: u32, source: StoreError },
    #[error("account {0} is not in the pending list")]
    UnknownAccount(AccountId),
    #[error("loading details for {account_id} failed: {source}")]
    DetailsUnavailable {
        account_id: AccountId,
        source: StoreError,
    },
    #[error("updating account {account_id} failed: {source}")]
    TransitionFailed {
        account_id: AccountId,
        source: StoreError,
    },
    #[error("no rejection is awaiting a reason")]
    NoRejectionInProgress,
    #[error("no failed notification is retained for {0}")]
    NoRetainedNotification(AccountId),
}

/// Search, sort, page and open rejection of one signed-in operator.
#[derive(Debug)]
struct OperatorView {
    filters: Filters,
    page: usize,
    filtered_accounts: Vec<PendingAccount>,
    pending_rejection: Option<RejectionDraft>,
}

impl OperatorView {
    fn new(accounts: &[PendingAccount]) -> Self {
        let filters = Filters::default();
        Self {
            filtered_accounts: apply_filters(accounts, &filters),
            filters,
            page: 1,
            pending_rejection: None,
        }
    }
}

#[derive(Debug, Default)]
struct WorkflowState {
    all_accounts: Vec<PendingAccount>,
    load_state: LoadState,
    views: BTreeMap<String, OperatorView>,
    failed_notifications: BTreeMap<AccountId, ApprovalEmailRequest>,
}

impl WorkflowState {
    fn refilter(&mut self) {
        for view in self.views.values_mut() {
            view.filtered_accounts = apply_filters(&self.all_accounts, &view.filters);
        }
    }

    /// Keyed by operator uid, created on first use.
    fn view(&mut self, operator: &Operator) -> &mut OperatorView {
        let accounts = &self.all_accounts;
        self.views
            .entry(operator.uid.clone())
            .or_insert_with(|| OperatorView::new(accounts))
    }

    fn update_view(
        &mut self,
        operator: &Operator,
        change: impl FnOnce(&mut OperatorView),
    ) -> &OperatorView {
        let accounts = &self.all_accounts;
        let view = self
            .views
            .entry(operator.uid.clone())
            .or_insert_with(|| OperatorView::new(accounts));
        change(view);
        view.filtered_accounts = apply_filters(accounts, &view.filters);
        view
    }

    fn find(&self, id: &AccountId) -> Option<&PendingAccount> {
        self.all_accounts.iter().find(|account| &account.id == id)
    }
}

/// Clears the in-flight flag however the load ends.
struct LoadingFlag<'a>(&'a AtomicBool);

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Pending-account approval workflow.
///
/// Holds a session-scoped cache of pending accounts rebuilt by
/// [`load_accounts`](Self::load_accounts); the directory store stays the
/// system of record. The working set is shared, while search, sort, page and
/// the open rejection belong to the operator passed in. All cache mutation
/// goes through these methods, and no lock is held across an await.
pub struct ApprovalsManager<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    audit: AuditLogger<S>,
    config: ApprovalsConfig,
    loading: AtomicBool,
    state: Mutex<WorkflowState>,
}

impl<S, N> ApprovalsManager<S, N>
where
    S: DirectoryStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: ApprovalsConfig) -> Self {
        let audit = AuditLogger::new(Arc::clone(&store));
        Self {
            store,
            notifier,
            audit,
            config,
            loading: AtomicBool::new(false),
            state: Mutex::new(WorkflowState::default()),
        }
    }

    pub(crate) fn audit(&self) -> &AuditLogger<S> {
        &self.audit
    }

    /// Replaces the working set with the currently pending accounts.
    ///
    /// Retries `load_retries` times with a linear backoff. A trigger that
    /// arrives while a load is in flight returns [`LoadOutcome::AlreadyLoading`]
    /// without doing anything. On final failure the previous working set is
    /// left untouched.
    pub async fn load_accounts(&self) -> Result<LoadOutcome, ApprovalError> {
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("pending accounts already loading; trigger ignored");
            return Ok(LoadOutcome::AlreadyLoading);
        }
        let _flag = LoadingFlag(&self.loading);
        self.state().load_state = LoadState::Loading;

        let max_attempts = self.config.load_retries + 1;
        let mut attempt = 1;
        loop {
            match self.fetch_pending().await {
                Ok(accounts) => {
                    let pending = accounts.len();
                    let mut state = self.state();
                    state.all_accounts = accounts;
                    state.refilter();
                    state.load_state = LoadState::Ready;
                    info!(pending, attempts = attempt, "pending accounts loaded");
                    return Ok(LoadOutcome::Loaded {
                        pending,
                        attempts: attempt,
                    });
                }
                Err(err) if attempt < max_attempts => {
                    let delay = self.config.retry_base_delay * attempt;
                    warn!(
                        attempt,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "loading pending accounts failed"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(attempts = attempt, error = %err, "giving up on loading pending accounts");
                    self.state().load_state = LoadState::Failed {
                        message: err.to_string(),
                    };
                    return Err(ApprovalError::LoadFailed {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }

    async fn fetch_pending(&self) -> Result<Vec<PendingAccount>, StoreError> {
        let accounts = self.store.list_accounts().await?;
        let loaded_at = Utc::now();

        let mut pending = Vec::new();
        for account in accounts {
            if account.is_admin() || !is_pending(&account) {
                continue;
            }
            let lookup = self.store.personal_info(&account.id).await;
            let student_id = resolve_student_id(&account.id, lookup);
            pending.push(pending_account(account, student_id, loaded_at));
        }
        Ok(pending)
    }

    /// Recomputes the operator's filtered view from their search and sort.
    pub fn apply_filters(&self, operator: &Operator) -> Vec<PendingAccount> {
        self.state()
            .update_view(operator, |_| {})
            .filtered_accounts
            .clone()
    }

    pub fn set_search(&self, operator: &Operator, term: impl Into<String>) -> Page {
        let term = term.into();
        let mut state = self.state();
        let view = state.update_view(operator, |view| {
            view.filters.search = term;
            view.page = 1;
        });
        paginate(&view.filtered_accounts, 1, self.config.page_size)
    }

    pub fn set_sort(&self, operator: &Operator, sort: SortKey) -> Page {
        let mut state = self.state();
        let view = state.update_view(operator, |view| {
            view.filters.sort = sort;
            view.page = 1;
        });
        paginate(&view.filtered_accounts, 1, self.config.page_size)
    }

    pub fn set_page(&self, operator: &Operator, page: usize) -> Page {
        let mut state = self.state();
        let view = state.view(operator);
        let current = paginate(&view.filtered_accounts, page, self.config.page_size);
        view.page = current.page;
        current
    }

    pub fn current_page(&self, operator: &Operator) -> Page {
        let mut state = self.state();
        let view = state.view(operator);
        paginate(&view.filtered_accounts, view.page, self.config.page_size)
    }

    pub fn all_accounts(&self) -> Vec<PendingAccount> {
        self.state().all_accounts.clone()
    }

    pub fn filtered_accounts(&self, operator: &Operator) -> Vec<PendingAccount> {
        self.state().view(operator).filtered_accounts.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state().all_accounts.len()
    }

    pub fn load_state(&self) -> LoadState {
        self.state().load_state.clone()
    }

    pub fn snapshot(&self, operator: &Operator) -> WorkflowSnapshot {
        let mut state = self.state();
        let load_state = state.load_state.clone();
        let pending_count = state.all_accounts.len();
        let view = state.view(operator);
        WorkflowSnapshot {
            load_state,
            pending_count,
            search: view.filters.search.clone(),
            sort: view.filters.sort,
            page: paginate(&view.filtered_accounts, view.page, self.config.page_size),
        }
    }

    /// Gathers personal, vehicle and document records for a listed account.
    ///
    /// Ids outside the working set fail immediately without touching the store.
    pub async fn view_student_details(
        &self,
        id: &AccountId,
    ) -> Result<StudentDetails, ApprovalError> {
        let account = self
            .account(id)
            .ok_or_else(|| ApprovalError::UnknownAccount(id.clone()))?;

        let (personal, vehicle, documents) = tokio::try_join!(
            self.store.personal_info(id),
            self.store.vehicle_info(id),
            self.store.documents(id),
        )
        .map_err(|source| ApprovalError::DetailsUnavailable {
            account_id: id.clone(),
            source,
        })?;

        let from_personal = personal
            .as_ref()
            .map(|info| {
                [info.first_name.as_deref(), info.last_name.as_deref()]
                    .into_iter()
                    .flatten()
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|name| !name.is_empty());
        let full_name = from_personal
            .or_else(|| Some(account.label()).filter(|label| !label.is_empty()))
            .unwrap_or_else(|| "N/A".to_string());

        Ok(StudentDetails {
            account,
            full_name,
            personal,
            vehicle: vehicle.map(|raw| VehicleInfo::normalize(&raw)),
            documents,
        })
    }

    /// Approves a listed account once the operator has confirmed.
    ///
    /// Order: store update, audit entry, one notification attempt, full
    /// reload. Only the store update can fail the call.
    pub async fn approve_student(
        &self,
        operator: &Operator,
        id: &AccountId,
        display_label: &str,
        confirmed: bool,
    ) -> Result<ApproveOutcome, ApprovalError> {
        if !confirmed {
            debug!(account_id = %id, "approval not confirmed");
            return Ok(ApproveOutcome::Cancelled);
        }
        let account = self
            .account(id)
            .ok_or_else(|| ApprovalError::UnknownAccount(id.clone()))?;

        let now = Utc::now();
        self.store
            .update_account(id, &approval_patch(operator, now))
            .await
            .map_err(|source| {
                error!(account_id = %id, error = %source, "approving account failed");
                ApprovalError::TransitionFailed {
                    account_id: id.clone(),
                    source,
                }
            })?;
        info!(account_id = %id, approved_by = %operator.uid, "account approved");

        let audit = self.audit.approve_student(operator, id, display_label).await;
        let request = account
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(|email| {
                email_request(email, display_label, ReviewStatus::Approved, operator, None, now)
            });
        let notification = self.notify(id, request).await;
        let refreshed = self.refresh().await;

        Ok(ApproveOutcome::Applied(TransitionReport {
            account_id: id.clone(),
            status: ReviewStatus::Approved,
            audit,
            notification,
            refreshed,
        }))
    }

    /// Opens the operator's reason-capture step for a listed account,
    /// replacing any draft that operator already had open.
    pub fn begin_reject(
        &self,
        operator: &Operator,
        id: &AccountId,
        display_label: &str,
    ) -> Result<RejectionDraft, ApprovalError> {
        let mut state = self.state();
        if state.find(id).is_none() {
            return Err(ApprovalError::UnknownAccount(id.clone()));
        }
        let draft = RejectionDraft {
            account_id: id.clone(),
            display_label: display_label.to_string(),
        };
        state.view(operator).pending_rejection = Some(draft.clone());
        Ok(draft)
    }

    pub fn cancel_reject(&self, operator: &Operator) -> Option<RejectionDraft> {
        self.state().view(operator).pending_rejection.take()
    }

    pub fn pending_rejection(&self, operator: &Operator) -> Option<RejectionDraft> {
        self.state().view(operator).pending_rejection.clone()
    }

    /// Rejects the account held by this operator's open draft. A blank reason
    /// is stored as "No reason provided". The draft survives a failed store
    /// update.
    pub async fn confirm_reject(
        &self,
        operator: &Operator,
        reason: Option<&str>,
    ) -> Result<TransitionReport, ApprovalError> {
        let draft = self
            .pending_rejection(operator)
            .ok_or(ApprovalError::NoRejectionInProgress)?;
        let report = self
            .write_rejection(operator, &draft.account_id, &draft.display_label, reason)
            .await?;

        let mut state = self.state();
        let view = state.view(operator);
        if view.pending_rejection.as_ref() == Some(&draft) {
            view.pending_rejection = None;
        }
        Ok(report)
    }

    /// Rejects a listed account in one step, leaving every open draft alone.
    pub async fn reject_student(
        &self,
        operator: &Operator,
        id: &AccountId,
        display_label: &str,
        reason: Option<&str>,
    ) -> Result<TransitionReport, ApprovalError> {
        if self.account(id).is_none() {
            return Err(ApprovalError::UnknownAccount(id.clone()));
        }
        self.write_rejection(operator, id, display_label, reason).await
    }

    /// Order: store update, audit entry, one notification attempt, full
    /// reload. Only the store update can fail the call.
    async fn write_rejection(
        &self,
        operator: &Operator,
        id: &AccountId,
        display_label: &str,
        reason: Option<&str>,
    ) -> Result<TransitionReport, ApprovalError> {
        let email = self.account(id).and_then(|account| account.email);
        let reason = normalize_reason(reason);

        let now = Utc::now();
        self.store
            .update_account(id, &rejection_patch(operator, &reason, now))
            .await
            .map_err(|source| {
                error!(account_id = %id, error = %source, "rejecting account failed");
                ApprovalError::TransitionFailed {
                    account_id: id.clone(),
                    source,
                }
            })?;
        info!(account_id = %id, rejected_by = %operator.uid, %reason, "account rejected");

        let audit = self.audit.reject_student(operator, id, display_label).await;
        let request = email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(|email| {
                email_request(
                    email,
                    display_label,
                    ReviewStatus::Rejected,
                    operator,
                    Some(&reason),
                    now,
                )
            });
        let notification = self.notify(id, request).await;
        let refreshed = self.refresh().await;

        Ok(TransitionReport {
            account_id: id.clone(),
            status: ReviewStatus::Rejected,
            audit,
            notification,
            refreshed,
        })
    }

    /// Resends a retained failed notification once.
    pub async fn retry_notification(&self, id: &AccountId) -> Result<NotifyOutcome, ApprovalError> {
        let request = self
            .state()
            .failed_notifications
            .get(id)
            .cloned()
            .ok_or_else(|| ApprovalError::NoRetainedNotification(id.clone()))?;
        Ok(self.notify(id, Some(request)).await)
    }

    /// Accounts whose last notification attempt failed.
    pub fn failed_notifications(&self) -> Vec<AccountId> {
        self.state().failed_notifications.keys().cloned().collect()
    }

    async fn notify(&self, id: &AccountId, request: Option<ApprovalEmailRequest>) -> NotifyOutcome {
        let Some(request) = request else {
            warn!(account_id = %id, "no email address on record; notification skipped");
            return NotifyOutcome::Skipped {
                reason: "no email address on record".to_string(),
            };
        };

        match self.notifier.send_approval(&request).await {
            Ok(response) => {
                self.state().failed_notifications.remove(id);
                info!(account_id = %id, message_id = ?response.message_id, "status email sent");
                NotifyOutcome::Sent {
                    message_id: response.message_id,
                }
            }
            Err(err) => {
                warn!(account_id = %id, error = %err, "status email failed; kept for retry");
                self.state().failed_notifications.insert(id.clone(), request);
                NotifyOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn refresh(&self) -> bool {
        match self.load_accounts().await {
            Ok(LoadOutcome::Loaded { .. }) => true,
            Ok(LoadOutcome::AlreadyLoading) => false,
            Err(err) => {
                warn!(error = %err, "refresh after review failed");
                false
            }
        }
    }

    /// Listed account by id, if present in the working set.
    pub fn account(&self, id: &AccountId) -> Option<PendingAccount> {
        self.state().find(id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
