use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Request;
use axum::response::Response;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::approvals::ApprovalsManager;
use crate::audit::{AuditLogEntry, NewAuditEntry};
use crate::config::ApprovalsConfig;
use crate::directory::{
    AccountDocument, AccountId, AccountPatch, AdminProfile, Collection, DirectoryStore, Document,
    DocumentRecord, MemoryDirectory, PersonalInfo, StoreError,
};
use crate::notifications::{
    ApprovalEmailRequest, Notifier, NotifierResponse, NotifyError, ParkingEmailRequest,
};
use crate::session::{Operator, ADMIN_EMAIL_HEADER, ADMIN_UID_HEADER};

pub(super) const ADMIN_EMAIL: &str = "dana@campus.edu";
pub(super) const SECOND_ADMIN_EMAIL: &str = "lee@campus.edu";

pub(super) fn operator() -> Operator {
    Operator {
        uid: "admin-uid-1".to_string(),
        email: ADMIN_EMAIL.to_string(),
        display_name: "Dana Cruz".to_string(),
    }
}

pub(super) fn second_operator() -> Operator {
    Operator {
        uid: "admin-uid-2".to_string(),
        email: SECOND_ADMIN_EMAIL.to_string(),
        display_name: "Lee Tan".to_string(),
    }
}

pub(super) fn fast_config() -> ApprovalsConfig {
    ApprovalsConfig {
        page_size: 10,
        load_retries: 3,
        retry_base_delay: Duration::from_millis(1),
    }
}

/// Two pending accounts (`u1` legacy, `u2` explicit), plus reviewed, admin and
/// not-yet-submitted accounts that must stay out of the working set.
pub(super) fn seeded_directory() -> MemoryDirectory {
    let directory = MemoryDirectory::default();
    let seed = |collection, id: &str, document: Value| {
        directory
            .insert(collection, id, document)
            .expect("seed document");
    };

    seed(
        Collection::Users,
        "u1",
        json!({
            "email": "a@b.com",
            "first_name": "Ana",
            "last_name": "Reyes",
            "verification_submitted": true,
            "admin_approved": false,
            "created_at": "2025-06-01T08:00:00Z",
        }),
    );
    seed(
        Collection::Users,
        "u2-long-identifier",
        json!({
            "email": "Jane.Doe@x.com",
            "displayName": "Jane Doe",
            "approval_status": "pending",
            "created_at": "2025-06-03T08:00:00Z",
        }),
    );
    seed(
        Collection::Users,
        "u3",
        json!({
            "email": "approved@x.com",
            "approval_status": "approved",
            "verification_submitted": true,
        }),
    );
    seed(
        Collection::Users,
        "u4",
        json!({
            "email": "rejected@x.com",
            "approval_status": "rejected",
            "verification_submitted": true,
        }),
    );
    seed(
        Collection::Users,
        "u5",
        json!({ "email": "legacy-approved@x.com", "verification_submitted": true, "admin_approved": true }),
    );
    seed(
        Collection::Users,
        "u6",
        json!({ "email": "drafting@x.com", "verification_submitted": false }),
    );
    seed(
        Collection::Users,
        "admin-user",
        json!({ "email": ADMIN_EMAIL, "role": "admin", "approval_status": "pending" }),
    );
    seed(
        Collection::PersonalInfo,
        "p1",
        json!({
            "user_id": "u1",
            "first_name": "Ana",
            "last_name": "Reyes",
            "student_id": "2023-0001",
            "year_level": "2nd Year",
            "course": "BSIT",
        }),
    );
    seed(
        Collection::MotorInfo,
        "m1",
        json!({
            "user_id": "u1",
            "motorcycle_brand": "Yamaha",
            "motorcycle_model": "Mio",
            "plate_number": "123-ABC",
        }),
    );
    seed(
        Collection::Documents,
        "d1",
        json!({
            "user_id": "u1",
            "document_type": "OR/CR",
            "document_url": "https://files.example/u1/orcr.pdf",
        }),
    );
    seed(
        Collection::Admin,
        "a1",
        json!({ "email": ADMIN_EMAIL, "name": "Dana Cruz" }),
    );
    seed(
        Collection::Admin,
        "a2",
        json!({ "email": SECOND_ADMIN_EMAIL, "name": "Lee Tan" }),
    );
    directory
}

/// Memory directory with switchable failures and call counters.
#[derive(Default)]
pub(super) struct ScriptedDirectory {
    pub(super) inner: MemoryDirectory,
    pub(super) list_failures: AtomicU32,
    pub(super) list_delay_ms: AtomicU64,
    pub(super) fail_personal_info: AtomicBool,
    pub(super) fail_updates: AtomicBool,
    pub(super) calls: AtomicUsize,
    pub(super) list_started: Mutex<Vec<Instant>>,
}

impl ScriptedDirectory {
    pub(super) fn new(inner: MemoryDirectory) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub(super) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Gaps between consecutive `list_accounts` calls.
    pub(super) fn list_gaps(&self) -> Vec<Duration> {
        let started = self.list_started.lock().expect("list log poisoned");
        started
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DirectoryStore for ScriptedDirectory {
    async fn list_accounts(&self) -> Result<Vec<AccountDocument>, StoreError> {
        self.count();
        self.list_started
            .lock()
            .expect("list log poisoned")
            .push(Instant::now());
        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let remaining = self.list_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.list_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("network unreachable".to_string()));
        }
        self.inner.list_accounts().await
    }

    async fn personal_info(
        &self,
        account: &AccountId,
    ) -> Result<Option<PersonalInfo>, StoreError> {
        self.count();
        if self.fail_personal_info.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("personalInfo timed out".to_string()));
        }
        self.inner.personal_info(account).await
    }

    async fn list_personal_info(&self) -> Result<Vec<PersonalInfo>, StoreError> {
        self.count();
        self.inner.list_personal_info().await
    }

    async fn vehicle_info(&self, account: &AccountId) -> Result<Option<Document>, StoreError> {
        self.count();
        self.inner.vehicle_info(account).await
    }

    async fn documents(&self, account: &AccountId) -> Result<Vec<DocumentRecord>, StoreError> {
        self.count();
        self.inner.documents(account).await
    }

    async fn find_admin(&self, email: &str) -> Result<Option<AdminProfile>, StoreError> {
        self.count();
        self.inner.find_admin(email).await
    }

    async fn update_account(
        &self,
        account: &AccountId,
        patch: &AccountPatch,
    ) -> Result<(), StoreError> {
        self.count();
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        self.inner.update_account(account, patch).await
    }

    async fn append_log(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, StoreError> {
        self.count();
        self.inner.append_log(entry).await
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError> {
        self.count();
        self.inner.recent_logs(limit).await
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    pub(super) sent: Mutex<Vec<ApprovalEmailRequest>>,
    pub(super) failing: AtomicBool,
}

impl RecordingNotifier {
    pub(super) fn sent(&self) -> Vec<ApprovalEmailRequest> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_approval(
        &self,
        request: &ApprovalEmailRequest,
    ) -> Result<NotifierResponse, NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                status: 500,
                message: "Failed to send approval email".to_string(),
            });
        }
        Ok(NotifierResponse::delivered(
            "Approval email sent successfully",
            "<m-1@test>".to_string(),
            "250 OK".to_string(),
        ))
    }

    async fn send_parking(
        &self,
        _request: &ParkingEmailRequest,
    ) -> Result<NotifierResponse, NotifyError> {
        Ok(NotifierResponse::delivered(
            "Email sent successfully",
            "<m-2@test>".to_string(),
            "250 OK".to_string(),
        ))
    }
}

pub(super) struct Harness {
    pub(super) directory: Arc<ScriptedDirectory>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) manager: ApprovalsManager<ScriptedDirectory, RecordingNotifier>,
}

pub(super) fn harness_with(directory: MemoryDirectory, config: ApprovalsConfig) -> Harness {
    let directory = Arc::new(ScriptedDirectory::new(directory));
    let notifier = Arc::new(RecordingNotifier::default());
    let manager = ApprovalsManager::new(directory.clone(), notifier.clone(), config);
    Harness {
        directory,
        notifier,
        manager,
    }
}

pub(super) fn harness() -> Harness {
    harness_with(seeded_directory(), fast_config())
}

pub(super) async fn loaded_harness() -> Harness {
    let harness = harness();
    harness
        .manager
        .load_accounts()
        .await
        .expect("initial load succeeds");
    harness
}

pub(super) fn ids(accounts: &[crate::approvals::PendingAccount]) -> Vec<String> {
    accounts
        .iter()
        .map(|account| account.id.to_string())
        .collect()
}

pub(super) fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<axum::body::Body> {
    request_as(&operator(), method, uri, body)
}

pub(super) fn request_as(
    operator: &Operator,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Request<axum::body::Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(ADMIN_UID_HEADER, operator.uid.as_str())
        .header(ADMIN_EMAIL_HEADER, operator.email.as_str());
    match body {
        Some(body) => builder
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .expect("request builds"),
        None => builder
            .body(axum::body::Body::empty())
            .expect("request builds"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
