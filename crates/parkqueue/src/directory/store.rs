use async_trait::async_trait;

use super::records::{
    AccountDocument, AccountId, AccountPatch, AdminProfile, Document, DocumentRecord,
    PersonalInfo,
};
use crate::audit::{AuditLogEntry, NewAuditEntry};

/// Query surface the workflow needs from the document store. Implementations
/// offer no transactions and no optimistic-lock tokens; the last write wins.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Every document in `users`.
    async fn list_accounts(&self) -> Result<Vec<AccountDocument>, StoreError>;

    /// `personalInfo` where `user_id == account`.
    async fn personal_info(&self, account: &AccountId)
        -> Result<Option<PersonalInfo>, StoreError>;

    async fn list_personal_info(&self) -> Result<Vec<PersonalInfo>, StoreError>;

    /// Raw `motorInfo` document for the account, in whichever naming scheme it was written.
    async fn vehicle_info(&self, account: &AccountId) -> Result<Option<Document>, StoreError>;

    async fn documents(&self, account: &AccountId) -> Result<Vec<DocumentRecord>, StoreError>;

    /// `Admin` where `email == email`.
    async fn find_admin(&self, email: &str) -> Result<Option<AdminProfile>, StoreError>;

    /// Point update by id; merges the patch into the stored document.
    async fn update_account(
        &self,
        account: &AccountId,
        patch: &AccountPatch,
    ) -> Result<(), StoreError>;

    /// Appends to `admin_logs`; the store assigns id and timestamp.
    async fn append_log(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, StoreError>;

    /// Newest first.
    async fn recent_logs(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: &'static str, id: String },
    #[error("{collection}/{id} is malformed: {source}")]
    Malformed {
        collection: &'static str,
        id: String,
        source: serde_json::Error,
    },
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}
