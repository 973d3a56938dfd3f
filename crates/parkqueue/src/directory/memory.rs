use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::records::{
    AccountDocument, AccountId, AccountPatch, AdminProfile, Document, DocumentRecord,
    PersonalInfo,
};
use super::store::{DirectoryStore, StoreError};
use crate::audit::{AuditLogEntry, NewAuditEntry};

/// Serialized form of every collection, keyed by document id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub users: BTreeMap<String, Document>,
    #[serde(default, rename = "personalInfo")]
    pub personal_info: BTreeMap<String, Document>,
    #[serde(default, rename = "motorInfo")]
    pub motor_info: BTreeMap<String, Document>,
    #[serde(default)]
    pub documents: BTreeMap<String, Document>,
    #[serde(default, rename = "Admin")]
    pub admins: BTreeMap<String, Document>,
    #[serde(default)]
    pub admin_logs: Vec<AuditLogEntry>,
}

/// Collections that can be written directly when seeding a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    PersonalInfo,
    MotorInfo,
    Documents,
    Admin,
}

impl Collection {
    pub const fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::PersonalInfo => "personalInfo",
            Collection::MotorInfo => "motorInfo",
            Collection::Documents => "documents",
            Collection::Admin => "Admin",
        }
    }
}

/// Error raised while reading a snapshot file.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("unable to read directory snapshot {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("directory snapshot {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("snapshot document must be a JSON object")]
    NotAnObject,
}

/// In-process document store backed by a [`DirectorySnapshot`].
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    collections: Arc<Mutex<DirectorySnapshot>>,
    log_sequence: Arc<AtomicU64>,
}

impl MemoryDirectory {
    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        let issued_logs = snapshot.admin_logs.len() as u64;
        Self {
            collections: Arc::new(Mutex::new(snapshot)),
            log_sequence: Arc::new(AtomicU64::new(issued_logs)),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let snapshot = serde_json::from_str(&raw).map_err(|source| SnapshotError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        self.collections().clone()
    }

    /// Writes (or replaces) a raw document.
    pub fn insert(
        &self,
        collection: Collection,
        id: impl Into<String>,
        document: Value,
    ) -> Result<(), SnapshotError> {
        let Value::Object(fields) = document else {
            return Err(SnapshotError::NotAnObject);
        };

        let mut guard = self.collections();
        let target = match collection {
            Collection::Users => &mut guard.users,
            Collection::PersonalInfo => &mut guard.personal_info,
            Collection::MotorInfo => &mut guard.motor_info,
            Collection::Documents => &mut guard.documents,
            Collection::Admin => &mut guard.admins,
        };
        target.insert(id.into(), fields);
        Ok(())
    }

    /// Raw `users` document, as another reader of the store would see it.
    pub fn account_document(&self, id: &AccountId) -> Option<Document> {
        self.collections().users.get(id.as_str()).cloned()
    }

    pub fn logs(&self) -> Vec<AuditLogEntry> {
        self.collections().admin_logs.clone()
    }

    fn collections(&self) -> MutexGuard<'_, DirectorySnapshot> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode<T: DeserializeOwned>(
    collection: &'static str,
    id: &str,
    document: &Document,
) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document.clone())).map_err(|source| {
        StoreError::Malformed {
            collection,
            id: id.to_string(),
            source,
        }
    })
}

fn owned_by<'a>(
    documents: &'a BTreeMap<String, Document>,
    account: &'a AccountId,
) -> impl Iterator<Item = (&'a String, &'a Document)> + 'a {
    documents.iter().filter(move |(_, document)| {
        document.get("user_id").and_then(Value::as_str) == Some(account.as_str())
    })
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn list_accounts(&self) -> Result<Vec<AccountDocument>, StoreError> {
        let guard = self.collections();
        let accounts = guard
            .users
            .iter()
            .filter_map(|(id, document)| {
                match AccountDocument::from_document(id, document) {
                    Ok(account) => Some(account),
                    Err(err) => {
                        warn!(
                            collection = Collection::Users.name(),
                            id = %id,
                            error = %err,
                            "skipping malformed account document"
                        );
                        None
                    }
                }
            })
            .collect();
        Ok(accounts)
    }

    async fn personal_info(
        &self,
        account: &AccountId,
    ) -> Result<Option<PersonalInfo>, StoreError> {
        let guard = self.collections();
        let record = owned_by(&guard.personal_info, account)
            .next()
            .map(|(id, document)| decode(Collection::PersonalInfo.name(), id, document))
            .transpose();
        record
    }

    async fn list_personal_info(&self) -> Result<Vec<PersonalInfo>, StoreError> {
        let guard = self.collections();
        guard
            .personal_info
            .iter()
            .map(|(id, document)| decode(Collection::PersonalInfo.name(), id, document))
            .collect()
    }

    async fn vehicle_info(&self, account: &AccountId) -> Result<Option<Document>, StoreError> {
        let guard = self.collections();
        let document = owned_by(&guard.motor_info, account)
            .next()
            .map(|(_, document)| document.clone());
        Ok(document)
    }

    async fn documents(&self, account: &AccountId) -> Result<Vec<DocumentRecord>, StoreError> {
        let guard = self.collections();
        let records = owned_by(&guard.documents, account)
            .map(|(id, document)| decode(Collection::Documents.name(), id, document))
            .collect();
        records
    }

    async fn find_admin(&self, email: &str) -> Result<Option<AdminProfile>, StoreError> {
        let guard = self.collections();
        guard
            .admins
            .iter()
            .find(|(_, document)| {
                document
                    .get("email")
                    .and_then(Value::as_str)
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(email.trim()))
            })
            .map(|(id, document)| decode(Collection::Admin.name(), id, document))
            .transpose()
    }

    async fn update_account(
        &self,
        account: &AccountId,
        patch: &AccountPatch,
    ) -> Result<(), StoreError> {
        let mut guard = self.collections();
        let document =
            guard
                .users
                .get_mut(account.as_str())
                .ok_or_else(|| StoreError::NotFound {
                    collection: Collection::Users.name(),
                    id: account.to_string(),
                })?;

        for (field, value) in patch.to_document() {
            document.insert(field, value);
        }
        debug!(account_id = %account, status = %patch.approval_status, "account document updated");
        Ok(())
    }

    async fn append_log(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, StoreError> {
        let sequence = self.log_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let stored = entry.into_entry(format!("log-{sequence:06}"), Utc::now());
        self.collections().admin_logs.push(stored.clone());
        Ok(stored)
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError> {
        let guard = self.collections();
        let mut logs = guard.admin_logs.clone();
        logs.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
        logs.truncate(limit);
        Ok(logs)
    }
}
