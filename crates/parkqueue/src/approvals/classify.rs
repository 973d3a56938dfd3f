use chrono::{DateTime, Utc};
use tracing::warn;

use super::domain::{PendingAccount, StudentIdSource};
use crate::directory::{AccountDocument, AccountId, PersonalInfo, StoreError};

const FALLBACK_ID_LEN: usize = 8;

/// Pending classification rule.
///
/// An explicit `approval_status` decides on its own: exactly `"pending"` is in,
/// any other value is out, including `"Pending"` and unrecognised states. Accounts without a
/// status are pending when they submitted verification and have not been
/// approved.
pub fn is_pending(account: &AccountDocument) -> bool {
    match account.status() {
        Some(status) => status == "pending",
        None => account.verification_submitted == Some(true) && account.admin_approved != Some(true),
    }
}

/// Shortened account id shown when no student id is on record.
pub fn fallback_student_id(id: &AccountId) -> String {
    id.as_str().chars().take(FALLBACK_ID_LEN).collect()
}

pub(crate) fn resolve_student_id(
    id: &AccountId,
    lookup: Result<Option<PersonalInfo>, StoreError>,
) -> (String, StudentIdSource) {
    match lookup {
        Ok(Some(info)) => match info.recorded_student_id() {
            Some(student_id) => (student_id.to_string(), StudentIdSource::Recorded),
            None => (fallback_student_id(id), StudentIdSource::Fallback),
        },
        Ok(None) => (fallback_student_id(id), StudentIdSource::Fallback),
        Err(err) => {
            warn!(account_id = %id, error = %err, "student id lookup failed");
            (String::new(), StudentIdSource::Unavailable)
        }
    }
}

pub(crate) fn pending_account(
    account: AccountDocument,
    student_id: (String, StudentIdSource),
    loaded_at: DateTime<Utc>,
) -> PendingAccount {
    let (student_id, student_id_source) = student_id;
    PendingAccount {
        created_at: account.created_at.unwrap_or(loaded_at),
        created_at_estimated: account.created_at.is_none(),
        verification_submitted: account.verification_submitted == Some(true),
        id: account.id,
        email: account.email,
        display_name: account.display_name,
        username: account.username,
        first_name: account.first_name,
        last_name: account.last_name,
        student_id,
        student_id_source,
    }
}
