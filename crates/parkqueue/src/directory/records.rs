use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw schemaless document as held by the store.
pub type Document = Map<String, Value>;

/// Identifier wrapper for documents in the `users` collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed view of a `users` document. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountDocument {
    #[serde(default)]
    pub id: AccountId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub approval_status: Option<String>,
    #[serde(default)]
    pub verification_submitted: Option<bool>,
    #[serde(default)]
    pub admin_approved: Option<bool>,
    #[serde(default)]
    pub admin_reviewed: Option<bool>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub is_admin: Option<bool>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl AccountDocument {
    /// Decodes a stored document, taking the id from the document key.
    pub fn from_document(id: &str, document: &Document) -> Result<Self, serde_json::Error> {
        let mut account: AccountDocument =
            serde_json::from_value(Value::Object(document.clone()))?;
        account.id = AccountId(id.to_string());
        Ok(account)
    }

    /// Administrator-flagged documents never enter the approval workflow.
    pub fn is_admin(&self) -> bool {
        self.is_admin == Some(true)
            || self
                .role
                .as_deref()
                .is_some_and(|role| role.trim().eq_ignore_ascii_case("admin"))
    }

    pub fn is_verified(&self) -> bool {
        self.verification_submitted == Some(true)
            || self.is_verified == Some(true)
            || self.email_verified == Some(true)
    }

    /// Trimmed, non-empty approval status if one is recorded.
    pub fn status(&self) -> Option<&str> {
        self.approval_status
            .as_deref()
            .map(str::trim)
            .filter(|status| !status.is_empty())
    }
}

/// Contact and enrolment record, zero-or-one per account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default, deserialize_with = "date_or_datetime")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub year_level: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub student_id: Option<String>,
}

impl PersonalInfo {
    pub fn recorded_student_id(&self) -> Option<&str> {
        self.student_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Plain `YYYY-MM-DD` or an RFC 3339 timestamp; anything else reads as absent.
fn date_or_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::String(text)) = value else {
        return Ok(None);
    };
    let text = text.trim();
    Ok(NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|at| at.date_naive())
        }))
}

/// Vehicle record normalized from either field-naming scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub plate_number: Option<String>,
    pub license_number: Option<String>,
    pub registration_date: Option<String>,
}

impl VehicleInfo {
    /// Canonical field names win over their `motorcycle_*` aliases.
    pub fn normalize(document: &Document) -> Self {
        let pick = |canonical: &str, legacy: &str| {
            non_empty_text(document.get(canonical))
                .or_else(|| non_empty_text(document.get(legacy)))
        };

        Self {
            brand: pick("brand", "motorcycle_brand"),
            model: pick("model", "motorcycle_model"),
            color: pick("color", "motorcycle_color"),
            plate_number: pick("plate_number", "motorcycle_plate_number"),
            license_number: pick("license_number", "motorcycle_license_number"),
            registration_date: pick("registration_date", "motorcycle_registration_date"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Uploaded supporting document; displayed only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_document_type")]
    pub document_type: String,
    #[serde(default)]
    pub document_url: String,
}

fn default_document_type() -> String {
    "Document".to_string()
}

/// Entry in the `Admin` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Field set written to a `users` document by a review decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountPatch {
    pub approval_status: String,
    pub admin_approved: bool,
    pub admin_reviewed: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl AccountPatch {
    pub fn to_document(&self) -> Document {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => fields,
            _ => Document::new(),
        }
    }
}
