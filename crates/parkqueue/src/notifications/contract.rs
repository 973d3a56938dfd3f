use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review decision carried by an approval email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

/// Body of `POST /api/send-approval-email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEmailRequest {
    #[serde(default)]
    pub student_email: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default = "approval_action")]
    pub action: String,
    #[serde(default)]
    pub status: Option<ReviewStatus>,
    #[serde(default)]
    pub admin_name: String,
    #[serde(default)]
    pub rejection_reason: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn approval_action() -> String {
    "approval".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParkingAction {
    Entry,
    #[default]
    Exit,
}

impl ParkingAction {
    pub const fn title(self) -> &'static str {
        match self {
            ParkingAction::Entry => "Entry",
            ParkingAction::Exit => "Exit",
        }
    }
}

/// Body of `POST /api/send-parking-email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingEmailRequest {
    #[serde(default)]
    pub student_email: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub action: ParkingAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parking_slot: Option<String>,
}

/// Response shape shared by every send endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotifierResponse {
    pub fn delivered(message: impl Into<String>, message_id: String, response: String) -> Self {
        Self {
            success: true,
            message: message.into(),
            message_id: Some(message_id),
            response: Some(response),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            message_id: None,
            response: None,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn approval_request_uses_camel_case_wire_names() {
        let request: ApprovalEmailRequest = serde_json::from_value(json!({
            "studentEmail": "a@b.com",
            "studentName": "Ana Reyes",
            "status": "rejected",
            "rejectionReason": "Blurry ID",
        }))
        .expect("decodes");

        assert_eq!(request.action, "approval");
        assert_eq!(request.status, Some(ReviewStatus::Rejected));
        assert_eq!(request.rejection_reason, "Blurry ID");
        assert!(request.admin_name.is_empty());
    }

    #[test]
    fn parking_action_defaults_to_exit() {
        let request: ParkingEmailRequest =
            serde_json::from_value(json!({ "studentEmail": "a@b.com" })).expect("decodes");

        assert_eq!(request.action, ParkingAction::Exit);
        assert!(request.parking_slot.is_none());
    }
}
