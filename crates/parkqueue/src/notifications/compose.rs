//! Plain-text subjects and bodies for outgoing notifications.

use chrono::{DateTime, Utc};

use super::contract::{ApprovalEmailRequest, ParkingEmailRequest, ReviewStatus};
use super::mailer::OutboundEmail;

const FOOTER: &str = "This is an automated message. Please do not reply.";

pub fn approval_email(request: &ApprovalEmailRequest) -> OutboundEmail {
    let name = or_default(&request.student_name, "Student");
    let (subject, summary) = match request.status {
        Some(ReviewStatus::Approved) => (
            "Account Approved - ParkQueue",
            "Congratulations! Your account has been approved by the administrator.\n\n\
             Next steps:\n\
             1. Log in to your ParkQueue student account\n\
             2. Generate your personal QR code from your profile\n\
             3. Use the QR code to scan at the parking entrance/exit"
                .to_string(),
        ),
        Some(ReviewStatus::Rejected) => {
            let mut summary =
                "We regret to inform you that your account request has been rejected.".to_string();
            if !request.rejection_reason.trim().is_empty() {
                summary.push_str(&format!("\n\nReason: {}", request.rejection_reason.trim()));
            }
            summary.push_str(
                "\n\nPlease contact the administrator for more information or to resubmit your application.",
            );
            ("Account Status Update - ParkQueue", summary)
        }
        None => (
            "Account Status Update - ParkQueue",
            "The status of your ParkQueue account has changed.".to_string(),
        ),
    };
    let status = request
        .status
        .map(|status| status.label().to_uppercase())
        .unwrap_or_else(|| "UPDATED".to_string());

    let body = format!(
        "Hello {name},\n\n{summary}\n\n\
         Account details:\n\
         Name: {}\n\
         Email: {}\n\
         Status: {status}\n\
         Processed by: {}\n\
         Date: {}\n\n\
         If you have any questions, please contact the school administration.\n\n{FOOTER}",
        or_default(&request.student_name, "N/A"),
        request.student_email,
        or_default(&request.admin_name, "Administrator"),
        stamp(request.timestamp),
    );

    OutboundEmail {
        to: request.student_email.clone(),
        subject: subject.to_string(),
        body,
    }
}

pub fn parking_email(request: &ParkingEmailRequest, at: DateTime<Utc>) -> OutboundEmail {
    let title = request.action.title();
    let mut details = format!("Action: {title}\nTime: {}", stamp(at));
    if let Some(slot) = request.parking_slot.as_deref().filter(|slot| !slot.is_empty()) {
        details.push_str(&format!("\nParking Slot: {slot}"));
    }

    let body = format!(
        "Hello {},\n\nYour parking {} has been successfully recorded.\n\n{details}\n\n\
         Thank you for using ParkQueue!\n\n{FOOTER}",
        or_default(&request.student_name, "Valued User"),
        title.to_lowercase(),
    );

    OutboundEmail {
        to: request.student_email.clone(),
        subject: format!("Parking {title} Notification"),
        body,
    }
}

pub fn test_email(recipient: &str) -> OutboundEmail {
    OutboundEmail {
        to: recipient.to_string(),
        subject: "Test Email from ParkQueue".to_string(),
        body: "This is a test email from ParkQueue parking system.".to_string(),
    }
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value.trim()
    }
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::contract::ParkingAction;
    use chrono::TimeZone;

    fn request(status: Option<ReviewStatus>) -> ApprovalEmailRequest {
        ApprovalEmailRequest {
            student_email: "a@b.com".to_string(),
            student_name: String::new(),
            action: "approval".to_string(),
            status,
            admin_name: "Dana Cruz".to_string(),
            rejection_reason: "Plate number does not match OR/CR".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn rejection_mentions_reason_and_status() {
        let email = approval_email(&request(Some(ReviewStatus::Rejected)));

        assert_eq!(email.subject, "Account Status Update - ParkQueue");
        assert!(email.body.starts_with("Hello Student,"));
        assert!(email.body.contains("Reason: Plate number does not match OR/CR"));
        assert!(email.body.contains("Status: REJECTED"));
        assert!(email.body.contains("Date: 2025-06-02 09:30 UTC"));
    }

    #[test]
    fn approval_omits_rejection_reason() {
        let email = approval_email(&request(Some(ReviewStatus::Approved)));

        assert_eq!(email.subject, "Account Approved - ParkQueue");
        assert!(!email.body.contains("Reason:"));
        assert!(email.body.contains("Processed by: Dana Cruz"));
    }

    #[test]
    fn parking_email_lists_slot_when_present() {
        let request = ParkingEmailRequest {
            student_email: "a@b.com".to_string(),
            student_name: "Ana".to_string(),
            action: ParkingAction::Entry,
            parking_slot: Some("B-12".to_string()),
        };

        let email = parking_email(&request, Utc.with_ymd_and_hms(2025, 6, 2, 7, 5, 0).unwrap());

        assert_eq!(email.subject, "Parking Entry Notification");
        assert!(email.body.contains("Your parking entry has been successfully recorded."));
        assert!(email.body.contains("Parking Slot: B-12"));
    }
}
