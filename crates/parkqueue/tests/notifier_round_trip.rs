//! The HTTP notifier client against a live email service router.

use std::sync::Arc;
use std::time::Duration;

use parkqueue::config::NotifierConfig;
use parkqueue::notifications::{
    mailer_router, ApprovalEmailRequest, HttpNotifier, LogMailer, MailerService, Notifier,
    NotifyError, ParkingAction, ParkingEmailRequest, ReviewStatus,
};

async fn spawn_mailer() -> String {
    let service = Arc::new(MailerService::new(Arc::new(LogMailer::default()), None));
    let app = mailer_router(service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mailer serves");
    });
    format!("http://{addr}/")
}

fn client(base_url: String) -> HttpNotifier {
    HttpNotifier::new(&NotifierConfig {
        base_url,
        timeout: Duration::from_secs(5),
    })
    .expect("client builds")
}

fn approval(student_email: &str) -> ApprovalEmailRequest {
    serde_json::from_value(serde_json::json!({
        "studentEmail": student_email,
        "studentName": "Ana Reyes",
        "status": "approved",
        "adminName": "Dana Cruz",
    }))
    .expect("request parses")
}

#[tokio::test]
async fn approval_email_round_trips_through_the_service() {
    let notifier = client(spawn_mailer().await);
    assert!(!notifier.base_url().ends_with('/'));

    let request = approval("a@b.com");
    assert_eq!(request.status, Some(ReviewStatus::Approved));
    let response = notifier
        .send_approval(&request)
        .await
        .expect("service accepts");

    assert!(response.success);
    assert_eq!(response.message, "Approval email sent successfully");
    assert_eq!(
        response.message_id.as_deref(),
        Some("<log-000001@parkqueue.local>")
    );
}

#[tokio::test]
async fn missing_recipient_surfaces_as_rejection() {
    let notifier = client(spawn_mailer().await);

    let result = notifier.send_approval(&approval("")).await;

    match result {
        Err(NotifyError::Rejected { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "studentEmail is required");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn parking_email_uses_its_own_endpoint() {
    let notifier = client(spawn_mailer().await);
    let request = ParkingEmailRequest {
        student_email: "a@b.com".to_string(),
        student_name: "Ana Reyes".to_string(),
        action: ParkingAction::Entry,
        parking_slot: Some("B-12".to_string()),
    };

    let response = notifier
        .send_parking(&request)
        .await
        .expect("service accepts");

    assert_eq!(response.message, "Email sent successfully");
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    let notifier = client(format!("http://{addr}"));

    let result = notifier.send_approval(&approval("a@b.com")).await;

    assert!(matches!(result, Err(NotifyError::Transport(_))));
}
