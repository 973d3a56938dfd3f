use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use super::compose;
use super::contract::{ApprovalEmailRequest, NotifierResponse, ParkingEmailRequest};
use super::mailer::{DeliveryReceipt, MailError, MailTransport};

/// Email delivery service behind the notifier HTTP contract.
pub struct MailerService<M> {
    transport: Arc<M>,
    test_recipient: Option<String>,
}

impl<M> MailerService<M>
where
    M: MailTransport + 'static,
{
    pub fn new(transport: Arc<M>, test_recipient: Option<String>) -> Self {
        Self {
            transport,
            test_recipient,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_configured()
    }

    pub async fn send_approval(
        &self,
        request: &ApprovalEmailRequest,
    ) -> Result<DeliveryReceipt, MailError> {
        info!(
            to = %request.student_email,
            status = request.status.map(|status| status.label()).unwrap_or("unknown"),
            "sending approval email"
        );
        self.transport
            .deliver(compose::approval_email(request))
            .await
    }

    pub async fn send_parking(
        &self,
        request: &ParkingEmailRequest,
    ) -> Result<DeliveryReceipt, MailError> {
        info!(
            to = %request.student_email,
            action = request.action.title(),
            "sending parking email"
        );
        self.transport
            .deliver(compose::parking_email(request, Utc::now()))
            .await
    }

    pub async fn send_test(&self) -> Result<DeliveryReceipt, MailError> {
        let recipient = self
            .test_recipient
            .as_deref()
            .ok_or(MailError::NoTestRecipient)?;
        self.transport.deliver(compose::test_email(recipient)).await
    }
}

/// Router exposing the email endpoints consumed by the approval workflow.
pub fn mailer_router<M>(service: Arc<MailerService<M>>) -> Router
where
    M: MailTransport + 'static,
{
    Router::new()
        .route("/api/send-approval-email", post(approval_handler::<M>))
        .route("/api/send-parking-email", post(parking_handler::<M>))
        .route("/api/test-parking-email", get(test_handler::<M>))
        .route("/api/health", get(health_handler::<M>))
        .route("/health", get(health_handler::<M>))
        .fallback(not_found_handler)
        .with_state(service)
}

pub(crate) async fn approval_handler<M>(
    State(service): State<Arc<MailerService<M>>>,
    Json(request): Json<ApprovalEmailRequest>,
) -> Response
where
    M: MailTransport + 'static,
{
    if request.student_email.trim().is_empty() {
        return missing_recipient();
    }

    match service.send_approval(&request).await {
        Ok(receipt) => delivered("Approval email sent successfully", receipt),
        Err(err) => {
            error!(error = %err, to = %request.student_email, "approval email failed");
            delivery_failed("Failed to send approval email", &err)
        }
    }
}

pub(crate) async fn parking_handler<M>(
    State(service): State<Arc<MailerService<M>>>,
    Json(request): Json<ParkingEmailRequest>,
) -> Response
where
    M: MailTransport + 'static,
{
    if request.student_email.trim().is_empty() {
        return missing_recipient();
    }

    match service.send_parking(&request).await {
        Ok(receipt) => delivered("Email sent successfully", receipt),
        Err(err) => {
            error!(error = %err, to = %request.student_email, "parking email failed");
            delivery_failed("Failed to send email", &err)
        }
    }
}

pub(crate) async fn test_handler<M>(State(service): State<Arc<MailerService<M>>>) -> Response
where
    M: MailTransport + 'static,
{
    match service.send_test().await {
        Ok(receipt) => {
            let payload = json!({
                "success": true,
                "message": "Test email sent successfully!",
                "messageId": receipt.message_id,
                "response": receipt.response,
                "timestamp": Utc::now(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => {
            warn!(error = %err, "test email failed");
            delivery_failed("Test email failed", &err)
        }
    }
}

async fn health_handler<M>(State(service): State<Arc<MailerService<M>>>) -> Response
where
    M: MailTransport + 'static,
{
    let payload = json!({
        "status": "healthy",
        "service": "ParkQueue Email Service",
        "timestamp": Utc::now(),
        "emailConfigured": service.is_configured(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

async fn not_found_handler(method: Method, uri: Uri) -> Response {
    warn!(%method, %uri, "unknown mailer endpoint");
    let payload = json!({
        "success": false,
        "message": "Endpoint not found",
        "requestedUrl": uri.to_string(),
        "method": method.as_str(),
    });
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}

fn missing_recipient() -> Response {
    let payload = NotifierResponse::failed("studentEmail is required", None);
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

fn delivered(message: &str, receipt: DeliveryReceipt) -> Response {
    let payload = NotifierResponse::delivered(message, receipt.message_id, receipt.response);
    (StatusCode::OK, Json(payload)).into_response()
}

fn delivery_failed(message: &str, err: &MailError) -> Response {
    let payload = NotifierResponse::failed(message, Some(err.to_string()));
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::mailer::{LogMailer, OutboundEmail};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::Value;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutboundEmail>>,
    }

    #[async_trait]
    impl MailTransport for RecordingMailer {
        async fn deliver(&self, email: OutboundEmail) -> Result<DeliveryReceipt, MailError> {
            self.sent.lock().expect("mailer mutex poisoned").push(email);
            Ok(DeliveryReceipt {
                message_id: "<m-1@test>".to_string(),
                response: "250 OK".to_string(),
            })
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    async fn read_json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    fn json_post(uri: &str, payload: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request builds")
    }

    #[tokio::test]
    async fn approval_email_is_composed_and_delivered() {
        let mailer = Arc::new(RecordingMailer::default());
        let router = mailer_router(Arc::new(MailerService::new(mailer.clone(), None)));

        let response = router
            .oneshot(json_post(
                "/api/send-approval-email",
                json!({
                    "studentEmail": "a@b.com",
                    "studentName": "Ana Reyes",
                    "action": "approval",
                    "status": "approved",
                    "adminName": "Dana Cruz",
                }),
            ))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json_body(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["messageId"], json!("<m-1@test>"));

        let sent = mailer.sent.lock().expect("mailer mutex poisoned");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        assert_eq!(sent[0].subject, "Account Approved - ParkQueue");
    }

    #[tokio::test]
    async fn missing_student_email_is_a_bad_request() {
        let router = mailer_router(Arc::new(MailerService::new(
            Arc::new(LogMailer::default()),
            None,
        )));

        let response = router
            .oneshot(json_post(
                "/api/send-parking-email",
                json!({ "action": "entry" }),
            ))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json_body(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("studentEmail is required"));
    }

    #[tokio::test]
    async fn test_email_without_recipient_reports_failure() {
        let router = mailer_router(Arc::new(MailerService::new(
            Arc::new(LogMailer::default()),
            None,
        )));

        let response = router
            .oneshot(
                Request::get("/api/test-parking-email")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json_body(response).await;
        assert_eq!(body["message"], json!("Test email failed"));
        assert!(body["error"]
            .as_str()
            .is_some_and(|error| error.contains("MAIL_TEST_RECIPIENT")));
    }

    #[tokio::test]
    async fn health_reports_transport_configuration() {
        let router = mailer_router(Arc::new(MailerService::new(
            Arc::new(LogMailer::default()),
            None,
        )));

        let response = router
            .oneshot(
                Request::get("/api/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json_body(response).await;
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["emailConfigured"], json!(false));
    }

    #[tokio::test]
    async fn unknown_routes_echo_method_and_url() {
        let router = mailer_router(Arc::new(MailerService::new(
            Arc::new(LogMailer::default()),
            None,
        )));

        let response = router
            .oneshot(
                Request::delete("/api/unknown?x=1")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_json_body(response).await;
        assert_eq!(body["message"], json!("Endpoint not found"));
        assert_eq!(body["requestedUrl"], json!("/api/unknown?x=1"));
        assert_eq!(body["method"], json!("DELETE"));
    }
}
