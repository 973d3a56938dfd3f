use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::contract::{ApprovalEmailRequest, NotifierResponse, ParkingEmailRequest};
use crate::config::NotifierConfig;

pub const APPROVAL_EMAIL_PATH: &str = "/api/send-approval-email";
pub const PARKING_EMAIL_PATH: &str = "/api/send-parking-email";

/// Delivery channel for status-change emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_approval(
        &self,
        request: &ApprovalEmailRequest,
    ) -> Result<NotifierResponse, NotifyError>;

    async fn send_parking(
        &self,
        request: &ParkingEmailRequest,
    ) -> Result<NotifierResponse, NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notifier responded with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("notifier reported failure: {message}")]
    Unsuccessful { message: String },
}

/// Posts notifier payloads to the email microservice over HTTP.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T>(&self, path: &str, body: &T) -> Result<NotifierResponse, NotifyError>
    where
        T: Serialize + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "posting notifier request");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let payload = response.json::<NotifierResponse>().await.ok();

        if !status.is_success() {
            let message = payload
                .map(|payload| payload.message)
                .unwrap_or_else(|| status.to_string());
            warn!(%url, status = status.as_u16(), %message, "notifier rejected request");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        match payload {
            Some(payload) if payload.success => Ok(payload),
            Some(payload) => Err(NotifyError::Unsuccessful {
                message: payload.message,
            }),
            None => Err(NotifyError::Unsuccessful {
                message: "unreadable notifier response".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_approval(
        &self,
        request: &ApprovalEmailRequest,
    ) -> Result<NotifierResponse, NotifyError> {
        self.post(APPROVAL_EMAIL_PATH, request).await
    }

    async fn send_parking(
        &self,
        request: &ParkingEmailRequest,
    ) -> Result<NotifierResponse, NotifyError> {
        self.post(PARKING_EMAIL_PATH, request).await
    }
}
