use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;

/// Plain-text message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub response: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid recipient address {address}: {source}")]
    InvalidRecipient {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("unable to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("no test recipient configured (set MAIL_TEST_RECIPIENT)")]
    NoTestRecipient,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, email: OutboundEmail) -> Result<DeliveryReceipt, MailError>;

    /// Whether messages actually leave the process.
    fn is_configured(&self) -> bool;
}

/// Sends through an SMTP relay with STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    sequence: AtomicU64,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpConfig, from: Mailbox) -> Result<Self, MailError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?.port(smtp.port);
        if !smtp.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            sequence: AtomicU64::new(0),
        })
    }

    fn next_message_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "<{}.{sequence}@{}>",
            Utc::now().timestamp_millis(),
            self.from.email.domain()
        )
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, email: OutboundEmail) -> Result<DeliveryReceipt, MailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|source| MailError::InvalidRecipient {
                address: email.to.clone(),
                source,
            })?;
        let message_id = self.next_message_id();

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)?;

        let response = self.transport.send(message).await?;
        let text = response.message().collect::<Vec<_>>().join(" ");
        info!(%message_id, to = %email.to, "email sent");

        Ok(DeliveryReceipt {
            message_id,
            response: format!("{} {}", response.code(), text),
        })
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Logs messages instead of sending them; used when no SMTP relay is configured.
#[derive(Debug, Default)]
pub struct LogMailer {
    sequence: AtomicU64,
}

#[async_trait]
impl MailTransport for LogMailer {
    async fn deliver(&self, email: OutboundEmail) -> Result<DeliveryReceipt, MailError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let message_id = format!("<log-{sequence:06}@parkqueue.local>");
        info!(
            %message_id,
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "smtp not configured; email logged only"
        );
        Ok(DeliveryReceipt {
            message_id,
            response: "250 logged".to_string(),
        })
    }

    fn is_configured(&self) -> bool {
        false
    }
}
