use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use parkqueue::config::DirectoryConfig;
use parkqueue::directory::MemoryDirectory;
use parkqueue::error::AppError;
use parkqueue::notifications::{
    ApprovalEmailRequest, MailError, MailTransport, MailerService, Notifier, NotifierResponse,
    NotifyError, ParkingEmailRequest,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Directory backing the admin server: the configured snapshot, or an empty store.
pub(crate) fn open_directory(config: &DirectoryConfig) -> Result<Arc<MemoryDirectory>, AppError> {
    match &config.snapshot_path {
        Some(path) => {
            let directory = MemoryDirectory::load(path)?;
            info!(path = %path.display(), "directory snapshot loaded");
            Ok(Arc::new(directory))
        }
        None => {
            info!("no directory snapshot configured; starting empty");
            Ok(Arc::new(MemoryDirectory::default()))
        }
    }
}

/// Calls the mailer in-process instead of over HTTP.
pub(crate) struct LocalNotifier<M> {
    mailer: Arc<MailerService<M>>,
}

impl<M> LocalNotifier<M> {
    pub(crate) fn new(mailer: Arc<MailerService<M>>) -> Self {
        Self { mailer }
    }
}

fn into_response(
    message: &str,
    result: Result<parkqueue::notifications::DeliveryReceipt, MailError>,
) -> Result<NotifierResponse, NotifyError> {
    match result {
        Ok(receipt) => Ok(NotifierResponse::delivered(
            message,
            receipt.message_id,
            receipt.response,
        )),
        Err(err) => Err(NotifyError::Unsuccessful {
            message: err.to_string(),
        }),
    }
}

#[async_trait]
impl<M> Notifier for LocalNotifier<M>
where
    M: MailTransport + 'static,
{
    async fn send_approval(
        &self,
        request: &ApprovalEmailRequest,
    ) -> Result<NotifierResponse, NotifyError> {
        let result = self.mailer.send_approval(request).await;
        into_response("Approval email sent successfully", result)
    }

    async fn send_parking(
        &self,
        request: &ParkingEmailRequest,
    ) -> Result<NotifierResponse, NotifyError> {
        let result = self.mailer.send_parking(request).await;
        into_response("Email sent successfully", result)
    }
}
