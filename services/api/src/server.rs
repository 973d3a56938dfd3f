use crate::cli::ServeArgs;
use crate::infra::{open_directory, AppState};
use crate::routes::{with_admin_routes, with_mailer_routes};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use parkqueue::approvals::ApprovalsManager;
use parkqueue::config::{AppConfig, ServerConfig};
use parkqueue::dashboard::DashboardService;
use parkqueue::error::AppError;
use parkqueue::notifications::{HttpNotifier, LogMailer, MailTransport, MailerService, SmtpMailer};
use parkqueue::session::AdminGate;
use parkqueue::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

fn apply_overrides(server: &mut ServerConfig, mut args: ServeArgs) {
    if let Some(host) = args.host.take() {
        server.host = host;
    }
    if let Some(port) = args.port.take() {
        server.port = port;
    }
}

/// Admin API over the configured directory, notifying through the email service.
pub(crate) async fn run_admin(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    apply_overrides(&mut config.server, args);
    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = open_directory(&config.directory)?;
    let notifier = Arc::new(HttpNotifier::new(&config.notifier)?);
    info!(notifier = notifier.base_url(), "status emails routed to notifier");

    let manager = Arc::new(ApprovalsManager::new(
        directory.clone(),
        notifier,
        config.approvals.clone(),
    ));
    let dashboard = Arc::new(DashboardService::new(directory.clone()));
    let gate = Arc::new(AdminGate::new(directory));

    let app = with_admin_routes(manager, dashboard, gate)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "parkqueue admin api ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Email microservice; falls back to logging mail when SMTP is not configured.
pub(crate) async fn run_mailer(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    apply_overrides(&mut config.mailer.server, args);
    telemetry::init(&config.telemetry, config.environment)?;

    match &config.mailer.smtp {
        Some(smtp) => {
            let transport = SmtpMailer::new(smtp, config.mailer.from.clone())?;
            info!(host = %smtp.host, port = smtp.port, "smtp relay configured");
            serve_mailer(&config, transport).await
        }
        None => {
            warn!("SMTP_HOST not set; outgoing mail will only be logged");
            serve_mailer(&config, LogMailer::default()).await
        }
    }
}

async fn serve_mailer<M>(config: &AppConfig, transport: M) -> Result<(), AppError>
where
    M: MailTransport + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(MailerService::new(
        Arc::new(transport),
        config.mailer.test_recipient.clone(),
    ));
    let app = with_mailer_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.mailer.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(%addr, "parkqueue email service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
