use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use lettre::message::Mailbox;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration shared by the admin API and the mailer service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub mailer: MailerConfig,
    pub notifier: NotifierConfig,
    pub directory: DirectoryConfig,
    pub approvals: ApprovalsConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_port("APP_PORT", "8080")?;

        let mailer_host = env::var("MAILER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mailer_port = parse_port("MAILER_PORT", "3000")?;

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host: host.trim().to_string(),
                port: parse_port("SMTP_PORT", "587")?,
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            }),
            _ => None,
        };

        let from_raw = env::var("MAIL_FROM")
            .unwrap_or_else(|_| "ParkQueue Administration <no-reply@parkqueue.local>".to_string());
        let from = from_raw
            .parse::<Mailbox>()
            .map_err(|_| ConfigError::InvalidMailbox { value: from_raw })?;
        let test_recipient = env::var("MAIL_TEST_RECIPIENT")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let notifier_url =
            env::var("NOTIFIER_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        let notifier_timeout = parse_number("NOTIFIER_TIMEOUT_SECS", 10)?;

        let snapshot_path = env::var("DIRECTORY_SNAPSHOT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let page_size = parse_number("APPROVALS_PAGE_SIZE", 10)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidNumber {
                variable: "APPROVALS_PAGE_SIZE",
            });
        }
        let load_retries = parse_number("APPROVALS_LOAD_RETRIES", 3)?;
        let retry_delay_ms = parse_number("APPROVALS_RETRY_DELAY_MS", 2000)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            mailer: MailerConfig {
                server: ServerConfig {
                    host: mailer_host,
                    port: mailer_port,
                },
                smtp,
                from,
                test_recipient,
            },
            notifier: NotifierConfig {
                base_url: notifier_url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(notifier_timeout),
            },
            directory: DirectoryConfig { snapshot_path },
            approvals: ApprovalsConfig {
                page_size: page_size as usize,
                load_retries: load_retries as u32,
                retry_base_delay: Duration::from_millis(retry_delay_ms),
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn parse_port(variable: &'static str, default: &str) -> Result<u16, ConfigError> {
    env::var(variable)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort { variable })
}

fn parse_number(variable: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling an HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Email microservice settings. `smtp` is `None` when mail should only be logged.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub server: ServerConfig,
    pub smtp: Option<SmtpConfig>,
    pub from: Mailbox,
    pub test_recipient: Option<String>,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the approval workflow sends status-change notifications.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    pub snapshot_path: Option<PathBuf>,
}

/// Paging and reload retry controls for the approval workflow.
#[derive(Debug, Clone)]
pub struct ApprovalsConfig {
    pub page_size: usize,
    pub load_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            load_retries: 3,
            retry_base_delay: Duration::from_secs(2),
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort { variable: &'static str },
    InvalidNumber { variable: &'static str },
    InvalidHost { source: std::net::AddrParseError },
    InvalidMailbox { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort { variable } => write!(f, "{variable} must be a valid u16"),
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a positive integer")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "host must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMailbox { value } => {
                write!(f, "MAIL_FROM '{value}' is not a valid mailbox")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort { .. }
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidMailbox { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "MAILER_HOST",
            "MAILER_PORT",
            "SMTP_HOST",
            "SMTP_PORT",
            "SMTP_USERNAME",
            "SMTP_PASSWORD",
            "MAIL_FROM",
            "MAIL_TEST_RECIPIENT",
            "NOTIFIER_URL",
            "NOTIFIER_TIMEOUT_SECS",
            "DIRECTORY_SNAPSHOT",
            "APPROVALS_PAGE_SIZE",
            "APPROVALS_LOAD_RETRIES",
            "APPROVALS_RETRY_DELAY_MS",
        ] {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.mailer.server.port, 3000);
        assert!(config.mailer.smtp.is_none());
        assert_eq!(config.notifier.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.approvals.page_size, 10);
        assert_eq!(config.approvals.load_retries, 3);
        assert_eq!(config.approvals.retry_base_delay, Duration::from_secs(2));
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8080));
        reset_env();
    }

    #[test]
    fn smtp_settings_require_a_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SMTP_HOST", "smtp.example.edu");
        env::set_var("SMTP_USERNAME", "mailer");
        let config = AppConfig::load().expect("config loads");
        let smtp = config.mailer.smtp.expect("smtp configured");
        assert_eq!(smtp.host, "smtp.example.edu");
        assert_eq!(smtp.port, 587);
        assert!(format!("{smtp:?}").contains("<redacted>"));
        reset_env();
    }

    #[test]
    fn rejects_zero_page_size_and_bad_ports() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APPROVALS_PAGE_SIZE", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                variable: "APPROVALS_PAGE_SIZE"
            })
        ));
        reset_env();
        env::set_var("MAILER_PORT", "not-a-port");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidPort {
                variable: "MAILER_PORT"
            })
        ));
        reset_env();
    }
}
