use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::enrollment::{AllocationOptions, ReportSettings, TieBreak};

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub enrollment: EnrollmentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            enrollment: EnrollmentConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Snapshot locations, report output and allocation policy for enrollment runs.
#[derive(Debug, Clone)]
pub struct EnrollmentConfig {
    pub programs_csv: PathBuf,
    pub applications_csv: PathBuf,
    pub report_dir: PathBuf,
    pub public_prefix: String,
    pub tie_break: TieBreak,
}

impl EnrollmentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let programs_csv = env::var("ADMISSIONS_PROGRAMS_CSV")
            .unwrap_or_else(|_| "data/programs.csv".to_string());
        let applications_csv = env::var("ADMISSIONS_APPLICATIONS_CSV")
            .unwrap_or_else(|_| "data/applications.csv".to_string());
        let report_dir = env::var("ADMISSIONS_REPORT_DIR")
            .unwrap_or_else(|_| "uploads/enrollment".to_string());
        let public_prefix = env::var("ADMISSIONS_PUBLIC_PREFIX")
            .unwrap_or_else(|_| "/uploads/enrollment".to_string());
        let tie_break = match env::var("ADMISSIONS_TIE_BREAK") {
            Ok(value) => value
                .parse::<TieBreak>()
                .map_err(|_| ConfigError::InvalidTieBreak { value })?,
            Err(_) => TieBreak::default(),
        };

        Ok(Self {
            programs_csv: PathBuf::from(programs_csv),
            applications_csv: PathBuf::from(applications_csv),
            report_dir: PathBuf::from(report_dir),
            public_prefix,
            tie_break,
        })
    }

    pub fn allocation_options(&self) -> AllocationOptions {
        AllocationOptions {
            tie_break: self.tie_break,
        }
    }

    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            report_dir: self.report_dir.clone(),
            public_prefix: self.public_prefix.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTieBreak { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTieBreak { value } => write!(
                f,
                "ADMISSIONS_TIE_BREAK must be input_order or person_key (got '{}')",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidTieBreak { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
