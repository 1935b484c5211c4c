//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Server
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8080)
//! - `STORE_BACKEND` - `postgres` or `memory` (default: postgres)
//! - `DATABASE_URL` - `PostgreSQL` connection string (required for postgres)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `CURRENCY` - Currency code printed next to amounts (default: EUR)
//! - `SHOP_NAME` - Shop name used in emails and invoices (default: Boutique)
//!
//! ## Mail
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` - When all set, mail goes out over SMTP; otherwise it is logged
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_TIMEOUT_SECS` - Per-send timeout (default: 10)
//! - `MAIL_FROM_ADDRESS` - Sender address (required)
//! - `MAIL_FROM_NAME` - Sender name (default: shop name)
//! - `ADMIN_EMAIL` - Recipient of stock alerts (required)
//! - `ADMIN_URL` - Back office base URL linked from alerts (default: <http://localhost:8080/admin>)
//! - `MAIL_RETRIES` - Extra attempts after a failed send (default: 2)
//!
//! ## SMS (phone verification)
//! - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_FROM_NUMBER` - All three enable SMS
//! - `TWILIO_API_BASE` - API base URL (default: <https://api.twilio.com>)
//!
//! ## Invoices
//! - `INVOICE_DIR` - Output directory (default: var/invoices)
//! - `INVOICE_BACKENDS` - Comma separated, tried in order (default: gotenberg,chromium,wkhtmltopdf)
//! - `GOTENBERG_URL` - Gotenberg base URL; the gotenberg backend is skipped without it
//! - `CHROMIUM_BIN` - Chromium binary (default: chromium)
//! - `WKHTMLTOPDF_BIN` - wkhtmltopdf binary (default: wkhtmltopdf)
//! - `INVOICE_TIMEOUT_SECS` - Per-backend timeout (default: 30)
//! - `ATTACH_INVOICES` - Attach invoices to state change emails (default: true)
//!
//! ## Events
//! - `NATS_URL` - Publish domain events when set

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub store: StoreConfig,
    pub shop_name: String,
    pub currency: String,
    pub mail: MailConfig,
    pub sms: Option<SmsConfig>,
    pub invoice: InvoiceConfig,
    pub nats_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StoreConfig {
    Memory,
    Postgres { database_url: SecretString, max_connections: u32 },
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp: Option<SmtpConfig>,
    pub from_address: String,
    pub from_name: String,
    pub admin_email: String,
    pub admin_url: String,
    pub retries: u32,
}

/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Implements `Debug` manually to redact the auth token.
#[derive(Clone)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
    pub api_base: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// External PDF converters, in the order they are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gotenberg,
    Chromium,
    Wkhtmltopdf,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gotenberg" => Ok(Self::Gotenberg),
            "chromium" | "chrome" => Ok(Self::Chromium),
            "wkhtmltopdf" => Ok(Self::Wkhtmltopdf),
            other => Err(format!("unknown PDF backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceConfig {
    pub output_dir: PathBuf,
    pub backends: Vec<BackendKind>,
    pub gotenberg_url: Option<String>,
    pub chromium_bin: String,
    pub wkhtmltopdf_bin: String,
    pub timeout: Duration,
    pub attach_to_emails: bool,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or any value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or any value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let store = match env.or_default("STORE_BACKEND", "postgres").to_ascii_lowercase().as_str() {
            "memory" => StoreConfig::Memory,
            "postgres" => StoreConfig::Postgres {
                database_url: SecretString::from(env.required("DATABASE_URL")?),
                max_connections: env.parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            other => return Err(ConfigError::InvalidEnvVar("STORE_BACKEND".into(), format!("unknown backend '{other}'"))),
        };

        let shop_name = env.or_default("SHOP_NAME", "Boutique");

        let smtp = match (env.optional("SMTP_HOST"), env.optional("SMTP_USERNAME"), env.optional("SMTP_PASSWORD")) {
            (Some(host), Some(username), Some(password)) => Some(SmtpConfig {
                host,
                port: env.parse_or("SMTP_PORT", 587)?,
                username,
                password: SecretString::from(password),
                timeout: Duration::from_secs(env.parse_or("SMTP_TIMEOUT_SECS", 10)?),
            }),
            _ => None,
        };
        let mail = MailConfig {
            smtp,
            from_address: env.required("MAIL_FROM_ADDRESS")?,
            from_name: env.or_default("MAIL_FROM_NAME", &shop_name),
            admin_email: env.required("ADMIN_EMAIL")?,
            admin_url: env.or_default("ADMIN_URL", "http://localhost:8080/admin"),
            retries: env.parse_or("MAIL_RETRIES", 2)?,
        };

        let sms = match (env.optional("TWILIO_ACCOUNT_SID"), env.optional("TWILIO_AUTH_TOKEN"), env.optional("TWILIO_FROM_NUMBER")) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(SmsConfig {
                account_sid,
                auth_token: SecretString::from(auth_token),
                from_number,
                api_base: env.or_default("TWILIO_API_BASE", "https://api.twilio.com"),
            }),
            _ => None,
        };

        // Set but blank means the built-in writer only.
        let backends = env.raw("INVOICE_BACKENDS").unwrap_or_else(|| "gotenberg,chromium,wkhtmltopdf".to_string())
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse().map_err(|e| ConfigError::InvalidEnvVar("INVOICE_BACKENDS".into(), e)))
            .collect::<Result<Vec<BackendKind>, _>>()?;
        let invoice = InvoiceConfig {
            output_dir: PathBuf::from(env.or_default("INVOICE_DIR", "var/invoices")),
            backends,
            gotenberg_url: env.optional("GOTENBERG_URL"),
            chromium_bin: env.or_default("CHROMIUM_BIN", "chromium"),
            wkhtmltopdf_bin: env.or_default("WKHTMLTOPDF_BIN", "wkhtmltopdf"),
            timeout: Duration::from_secs(env.parse_or("INVOICE_TIMEOUT_SECS", 30)?),
            attach_to_emails: env.flag_or("ATTACH_INVOICES", true)?,
        };

        Ok(Self {
            host: env.parse_or("HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: env.parse_or("PORT", 8080)?,
            store,
            shop_name,
            currency: env.or_default("CURRENCY", "EUR"),
            mail,
            sms,
            invoice,
            nats_url: env.optional("NATS_URL"),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn raw(&self, key: &str) -> Option<String> { (self.0)(key) }

    /// Unset and blank are the same.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
            None => Ok(default),
        }
    }

    fn flag_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidEnvVar(key.to_string(), format!("expected a boolean, got '{v}'"))),
            },
        }
    }
}
