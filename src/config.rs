use std::{fmt, path::Path, path::PathBuf, time::Duration};

use lettre::message::Mailbox;
use serde::Deserialize;

use crate::{Error, Percent, Result, rebalance::DEFAULT_THRESHOLD};

/// Run configuration. JSON documents parse as well, being valid YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub email_enabled: bool,
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
    #[serde(default)]
    pub smtp_server: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub email_password: Option<String>,

    #[serde(default = "default_threshold")]
    pub threshold: Percent,
    #[serde(default = "default_portfolio_file")]
    pub portfolio_file: PathBuf,
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    /// Trend chart of total value, redrawn from the history each run. The
    /// history is plain CSV and cannot embed a chart, so it lives here as an
    /// SVG next to it.
    #[serde(default = "default_chart_file")]
    pub chart_file: PathBuf,
    #[serde(default = "default_price_timeout")]
    pub price_timeout_secs: u64,
    #[serde(default = "default_smtp_timeout")]
    pub smtp_timeout_secs: u64,
}

fn default_threshold() -> Percent {
    DEFAULT_THRESHOLD
}
fn default_portfolio_file() -> PathBuf {
    "portfolio.csv".into()
}
fn default_report_file() -> PathBuf {
    "portfolio_report.csv".into()
}
fn default_history_file() -> PathBuf {
    "portfolio_history.csv".into()
}
fn default_chart_file() -> PathBuf {
    "portfolio_history.svg".into()
}
fn default_price_timeout() -> u64 {
    10
}
fn default_smtp_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email_enabled: false,
            sender_email: None,
            recipient_email: None,
            smtp_server: None,
            smtp_port: None,
            email_password: None,
            threshold: default_threshold(),
            portfolio_file: default_portfolio_file(),
            report_file: default_report_file(),
            history_file: default_history_file(),
            chart_file: default_chart_file(),
            price_timeout_secs: default_price_timeout(),
            smtp_timeout_secs: default_smtp_timeout(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants; call again after overriding fields.
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(Error::Config(format!(
                "threshold must be in (0.0, 1.0), got {}",
                self.threshold
            )));
        }
        if self.price_timeout_secs == 0 {
            return Err(Error::Config("price_timeout_secs must be > 0".into()));
        }
        if self.smtp_timeout_secs == 0 {
            return Err(Error::Config("smtp_timeout_secs must be > 0".into()));
        }
        self.email()?;
        Ok(())
    }

    /// Resolved email settings, `None` when notifications are disabled.
    pub fn email(&self) -> Result<Option<EmailConfig>> {
        if !self.email_enabled {
            return Ok(None);
        }
        let sender = required("sender_email", &self.sender_email)?;
        let recipient = required("recipient_email", &self.recipient_email)?;
        let smtp_server = required("smtp_server", &self.smtp_server)?;
        let password = required("email_password", &self.email_password)?;
        let smtp_port = self
            .smtp_port
            .filter(|&port| port != 0)
            .ok_or_else(|| missing("smtp_port"))?;
        Ok(Some(EmailConfig {
            sender: parse_mailbox("sender_email", sender)?,
            recipient: parse_mailbox("recipient_email", recipient)?,
            smtp_server: smtp_server.to_string(),
            smtp_port,
            password: password.to_string(),
        }))
    }

    pub fn price_timeout(&self) -> Duration {
        Duration::from_secs(self.price_timeout_secs)
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }
}

fn missing(field: &str) -> Error {
    Error::Config(format!("{field} is required when email_enabled is true"))
}

fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing(field))
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    value
        .parse()
        .map_err(|e| Error::Config(format!("{field} {value:?} is not a valid address: {e}")))
}

#[derive(Clone)]
pub struct EmailConfig {
    pub sender: Mailbox,
    pub recipient: Mailbox,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub password: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("sender", &self.sender.to_string())
            .field("recipient", &self.recipient.to_string())
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("password", &"<redacted>")
            .finish()
    }
}
