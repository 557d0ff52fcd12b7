//! Rebalance alerts.
//!
//! Alerts are advisory: a failed send is logged and reported back to the
//! caller as [`NotifyOutcome::Failed`], never as an error.

use std::time::Duration;

use lettre::{
    Message, SmtpTransport, Transport, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use tabled::{Table, Tabled, settings::Style};
use tracing::{debug, info, warn};

use crate::{Error, Result, config::EmailConfig, rebalance::Rebalance};

pub const ALERT_SUBJECT: &str = "Portfolio Rebalance Alert";

pub trait Notifier {
    fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Sends alerts over SMTP with STARTTLS, logging in as the sender.
pub struct SmtpNotifier {
    email: EmailConfig,
    timeout: Duration,
}

impl SmtpNotifier {
    pub fn new(email: EmailConfig, timeout: Duration) -> Self {
        Self { email, timeout }
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.email.sender.clone())
            .to(self.email.recipient.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Notification(format!("failed to build message: {e}")))?;

        let mailer = SmtpTransport::starttls_relay(&self.email.smtp_server)
            .map_err(|e| {
                Error::Notification(format!("bad SMTP relay {}: {e}", self.email.smtp_server))
            })?
            .port(self.email.smtp_port)
            .credentials(Credentials::new(
                self.email.sender.email.to_string(),
                self.email.password.clone(),
            ))
            .timeout(Some(self.timeout))
            .build();

        debug!(server = %self.email.smtp_server, port = self.email.smtp_port, "sending alert");
        mailer
            .send(&message)
            .map_err(|e| Error::Notification(format!("SMTP send failed: {e}")))?;
        Ok(())
    }
}

#[derive(Tabled)]
struct AlertRow {
    ticker: String,
    deviation: String,
    shares_to_trade: i64,
}

/// Alert body listing every flagged holding, `None` when nothing is flagged.
pub fn alert_body(rebalance: &Rebalance) -> Option<String> {
    if !rebalance.needs_rebalance() {
        return None;
    }
    let rows = rebalance.flagged().map(|h| AlertRow {
        ticker: h.ticker.clone(),
        deviation: format!("{:+.2}%", h.deviation * 100.0),
        shares_to_trade: h.shares_to_trade,
    });
    Some(Table::new(rows).with(Style::blank()).to_string())
}

#[derive(Debug)]
pub enum NotifyOutcome {
    Disabled,
    NothingFlagged,
    Sent,
    Failed(Error),
}

/// Sends an alert when a notifier is configured and any holding is flagged.
pub fn check_and_notify(rebalance: &Rebalance, notifier: Option<&dyn Notifier>) -> NotifyOutcome {
    let Some(notifier) = notifier else {
        debug!("notifications disabled");
        return NotifyOutcome::Disabled;
    };
    let Some(body) = alert_body(rebalance) else {
        debug!("no holding past threshold, nothing to send");
        return NotifyOutcome::NothingFlagged;
    };
    match notifier.notify(ALERT_SUBJECT, &body) {
        Ok(()) => {
            info!("rebalance alert sent");
            NotifyOutcome::Sent
        }
        Err(e) => {
            warn!(error = %e, "Failed to send rebalance alert");
            NotifyOutcome::Failed(e)
        }
    }
}
