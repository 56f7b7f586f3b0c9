//! Operator notifications
//!
//! The sync loop reports a finished harvest and an operator interrupt through
//! a [`Notifier`]. Delivery is best effort: a notifier reports failure as
//! `false` and never aborts the harvest.

mod smtp;

pub use smtp::SmtpNotifier;

use std::future::Future;
use thiserror::Error;

/// Errors raised while composing or sending a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid mail address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("No recipients in '{0}'")]
    NoRecipients(String),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Sends a short text message to one or more recipients
pub trait Notifier: Send + Sync {
    /// Delivers `body` to `recipients` (separated by `;` or `,`)
    ///
    /// Returns true once the message was accepted for delivery.
    fn notify(
        &self,
        recipients: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = bool> + Send;
}

/// Notifier used when no mail section is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    async fn notify(&self, _recipients: &str, subject: &str, _body: &str) -> bool {
        tracing::debug!("Notification '{}' not sent, mail is not configured", subject);
        true
    }
}

/// Splits a recipient list on `;` and `,`, dropping blank entries
pub fn split_addresses(list: &str) -> Vec<&str> {
    list.split([';', ','])
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .collect()
}
