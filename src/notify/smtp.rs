use crate::config::MailConfig;
use crate::notify::{split_addresses, Notifier, NotifyError};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

const SEND_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Mail notifier over SMTP with implicit TLS (port 465)
pub struct SmtpNotifier {
    sender: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    retry_delay: Duration,
}

impl SmtpNotifier {
    /// Builds a notifier that logs in with the configured app password
    pub fn from_config(config: &MailConfig) -> Result<Self, NotifyError> {
        let sender = parse_mailbox(&config.username)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.app_password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            sender,
            transport,
            retry_delay: RETRY_DELAY,
        })
    }

    fn compose(
        &self,
        recipients: &str,
        subject: &str,
        body: &str,
    ) -> Result<Message, NotifyError> {
        let addresses = split_addresses(recipients);
        if addresses.is_empty() {
            return Err(NotifyError::NoRecipients(recipients.to_string()));
        }

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for address in addresses {
            builder = builder.to(parse_mailbox(address)?);
        }

        Ok(builder.body(body.to_string())?)
    }
}

impl Notifier for SmtpNotifier {
    async fn notify(&self, recipients: &str, subject: &str, body: &str) -> bool {
        let message = match self.compose(recipients, subject, body) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("Cannot compose mail to {}: {}", recipients, e);
                return false;
            }
        };

        for attempt in 1..=SEND_ATTEMPTS {
            match self.transport.send(message.clone()).await {
                Ok(_) => {
                    tracing::info!("Mail '{}' sent to {}", subject, recipients);
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        "Send email to {} attempt {} failed: {}",
                        recipients,
                        attempt,
                        e
                    );
                    if attempt < SEND_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        tracing::error!("All attempts to send email failed.");
        false
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(recipients: &str) -> MailConfig {
        MailConfig {
            username: "harvest.bot@gmail.com".to_string(),
            app_password: "abcd efgh ijkl mnop".to_string(),
            recipients: recipients.to_string(),
            smtp_server: "smtp.gmail.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_compose_multiple_recipients() {
        let notifier = SmtpNotifier::from_config(&config("")).unwrap();
        let message = notifier
            .compose("a@example.com; b@example.com", "Done", "All pages harvested")
            .unwrap();

        let to: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(|a| a.to_string())
            .collect();
        assert_eq!(to, vec!["a@example.com", "b@example.com"]);
        assert_eq!(
            message.envelope().from().map(|a| a.to_string()),
            Some("harvest.bot@gmail.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_compose_rejects_bad_address() {
        let notifier = SmtpNotifier::from_config(&config("")).unwrap();
        assert!(matches!(
            notifier.compose("nobody", "s", "b"),
            Err(NotifyError::Address { .. })
        ));
        assert!(matches!(
            notifier.compose(" ; ", "s", "b"),
            Err(NotifyError::NoRecipients(_))
        ));
    }

    #[test]
    fn test_invalid_sender() {
        let mut bad = config("a@example.com");
        bad.username = "not-an-address".to_string();
        assert!(SmtpNotifier::from_config(&bad).is_err());
    }
}
