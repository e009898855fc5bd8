use crate::error::{Result, VaultError};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Fire-and-forget message delivery, consumed not owned by the gateway.
///
/// A notification failure must never propagate as an upload failure; the
/// upload operation degrades the outcome to a warning instead.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP notifier delivering plain-text mail through a relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpNotifier {
    pub fn new(relay: &str, username: &str, password: &str, sender: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)
            .map_err(|e| VaultError::Config(format!("smtp relay {}: {}", relay, e)))?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        let sender = sender
            .parse::<Mailbox>()
            .map_err(|e| VaultError::Config(format!("smtp sender {}: {}", sender, e)))?;

        Ok(Self { transport, sender })
    }
}

#[async_trait::async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| VaultError::Notification(format!("recipient {}: {}", recipient, e)))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| VaultError::Notification(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| VaultError::Notification(e.to_string()))?;

        tracing::debug!("notified {} ({})", recipient, subject);
        Ok(())
    }
}

/// Notifier that only logs. Default when no SMTP relay is configured.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(
            "notification to {}: {} - {}",
            recipient,
            subject,
            body
        );
        Ok(())
    }
}
