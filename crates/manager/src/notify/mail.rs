//! SMTP mail notifier.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::trace;

use certkeeper_config::{SmtpConfig, SmtpTls};

use super::{Delivery, Notifier};
use crate::errors::{CollaboratorError, FactoryError};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Mails each message; the destination is the recipient address.
pub struct MailNotifier {
    name: String,
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl MailNotifier {
    pub fn new(name: impl Into<String>, config: &SmtpConfig) -> Result<Self, FactoryError> {
        let name = name.into();
        let invalid = |field, reason: String| FactoryError::InvalidField {
            kind: "notifier",
            name: name.clone(),
            field,
            reason,
        };

        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| invalid("from", e.to_string()))?;

        let builder = match config.tls {
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| invalid("host", e.to_string()))?,
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| invalid("host", e.to_string()))?,
        };
        let mut builder = builder.port(config.port).timeout(Some(SMTP_TIMEOUT));

        if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            name,
            from,
            mailer: builder.build(),
        })
    }
}

/// Subject line: the message text up to its first line break.
fn subject(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default();
    format!("certkeeper: {}", first)
}

#[async_trait]
impl Notifier for MailNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_message(
        &self,
        text: &str,
        destination: &str,
    ) -> Result<Delivery, CollaboratorError> {
        let to: Mailbox = destination.parse()?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject(text))
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())?;

        trace!(notifier = %self.name, to = %destination, "Sending mail");
        self.mailer.send(message).await?;

        Ok(Delivery::new("Mail sent"))
    }
}
