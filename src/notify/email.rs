use anyhow::{anyhow, Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::NotificationSink;

/// SMTP delivery. The recipient passed to `deliver` must be an address.
pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("{key} missing"))
}

impl EmailSender {
    /// `Ok(None)` when `SMTP_HOST` is unset; other variables are then required.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };
        let user = env_required("SMTP_USER")?;
        let pass = env_required("SMTP_PASS")?;
        let from_addr = env_required("NOTIFY_EMAIL_FROM")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(Credentials::new(user, pass))
            .build();
        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;

        Ok(Some(Self { mailer, from }))
    }
}

#[async_trait::async_trait]
impl NotificationSink for EmailSender {
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("recipient {recipient:?} is not an email address"))?;

        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
