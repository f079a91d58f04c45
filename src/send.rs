//! SMTP delivery.
//!
//! Dry-run mode short-circuits before any transport is built, so previewing
//! a batch requires no SMTP configuration at all.

use anyhow::{bail, Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use crate::compose::EmailDraft;
use crate::config::SenderConfig;

pub struct EmailSender {
    config: SenderConfig,
    dry_run: bool,
}

impl EmailSender {
    pub fn new(config: &SenderConfig, dry_run: bool) -> Self {
        Self {
            config: config.clone(),
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Deliver one draft. In dry-run mode the draft is logged as a preview
    /// and the call succeeds without touching the network.
    pub async fn send(&self, to: &str, draft: &EmailDraft) -> Result<()> {
        if self.dry_run {
            info!(
                "[dry-run] would send to {}: subject={:?}\n{}",
                to, draft.subject, draft.body
            );
            return Ok(());
        }

        if self.config.smtp_host.trim().is_empty() {
            bail!("SMTP host not configured; set sender.smtp_host or SMTP_HOST");
        }

        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .with_context(|| format!("Invalid from address {:?}", self.config.from_address))?;
        let to_mailbox: Mailbox = to
            .parse()
            .with_context(|| format!("Invalid recipient address {:?}", to))?;

        let message = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(draft.subject.as_str())
            .body(draft.body.clone())
            .context("Failed to build email message")?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .with_context(|| format!("Invalid SMTP relay {:?}", self.config.smtp_host))?
                .port(self.config.smtp_port);

        if !self.config.smtp_user.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.smtp_user.clone(),
                self.config.smtp_pass.clone(),
            ));
        }

        let transport = builder.build();

        debug!("Sending email to {} via {}", to, self.config.smtp_host);
        transport
            .send(message)
            .await
            .with_context(|| format!("SMTP delivery to {} failed", to))?;

        info!("Sent email to {}", to);
        Ok(())
    }
}
