use async_trait::async_trait;
use chrono::Local;
use lettre::message::{header::ContentType, Attachment, Mailbox, Message, MultiPart, SinglePart};
use lettre::AsyncTransport;
use std::path::Path;

use super::{Notifier, ReportEmail};
use crate::config::MailConfig;
use crate::connections::ConnectionManager;
use crate::error::NotifyError;

/// Mails the report as a JSON attachment over the run's cached SMTP transport.
pub struct EmailNotifier {
    from: String,
    recipients: Vec<String>,
}

impl EmailNotifier {
    pub fn from_config(cfg: &MailConfig) -> Self {
        Self {
            from: cfg.sender_email.clone(),
            recipients: cfg.recipients.clone(),
        }
    }

    pub async fn build_message(&self, email: &ReportEmail) -> Result<Message, NotifyError> {
        let content = tokio::fs::read(&email.attachment)
            .await
            .map_err(|source| NotifyError::Attachment {
                path: email.attachment.clone(),
                source,
            })?;
        let filename = email
            .attachment
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.json".to_string());

        let mut builder = Message::builder()
            .from(parse_mailbox(&self.from)?)
            .subject(email.subject.clone());
        for r in &email.recipients {
            builder = builder.to(parse_mailbox(r)?);
        }

        let attachment = Attachment::new(filename).body(
            content,
            ContentType::parse("application/json").unwrap_or(ContentType::TEXT_PLAIN),
        );
        let msg = builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(email.body.clone()))
                .singlepart(attachment),
        )?;
        Ok(msg)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse::<Mailbox>()
        .map_err(|source| NotifyError::Address {
            address: address.to_string(),
            source,
        })
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_report(
        &self,
        conns: &mut ConnectionManager,
        report: &Path,
    ) -> Result<(), NotifyError> {
        let email = ReportEmail::for_report(&self.recipients, report, Local::now());
        let msg = self.build_message(&email).await?;

        let mailer = conns.mail().await?;
        mailer.send(msg).await?;
        tracing::info!(
            target: "notify",
            recipients = ?self.recipients,
            attachment = %report.display(),
            "email sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
