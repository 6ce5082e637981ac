use crate::config::{AppConfig, EmailConfig};
use crate::models::User;
use crate::slack::SlackClient;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("bad notify channel: {0}")]
    BadChannel(String),
    #[error("mail build failed: {0}")]
    MailBuild(String),
    #[error("mail send failed: {0}")]
    MailSend(String),
}

/// Which side channels to ping after a successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyChannels {
    pub slack: bool,
    pub email: bool,
}

impl NotifyChannels {
    pub const NONE: NotifyChannels = NotifyChannels {
        slack: false,
        email: false,
    };

    pub fn parse(raw: Option<&str>) -> Result<NotifyChannels, NotifyError> {
        match raw {
            None | Some("") | Some("none") => Ok(NotifyChannels::NONE),
            Some("slack") => Ok(NotifyChannels {
                slack: true,
                email: false,
            }),
            Some("email") => Ok(NotifyChannels {
                slack: false,
                email: true,
            }),
            Some("both") => Ok(NotifyChannels {
                slack: true,
                email: true,
            }),
            Some(other) => Err(NotifyError::BadChannel(other.to_string())),
        }
    }
}

// --- Email ---

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(config: &EmailConfig) -> Result<Mailer, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::MailBuild(e.to_string()))?
            .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::MailBuild(e.to_string()))?;
        Ok(Mailer {
            transport: builder.build(),
            from,
        })
    }

    /// Plain + HTML notification that a secret is waiting. The body carries
    /// the shareable URL and nothing else about the message.
    pub async fn notify_recipient(
        &self,
        recipient: &User,
        sender_name: &str,
        share_url: &str,
    ) -> Result<(), NotifyError> {
        let to: Mailbox = format!("{} <{}>", recipient.display_name, recipient.email)
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::MailBuild(e.to_string()))?;

        let plain = format!(
            "{sender} sent you a secret via Vanish.\n\n\
             It can be read exactly once and then destroys itself:\n\n  {url}\n\n\
             If you weren't expecting this, ignore it and the message will expire on its own.\n",
            sender = sender_name,
            url = share_url,
        );
        let html = format!(
            "<p><b>{sender}</b> sent you a secret via Vanish.</p>\
             <p>It can be read exactly once and then destroys itself:</p>\
             <p><a href=\"{url}\">{url}</a></p>\
             <p>If you weren't expecting this, ignore it and the message will expire on its own.</p>",
            sender = sender_name,
            url = share_url,
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!("{sender_name} sent you a secret"))
            .multipart(MultiPart::alternative_plain_html(plain, html))
            .map_err(|e| NotifyError::MailBuild(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::MailSend(e.to_string()))
    }
}

// --- Fan-out ---

/// Best-effort side-effect dispatch after a successful create. Channel
/// failures are returned to the caller as warnings; the create stands.
pub struct Notifier {
    slack: Option<SlackClient>,
    mailer: Option<Mailer>,
}

impl Notifier {
    pub fn from_config(config: &AppConfig) -> Notifier {
        let slack = if config.slack.enabled {
            Some(SlackClient::new(&config.slack.bot_token))
        } else {
            None
        };
        let mailer = if config.email.enabled {
            match Mailer::new(&config.email) {
                Ok(m) => Some(m),
                Err(e) => {
                    eprintln!("⚠️  SMTP transport unavailable: {e} (email notifications disabled)");
                    None
                }
            }
        } else {
            None
        };
        Notifier { slack, mailer }
    }

    /// Returns one warning string per channel that failed or is not configured.
    pub async fn notify(
        &self,
        channels: NotifyChannels,
        recipient: &User,
        sender_name: &str,
        share_url: &str,
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        if channels.slack {
            match &self.slack {
                Some(client) => {
                    if let Err(e) = client
                        .notify_recipient(&recipient.email, sender_name, share_url)
                        .await
                    {
                        warnings.push(format!("slack notification failed: {e}"));
                    }
                }
                None => warnings.push("slack notifications are not configured".to_string()),
            }
        }

        if channels.email {
            match &self.mailer {
                Some(mailer) => {
                    if let Err(e) = mailer
                        .notify_recipient(recipient, sender_name, share_url)
                        .await
                    {
                        warnings.push(format!("email notification failed: {e}"));
                    }
                }
                None => warnings.push("email notifications are not configured".to_string()),
            }
        }

        warnings
    }

    pub fn slack(&self) -> Option<&SlackClient> {
        self.slack.as_ref()
    }
}
