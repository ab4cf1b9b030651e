use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use log::{debug, info};

use crate::config::{Config, Credentials};
use crate::email::common::OutgoingMail;
use crate::email::session::Outbox;
use crate::error::MailError;

/// Trailing signature appended to every outgoing body
pub fn signature(agent_name: &str) -> String {
    format!("\n--\n{}\n", agent_name)
}

/// Body as it goes on the wire: the text, then the agent signature
pub fn render_body(body: &str, agent_name: &str) -> String {
    format!("{}{}", body, signature(agent_name))
}

/// SMTP over implicit TLS, authenticated with the account credentials.
pub struct SmtpOutbox {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    agent_name: String,
    server: String,
}

impl SmtpOutbox {
    pub fn new(config: &Config, credentials: &Credentials) -> Result<Self, MailError> {
        let server = format!("{}:{}", config.smtp_host, config.smtp_port);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| MailError::transport(&server, e))?
            .port(config.smtp_port)
            .credentials(SmtpCredentials::new(
                credentials.account.clone(),
                credentials.password.clone(),
            ))
            .build();

        let address = credentials
            .account
            .parse()
            .map_err(|e| MailError::auth(&server, format!("invalid account address: {}", e)))?;
        let from = Mailbox::new(Some(config.agent_name.clone()), address);

        Ok(SmtpOutbox {
            transport,
            from,
            agent_name: config.agent_name.clone(),
            server,
        })
    }

    /// Authenticate against the server without sending anything.
    pub async fn verify(&self) -> Result<(), MailError> {
        debug!("Checking SMTP login on {}", self.server);
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(MailError::transport(&self.server, "connection test failed")),
            // 5xx on AUTH means the credentials were refused
            Err(e) if e.is_permanent() => Err(MailError::auth(&self.server, e)),
            Err(e) => Err(MailError::transport(&self.server, e)),
        }
    }

    fn build(&self, mail: &OutgoingMail) -> Result<lettre::Message, MailError> {
        let mut builder = lettre::Message::builder()
            .from(self.from.clone())
            .subject(mail.subject.as_str())
            .date_now();

        for to in &mail.to {
            let mailbox: Mailbox = to.parse().map_err(|e| {
                MailError::rejected(&self.server, format!("invalid recipient {}: {}", to, e))
            })?;
            builder = builder.to(mailbox);
        }

        let text = render_body(&mail.body, &self.agent_name);
        let built = if mail.attachments.is_empty() {
            builder.header(ContentType::TEXT_PLAIN).body(text)
        } else {
            let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(text));
            for attachment in &mail.attachments {
                let name = attachment
                    .name
                    .clone()
                    .unwrap_or_else(|| "attachment.txt".to_string());
                parts = parts.singlepart(
                    lettre::message::Attachment::new(name)
                        .body(attachment.content.clone(), ContentType::TEXT_PLAIN),
                );
            }
            builder.multipart(parts)
        };

        built.map_err(|e| MailError::rejected(&self.server, format!("unable to build email: {}", e)))
    }
}

impl Outbox for SmtpOutbox {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let email = self.build(mail)?;
        self.transport.send(email).await.map_err(|e| {
            if e.is_permanent() {
                MailError::rejected(&self.server, e)
            } else {
                MailError::transport(&self.server, e)
            }
        })?;
        info!("Email '{}' sent to {}", mail.subject, mail.to.join(", "));
        Ok(())
    }
}
