use futures::TryStreamExt;
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio_native_tls::native_tls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::config::{Config, Credentials};
use crate::email::common::{Message, OutgoingMail};
use crate::email::outbox::SmtpOutbox;
use crate::email::parser::MessageDecoder;
use crate::email::session::{MailConnector, MailSession, Outbox};
use crate::error::MailError;

type ImapStream = Compat<tokio_native_tls::TlsStream<TcpStream>>;
type ImapSession = async_imap::Session<ImapStream>;

/// Logs in to IMAP (inbound) and SMTP (outbound) with the same account.
pub struct ImapConnector {
    config: Config,
}

impl ImapConnector {
    pub fn new(config: &Config) -> Self {
        ImapConnector {
            config: config.clone(),
        }
    }

    async fn connect_imap(&self, credentials: &Credentials) -> Result<ImapSession, MailError> {
        let host = self.config.imap_host.as_str();
        let server = format!("{}:{}", host, self.config.imap_port);
        info!("Connecting to IMAP server {}", server);

        let tcp = TcpStream::connect((host, self.config.imap_port))
            .await
            .map_err(|e| MailError::transport(&server, e))?;

        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| MailError::transport(&server, e))?;
        let tls = tokio_native_tls::TlsConnector::from(tls);
        let tls_stream = tls
            .connect(host, tcp)
            .await
            .map_err(|e| MailError::transport(&server, e))?;

        let client = async_imap::Client::new(tls_stream.compat());
        let mut session = client
            .login(&credentials.account, &credentials.password)
            .await
            .map_err(|(e, _client)| match e {
                async_imap::error::Error::No(reason) | async_imap::error::Error::Bad(reason) => {
                    MailError::auth(&server, reason)
                }
                other => MailError::transport(&server, other),
            })?;

        session
            .select("INBOX")
            .await
            .map_err(|e| MailError::transport(&server, e))?;

        Ok(session)
    }
}

impl MailConnector for ImapConnector {
    type Session = ImapSmtpSession;

    async fn login(&self, credentials: &Credentials) -> Result<ImapSmtpSession, MailError> {
        let imap = self.connect_imap(credentials).await?;
        let mut session = ImapSmtpSession {
            imap: Some(imap),
            outbox: SmtpOutbox::new(&self.config, credentials)?,
            server: format!("{}:{}", self.config.imap_host, self.config.imap_port),
        };

        if let Err(e) = session.outbox.verify().await {
            session.logout().await;
            return Err(e);
        }

        info!("✅ Logged in as {}", credentials.account);
        Ok(session)
    }
}

/// `FROM` search matches anywhere in the header, display name included, so
/// only messages whose decoded address is `contact` are kept. The others stay
/// unread.
fn from_contact(messages: Vec<Message>, contact: &str) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|message| {
            let whitelisted = message.is_from(contact);
            if !whitelisted {
                warn!(
                    "Message {} matched {} but was sent by {}, leaving it alone",
                    message.uid, contact, message.sender
                );
            }
            whitelisted
        })
        .collect()
}

/// One authenticated attempt. Dropped after logout; never reused.
pub struct ImapSmtpSession {
    imap: Option<ImapSession>,
    outbox: SmtpOutbox,
    server: String,
}

impl MailSession for ImapSmtpSession {
    async fn fetch_unread(&mut self, contact: &str) -> Result<Vec<Message>, MailError> {
        let server = self.server.as_str();
        let imap = self
            .imap
            .as_mut()
            .ok_or_else(|| MailError::transport(server, "session already logged out"))?;

        let query = format!("UNSEEN FROM \"{}\"", contact);
        debug!("Search criteria: {}", query);

        let mut uids: Vec<u32> = imap
            .uid_search(&query)
            .await
            .map_err(|e| MailError::transport(server, e))?
            .into_iter()
            .collect();
        uids.sort_unstable();

        let mut messages = Vec::with_capacity(uids.len());
        for uid in uids {
            // PEEK keeps the \Seen flag untouched until the dispatcher decides
            let fetches: Vec<_> = imap
                .uid_fetch(uid.to_string(), "BODY.PEEK[]")
                .await
                .map_err(|e| MailError::transport(server, e))?
                .try_collect()
                .await
                .map_err(|e| MailError::transport(server, e))?;

            let Some(raw) = fetches.iter().find_map(|fetch| fetch.body()) else {
                warn!("Message {} from {} came back without a body, skipping", uid, contact);
                continue;
            };

            match MessageDecoder::decode(uid, raw, contact) {
                Ok(message) => messages.push(message),
                Err(e) => warn!("Skipping message {} from {}: {}", uid, contact, e),
            }
        }

        Ok(from_contact(messages, contact))
    }

    async fn mark_read(&mut self, message: &mut Message) -> Result<(), MailError> {
        if message.read {
            return Ok(());
        }
        let server = self.server.as_str();
        let imap = self
            .imap
            .as_mut()
            .ok_or_else(|| MailError::transport(server, "session already logged out"))?;

        let _updates: Vec<_> = imap
            .uid_store(message.uid.to_string(), "+FLAGS (\\Seen)")
            .await
            .map_err(|e| MailError::transport(server, e))?
            .try_collect()
            .await
            .map_err(|e| MailError::transport(server, e))?;

        message.read = true;
        debug!("Message {} marked as read", message.uid);
        Ok(())
    }

    async fn send(&mut self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.outbox
            .send(&OutgoingMail::reply(to, subject, body))
            .await
    }

    async fn logout(&mut self) {
        if let Some(mut imap) = self.imap.take() {
            info!("Logging out of {}", self.server);
            if let Err(e) = imap.logout().await {
                warn!("IMAP logout failed: {}", e);
            }
        }
    }
}
