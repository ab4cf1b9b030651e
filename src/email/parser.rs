use log::debug;
use mail_parser::{MessageParser, MimeHeaders};

use crate::email::common::{Attachment, Message};
use crate::error::MailError;

/// Translates raw RFC 822 bytes into the agent's [`Message`].
pub struct MessageDecoder;

impl MessageDecoder {
    /// `fallback_sender` is used when the `From` header is missing or unreadable,
    /// which happens with some forwarding services. The search that produced
    /// `uid` already filtered on the sender.
    pub fn decode(uid: u32, raw: &[u8], fallback_sender: &str) -> Result<Message, MailError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| MailError::Parse {
                uid,
                reason: "not a valid RFC 822 message".to_string(),
            })?;

        let sender = parsed
            .from()
            .and_then(|addrs| addrs.first())
            .and_then(|addr| addr.address.as_deref())
            .unwrap_or(fallback_sender)
            .to_string();

        let subject = parsed.subject().map(str::to_string);
        let body = parsed
            .body_text(0)
            .map(|text| text.into_owned())
            .unwrap_or_default();

        let attachments: Vec<Attachment> = parsed
            .attachments()
            .map(|part| Attachment {
                name: part.attachment_name().map(str::to_string),
                content: part.contents().to_vec(),
            })
            .collect();

        debug!(
            "Decoded message {} from {}: subject {:?}, {} body bytes, {} attachment(s)",
            uid,
            sender,
            subject,
            body.len(),
            attachments.len()
        );

        Ok(Message {
            uid,
            sender,
            subject,
            body,
            attachments,
            read: false,
        })
    }
}
