//! Mail archive decoding and message rendering.
//!
//! # Design
//! - Mail archives are at most two levels deep (channel, then message), so migration needs
//!   no container stack; see [`archive`] and [`group`].
//! - Message container names come from the `Date`, `From`, and `Subject` headers and are
//!   deterministic for a given message.

pub mod archive;
pub mod group;

use serde::Deserialize;
use serde_json::Value;

use crate::descriptor::ContentKind;
use crate::error::{CoreError, CoreResult};
use crate::names::{NamePolicy, sanitize};

pub use archive::{AttachmentOutcome, MessageOutcome, migrate_mail_archive};
pub use group::{GroupMessageOutcome, GroupPublisher, migrate_to_group};

const MAIL_COLLECTION: &str = "mailarchive_collection";
const CRLF: &str = "\r\n";

/// File name used for the rendered message inside its container.
pub const MESSAGE_FILE_NAME: &str = "message.txt";
/// Header line prefix carrying the send date.
pub const DATE_HEADER: &str = "Date: ";
/// Header line prefix carrying the sender.
pub const FROM_HEADER: &str = "From: ";
/// Header line prefix carrying the subject.
pub const SUBJECT_HEADER: &str = "Subject: ";

/// One mailing-list channel of a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailChannel {
    /// Channel id relative to the site.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// File attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailAttachment {
    /// Attachment file name.
    #[serde(default)]
    pub name: String,
    /// MIME type reported by the source.
    #[serde(rename = "type", default)]
    pub mime_type: Option<String>,
    /// Access URL for the attachment bytes.
    #[serde(default)]
    pub url: String,
}

/// One archived message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailMessage {
    /// Message id.
    #[serde(default)]
    pub id: String,
    /// Raw header lines (`Name: value`).
    #[serde(default)]
    pub headers: Vec<String>,
    /// Message body.
    #[serde(default)]
    pub body: String,
    /// Attachments in source order.
    #[serde(default)]
    pub attachments: Vec<MailAttachment>,
}

impl MailMessage {
    /// Value of the first header line starting with `prefix`, or an empty string.
    #[must_use]
    pub fn header_value(&self, prefix: &str) -> &str {
        header_value(&self.headers, prefix)
    }
}

/// A channel together with its decoded messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailChannelContent {
    /// Channel being migrated.
    pub channel: MailChannel,
    /// Messages in source order.
    pub messages: Vec<MailMessage>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    #[serde(default)]
    data: String,
    #[serde(rename = "displayTitle", default)]
    display_title: String,
}

fn collection(payload: &str, operation: &'static str) -> CoreResult<Option<Value>> {
    let mut document: Value =
        serde_json::from_str(payload).map_err(|err| CoreError::feed_decode(operation, err))?;
    Ok(document.get_mut(MAIL_COLLECTION).map(Value::take))
}

/// Decode a site's channel list.
///
/// Returns `Ok(None)` when the payload carries no `mailarchive_collection`, which the
/// callers treat as a site without a mail archive.
///
/// # Errors
///
/// Returns an error when the payload is not JSON or the collection is malformed.
pub fn parse_channels(site_id: &str, payload: &str) -> CoreResult<Option<Vec<MailChannel>>> {
    let Some(items) = collection(payload, "parse_channels")? else {
        return Ok(None);
    };
    let items: Vec<ChannelItem> = serde_json::from_value(items)
        .map_err(|err| CoreError::feed_decode("parse_channels", err))?;
    let prefix = format!("/mailarchive/channel/{site_id}/");
    let channels = items
        .into_iter()
        .map(|item| MailChannel {
            id: item
                .data
                .strip_prefix(&prefix)
                .map_or_else(|| item.data.clone(), str::to_string),
            name: item.display_title,
        })
        .collect();
    Ok(Some(channels))
}

/// Decode the messages of one channel.
///
/// # Errors
///
/// Returns an error when the payload is not JSON or lacks a `mailarchive_collection` array.
pub fn parse_messages(payload: &str) -> CoreResult<Vec<MailMessage>> {
    let items = collection(payload, "parse_messages")?.ok_or(CoreError::FeedShape {
        field: MAIL_COLLECTION,
        reason: "missing",
    })?;
    serde_json::from_value(items).map_err(|err| CoreError::feed_decode("parse_messages", err))
}

/// Value of the first header line starting with `prefix`, or an empty string.
#[must_use]
pub fn header_value<'h>(headers: &'h [String], prefix: &str) -> &'h str {
    headers
        .iter()
        .find_map(|line| line.strip_prefix(prefix))
        .unwrap_or("")
}

/// Container name for a message: `"<date> <from> <subject>"`, sanitized for `policy`.
#[must_use]
pub fn message_container_name(policy: &NamePolicy, message: &MailMessage) -> String {
    let raw = format!(
        "{} {} {}",
        message.header_value(DATE_HEADER),
        message.header_value(FROM_HEADER),
        message.header_value(SUBJECT_HEADER)
    );
    sanitize(policy, ContentKind::Folder, &raw)
}

/// Render a message as RFC 822 text: every header line, a blank line, then the body.
#[must_use]
pub fn render_message(message: &MailMessage) -> String {
    let mut text = String::with_capacity(message.body.len() + 64 * message.headers.len());
    for header in &message.headers {
        text.push_str(header);
        text.push_str(CRLF);
    }
    text.push_str(CRLF);
    text.push_str(&message.body);
    text
}
