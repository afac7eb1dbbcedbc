//! Data models for archive records
//!
//! Raw rows as fetched from the store (`MessageRow`, `AttachmentRow`) and the
//! enriched records handed to callers (`Message`, `Attachment`,
//! `Conversation`). Turning rows into records is a pure transform, so it can be
//! tested without a database.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{attachment, attributed_body, timestamp};

/// A single archived message with its effective body and attachments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned row identifier, used as the live-tail watermark
    pub rowid: i64,
    /// Globally unique identifier
    pub guid: String,
    /// Effective body: plain text, or text decoded from the archived body
    pub text: Option<String>,
    /// When the message was sent or received
    pub date: DateTime<Utc>,
    /// True if the message was sent by the archive owner
    pub is_from_me: bool,
    /// Transport label (iMessage, SMS, ...)
    pub service: Option<String>,
    /// Foreign key to the sender handle
    pub handle_id: Option<i64>,
    /// Sender handle (phone number or email)
    pub sender: Option<String>,
    /// Owning conversation
    pub chat_id: Option<i64>,
    /// Stable identifier of the owning conversation
    pub chat_identifier: Option<String>,
    /// Display name of the owning conversation
    pub chat_name: Option<String>,
    /// Attachments, empty when there are none
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Name to show for the conversation: display name, identifier, or sender.
    #[must_use]
    pub fn conversation_label(&self) -> &str {
        self.chat_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.chat_identifier.as_deref())
            .or(self.sender.as_deref())
            .unwrap_or("unknown")
    }

    /// Name to show for the sender.
    #[must_use]
    pub fn sender_label(&self) -> &str {
        if self.is_from_me {
            "me"
        } else {
            self.sender.as_deref().unwrap_or("unknown")
        }
    }
}

/// A file attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment row identifier
    pub id: i64,
    /// Filename as stored, possibly starting with `~`
    pub filename: Option<String>,
    /// MIME type
    pub mime_type: Option<String>,
    /// Original name of the transferred file
    pub transfer_name: Option<String>,
    /// Size in bytes
    pub total_bytes: Option<i64>,
    /// Absolute path after alias expansion
    pub path: Option<PathBuf>,
    /// Whether the file was on disk at read time
    pub exists: bool,
}

impl Attachment {
    /// Human-facing name of the attachment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.transfer_name
            .as_deref()
            .or_else(|| {
                self.filename
                    .as_deref()
                    .and_then(|f| Path::new(f).file_name())
                    .and_then(|f| f.to_str())
            })
            .unwrap_or("unnamed")
    }
}

/// A conversation with aggregates computed at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Chat row identifier
    pub id: i64,
    /// Human display name, if one was set
    pub display_name: Option<String>,
    /// Stable identifier (phone, email, or group id)
    pub identifier: String,
    /// Transport label
    pub service: Option<String>,
    /// Number of messages in the conversation
    pub message_count: i64,
    /// Timestamp of the most recent message, `None` for empty conversations
    pub last_message_at: Option<DateTime<Utc>>,
}

/// A message row exactly as read from the store
#[derive(Debug, Clone, Default)]
pub struct MessageRow {
    /// `message.ROWID`
    pub rowid: i64,
    /// `message.guid`
    pub guid: String,
    /// `message.text`
    pub text: Option<String>,
    /// `message.attributedBody`
    pub attributed_body: Option<Vec<u8>>,
    /// `message.date` in native units
    pub date: i64,
    /// `message.is_from_me`
    pub is_from_me: bool,
    /// `message.service`
    pub service: Option<String>,
    /// `message.handle_id`
    pub handle_id: Option<i64>,
    /// `handle.id` of the sender
    pub sender: Option<String>,
    /// `chat.ROWID`
    pub chat_id: Option<i64>,
    /// `chat.chat_identifier`
    pub chat_identifier: Option<String>,
    /// `chat.display_name`
    pub chat_name: Option<String>,
}

impl MessageRow {
    /// Build the caller-facing message: decode the body and attach files.
    #[must_use]
    pub fn into_message(self, attachments: Vec<Attachment>) -> Message {
        let text = self
            .text
            .or_else(|| attributed_body::decode(self.attributed_body.as_deref()));

        Message {
            rowid: self.rowid,
            guid: self.guid,
            text,
            date: timestamp::to_absolute(self.date),
            is_from_me: self.is_from_me,
            service: self.service,
            handle_id: self.handle_id,
            sender: self.sender,
            chat_id: self.chat_id,
            chat_identifier: self.chat_identifier,
            chat_name: self.chat_name,
            attachments,
        }
    }
}

/// An attachment row joined to the message that carries it
#[derive(Debug, Clone, Default)]
pub struct AttachmentRow {
    /// `message_attachment_join.message_id`
    pub message_id: i64,
    /// `attachment.ROWID`
    pub id: i64,
    /// `attachment.filename`
    pub filename: Option<String>,
    /// `attachment.mime_type`
    pub mime_type: Option<String>,
    /// `attachment.transfer_name`
    pub transfer_name: Option<String>,
    /// `attachment.total_bytes`
    pub total_bytes: Option<i64>,
}

impl AttachmentRow {
    /// Resolve the stored path against the filesystem right now.
    #[must_use]
    pub fn resolve(self) -> Attachment {
        let resolved = self.filename.as_deref().map(attachment::resolve);
        Attachment {
            id: self.id,
            exists: resolved.as_ref().is_some_and(|r| r.exists),
            path: resolved.map(|r| r.path),
            filename: self.filename,
            mime_type: self.mime_type,
            transfer_name: self.transfer_name,
            total_bytes: self.total_bytes,
        }
    }
}

/// Enrich a batch of rows with decoded text and their attachments.
///
/// Every message gets a list, empty when `attachments` has no entry for it.
/// Row order is preserved.
#[must_use]
pub fn enrich(rows: Vec<MessageRow>, mut attachments: HashMap<i64, Vec<Attachment>>) -> Vec<Message> {
    rows.into_iter()
        .map(|row| {
            let files = attachments.remove(&row.rowid).unwrap_or_default();
            row.into_message(files)
        })
        .collect()
}

/// Optional restrictions shared by conversation history and live tail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Sender handles to keep; empty means everyone
    pub participants: Vec<String>,
    /// Inclusive lower bound
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub end: Option<DateTime<Utc>>,
}

impl MessageFilter {
    /// A filter that keeps everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only messages sent by these handles.
    #[must_use]
    pub fn with_participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants = participants.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only messages in `[start, end)`.
    #[must_use]
    pub const fn with_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// Output format for rendered records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per message
    #[default]
    Txt,
    /// Comma-separated values format
    Csv,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Get the file extension for this format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }

    /// Parse a configured format name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(Self::Txt),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(rowid: i64) -> MessageRow {
        MessageRow {
            rowid,
            guid: format!("guid-{rowid}"),
            date: 700_000_000_000_000_000,
            ..MessageRow::default()
        }
    }

    fn archived(text: &str) -> Vec<u8> {
        let mut blob = b"streamtyped\x84\x01@NSString\x01\x94\x84\x01\x2B".to_vec();
        blob.push(u8::try_from(text.len()).unwrap());
        blob.extend_from_slice(text.as_bytes());
        blob.push(0x86);
        blob
    }

    fn file(id: i64) -> Attachment {
        Attachment {
            id,
            filename: Some(format!("~/Library/Messages/Attachments/{id}.jpg")),
            mime_type: Some("image/jpeg".to_string()),
            transfer_name: None,
            total_bytes: None,
            path: None,
            exists: false,
        }
    }

    #[test]
    fn test_plain_text_wins_over_archived_body() {
        let mut r = row(1);
        r.text = Some("plain".to_string());
        r.attributed_body = Some(archived("archived"));
        assert_eq!(r.into_message(Vec::new()).text.as_deref(), Some("plain"));
    }

    #[test]
    fn test_archived_body_used_when_text_null() {
        let mut r = row(1);
        r.attributed_body = Some(archived("from the blob"));
        assert_eq!(r.into_message(Vec::new()).text.as_deref(), Some("from the blob"));
    }

    #[test]
    fn test_content_less_message() {
        let m = row(1).into_message(Vec::new());
        assert_eq!(m.text, None);
        assert!(m.attachments.is_empty());
    }

    #[test]
    fn test_enrich_assigns_attachments_and_keeps_order() {
        let rows = vec![row(3), row(2), row(1)];
        let mut files = HashMap::new();
        files.insert(2, vec![file(10), file(11)]);

        let messages = enrich(rows, files);
        let ids: Vec<i64> = messages.iter().map(|m| m.rowid).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(messages[0].attachments.is_empty());
        assert_eq!(messages[1].attachments.len(), 2);
        assert!(messages[2].attachments.is_empty());
    }

    #[test]
    fn test_attachment_name_fallbacks() {
        let mut a = file(1);
        assert_eq!(a.name(), "1.jpg");
        a.transfer_name = Some("holiday.jpg".to_string());
        assert_eq!(a.name(), "holiday.jpg");
        a.transfer_name = None;
        a.filename = None;
        assert_eq!(a.name(), "unnamed");
    }

    #[test]
    fn test_labels() {
        let mut m = row(1).into_message(Vec::new());
        assert_eq!(m.conversation_label(), "unknown");
        m.sender = Some("+15551234567".to_string());
        assert_eq!(m.conversation_label(), "+15551234567");
        m.chat_identifier = Some("chat123".to_string());
        m.chat_name = Some(String::new());
        assert_eq!(m.conversation_label(), "chat123");
        m.chat_name = Some("Family".to_string());
        assert_eq!(m.conversation_label(), "Family");

        assert_eq!(m.sender_label(), "+15551234567");
        m.is_from_me = true;
        assert_eq!(m.sender_label(), "me");
    }

    #[test]
    fn test_output_format_names() {
        assert_eq!(OutputFormat::from_name("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_name("text"), Some(OutputFormat::Txt));
        assert_eq!(OutputFormat::from_name("xml"), None);
        assert_eq!(OutputFormat::Csv.extension(), "csv");
    }
}
