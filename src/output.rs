//! Rendering of archive records.
//!
//! The default rendering is one line per message:
//! `[<timestamp>] <glyph> <conversation> (<sender>): <body>`.
//! CSV and JSON writers serve scripts and exports.

use std::io::Write;

use chrono::Local;
use csv::Writer;

use crate::error::Result;
use crate::models::{Attachment, Conversation, Message, OutputFormat};

/// Body text longer than this many characters is truncated
pub const DEFAULT_PREVIEW_CHARS: usize = 120;

const OUTBOUND_GLYPH: &str = "→";
const INBOUND_GLYPH: &str = "←";
const ELLIPSIS: char = '…';
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render one message as a single human-readable line.
#[must_use]
pub fn format_message_line(message: &Message, preview_chars: usize) -> String {
    format!(
        "[{}] {} {} ({}): {}",
        message.date.with_timezone(&Local).format(TIMESTAMP_FORMAT),
        if message.is_from_me { OUTBOUND_GLYPH } else { INBOUND_GLYPH },
        message.conversation_label(),
        message.sender_label(),
        body_summary(message, preview_chars)
    )
}

/// Text (truncated), an attachment summary, or a no-content marker.
#[must_use]
pub fn body_summary(message: &Message, preview_chars: usize) -> String {
    if let Some(text) = message.text.as_deref().filter(|t| !t.is_empty()) {
        return truncate(text, preview_chars);
    }
    if !message.attachments.is_empty() {
        return attachment_summary(&message.attachments);
    }
    "[no content]".to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut short = text[..cut].to_string();
            short.push(ELLIPSIS);
            short
        },
        None => text.to_string(),
    }
}

fn attachment_summary(attachments: &[Attachment]) -> String {
    let described: Vec<String> = attachments
        .iter()
        .map(|a| match a.mime_type.as_deref() {
            Some(mime) => format!("{} ({mime})", a.name()),
            None => a.name().to_string(),
        })
        .collect();

    let label = if attachments.len() == 1 { "attachment" } else { "attachments" };
    format!("[{label}: {}]", described.join(", "))
}

/// Render one conversation as a single line.
#[must_use]
pub fn format_conversation_line(conversation: &Conversation) -> String {
    let last = conversation.last_message_at.map_or_else(
        || "never".to_string(),
        |t| t.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
    );
    let name = conversation
        .display_name
        .as_deref()
        .unwrap_or(&conversation.identifier);

    format!(
        "[{}] {} ({}) {} messages, last {}",
        conversation.id,
        name,
        conversation.service.as_deref().unwrap_or("unknown"),
        conversation.message_count,
        last
    )
}

/// Write messages in the given format.
pub fn write_messages<W: Write>(writer: W, messages: &[Message], format: OutputFormat, preview_chars: usize) -> Result<()> {
    match format {
        OutputFormat::Txt => write_message_lines(writer, messages, preview_chars),
        OutputFormat::Csv => write_message_csv(writer, messages),
        OutputFormat::Json => write_json(writer, messages),
    }
}

/// Write conversations in the given format.
pub fn write_conversations<W: Write>(mut writer: W, conversations: &[Conversation], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Txt => {
            for conversation in conversations {
                writeln!(writer, "{}", format_conversation_line(conversation))?;
            }
            writer.flush()?;
            Ok(())
        },
        OutputFormat::Csv => {
            let mut csv = Writer::from_writer(writer);
            csv.write_record(["ID", "Name", "Identifier", "Service", "Messages", "Last Message"])?;
            for c in conversations {
                csv.write_record([
                    c.id.to_string(),
                    c.display_name.clone().unwrap_or_default(),
                    c.identifier.clone(),
                    c.service.clone().unwrap_or_default(),
                    c.message_count.to_string(),
                    c.last_message_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                ])?;
            }
            csv.flush()?;
            Ok(())
        },
        OutputFormat::Json => write_json(writer, conversations),
    }
}

/// Write live-tail messages: lines for text, one JSON object per line otherwise.
pub fn write_stream<W: Write>(mut writer: W, messages: &[Message], format: OutputFormat, preview_chars: usize) -> Result<()> {
    match format {
        OutputFormat::Json => {
            for message in messages {
                serde_json::to_writer(&mut writer, message)?;
                writeln!(writer)?;
            }
            writer.flush()?;
            Ok(())
        },
        OutputFormat::Txt | OutputFormat::Csv => write_message_lines(writer, messages, preview_chars),
    }
}

fn write_message_lines<W: Write>(mut writer: W, messages: &[Message], preview_chars: usize) -> Result<()> {
    for message in messages {
        writeln!(writer, "{}", format_message_line(message, preview_chars))?;
    }
    writer.flush()?;
    Ok(())
}

/// Header row: `ID, Date, Direction, Conversation, Sender, Text, Attachments`
fn write_message_csv<W: Write>(writer: W, messages: &[Message]) -> Result<()> {
    let mut csv = Writer::from_writer(writer);
    csv.write_record(["ID", "Date", "Direction", "Conversation", "Sender", "Text", "Attachments"])?;

    for m in messages {
        let attachments: Vec<String> = m
            .attachments
            .iter()
            .map(|a| a.path.as_ref().map_or_else(|| a.name().to_string(), |p| p.display().to_string()))
            .collect();
        csv.write_record([
            m.rowid.to_string(),
            m.date.to_rfc3339(),
            if m.is_from_me { "out" } else { "in" }.to_string(),
            m.conversation_label().to_string(),
            m.sender_label().to_string(),
            m.text.clone().unwrap_or_default(),
            attachments.join(";"),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

fn write_json<W: Write, T: serde::Serialize + ?Sized>(mut writer: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
