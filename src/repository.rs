//! Read-side contract of the message archive.
//!
//! `Archive` is the production implementation; the live-tail cursor and the
//! CLI only see this trait, so they can be driven by a mock in tests.

use crate::error::Result;
use crate::models::{Conversation, Message, MessageFilter};

/// Read-only access to archived messages and conversations
#[cfg_attr(test, mockall::automock)]
pub trait MessageRepository {
    /// The `limit` most recent messages across all conversations, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<Message>>;

    /// Messages whose plain text contains `term` (ASCII case-insensitive), newest first.
    fn search(&self, term: &str, limit: usize) -> Result<Vec<Message>>;

    /// Messages of one conversation matching `filter`, newest first.
    fn history(&self, chat_id: i64, limit: usize, filter: &MessageFilter) -> Result<Vec<Message>>;

    /// Conversations by most recent activity; empty conversations last.
    fn list_conversations(&self, limit: Option<usize>) -> Result<Vec<Conversation>>;

    /// Highest message row identifier, 0 when the archive holds no messages.
    fn max_rowid(&self) -> Result<i64>;

    /// Messages with a row identifier above `watermark`, oldest first.
    ///
    /// Implementations must read from a fresh snapshot on every call.
    fn messages_after(&self, watermark: i64, chat_id: Option<i64>, filter: &MessageFilter) -> Result<Vec<Message>>;
}
