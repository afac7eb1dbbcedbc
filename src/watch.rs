//! Live tail over the archive.
//!
//! A `Watcher` remembers the highest row identifier it has delivered and
//! repeatedly asks the repository for anything newer. It never stops on its
//! own; callers cancel by dropping the `run` future or by no longer calling
//! `poll`.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::Result;
use crate::metrics;
use crate::models::{Message, MessageFilter};
use crate::repository::MessageRepository;

/// Default pause between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Messages delivered by one poll and the watermark after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollBatch {
    /// Newly arrived messages in ascending row identifier order
    pub messages: Vec<Message>,
    /// Highest row identifier delivered so far
    pub watermark: i64,
}

/// What to watch and how often
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Restrict to one conversation
    pub chat_id: Option<i64>,
    /// Participant and time restrictions
    pub filter: MessageFilter,
    /// Start after this row identifier instead of the current maximum
    pub since_rowid: Option<i64>,
    /// Pause between polls
    pub interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            chat_id: None,
            filter: MessageFilter::default(),
            since_rowid: None,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Polling cursor over a message repository
pub struct Watcher<'a, R: MessageRepository + ?Sized> {
    repo: &'a R,
    chat_id: Option<i64>,
    filter: MessageFilter,
    interval: Duration,
    watermark: i64,
}

impl<'a, R: MessageRepository + ?Sized> Watcher<'a, R> {
    /// Start a watch session.
    ///
    /// Without `since_rowid` the session begins at the archive's current
    /// maximum row identifier and reports only messages that arrive later.
    pub fn new(repo: &'a R, options: WatchOptions) -> Result<Self> {
        let watermark = match options.since_rowid {
            Some(rowid) => rowid,
            None => repo.max_rowid()?,
        };
        info!(watermark, chat_id = ?options.chat_id, "Starting watch session");

        Ok(Self {
            repo,
            chat_id: options.chat_id,
            filter: options.filter,
            interval: options.interval,
            watermark,
        })
    }

    /// Highest row identifier delivered so far
    #[must_use]
    pub const fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Run one polling step.
    ///
    /// The watermark moves to the largest row identifier in a non-empty batch
    /// and stays put when nothing new arrived.
    pub fn poll(&mut self) -> Result<PollBatch> {
        let messages = self
            .repo
            .messages_after(self.watermark, self.chat_id, &self.filter)
            .inspect_err(|_| metrics::record_error("poll"))?;

        if let Some(highest) = messages.iter().map(|m| m.rowid).max() {
            self.watermark = self.watermark.max(highest);
            debug!(count = messages.len(), watermark = self.watermark, "New messages");
        }
        metrics::record_poll(messages.len(), self.watermark);

        Ok(PollBatch {
            messages,
            watermark: self.watermark,
        })
    }

    /// Poll forever, handing every non-empty batch to `on_batch`.
    ///
    /// Returns only when a poll or the callback fails.
    pub async fn run<F>(&mut self, mut on_batch: F) -> Result<()>
    where
        F: FnMut(&PollBatch) -> Result<()>,
    {
        loop {
            let batch = self.poll()?;
            if !batch.messages.is_empty() {
                on_batch(&batch)?;
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
