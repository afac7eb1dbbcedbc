//! imsg archive - read access to the macOS Messages archive
//!
//! A Rust library for reading the local Messages `chat.db`: recent messages,
//! text search, per-conversation history, conversation listings and a polling
//! live tail, with attachments resolved to files on disk.
//!
//! # Features
//!
//! - Native timestamp conversion (seconds or nanoseconds since 2001-01-01)
//! - Message text recovered from serialized `attributedBody` payloads
//! - Batched attachment loading with `~` expansion
//! - Live tail keyed on a row identifier watermark
//! - One-line, CSV and JSON rendering
//! - Best-effort sending through AppleScript

/// Attachment path resolution
pub mod attachment;
/// Recovery of text from serialized rich-text payloads
pub mod attributed_body;
/// Configuration management
pub mod config;
/// Read-only archive access
pub mod db;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Rendering of messages and conversations
pub mod output;
/// Repository trait for archive queries
pub mod repository;
/// Database schema definitions
pub mod schema;
/// Outbound messages
pub mod send;
/// Native timestamp codec
pub mod timestamp;
/// Input validation and sanitization
pub mod validation;
/// Live tail
pub mod watch;

// Re-export key components for easier access
pub use db::Archive;
pub use error::{ArchiveError, Result};
pub use models::{Attachment, Conversation, Message, MessageFilter, OutputFormat};
pub use repository::MessageRepository;
pub use watch::{PollBatch, WatchOptions, Watcher};
