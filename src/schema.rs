//! Message archive schema definitions
//!
//! Table and column names of the Messages `chat.db` store. They are fixed by
//! the application that writes the archive and must match exactly.

/// Messages table schema
pub mod message {
    /// Table name
    pub const TABLE: &str = "message";
    /// Row identifier, monotonically increasing
    pub const ROWID: &str = "ROWID";
    /// Globally unique identifier column
    pub const GUID: &str = "guid";
    /// Plain text body column
    pub const TEXT: &str = "text";
    /// Archived rich-text body column (BLOB)
    pub const ATTRIBUTED_BODY: &str = "attributedBody";
    /// Native timestamp column
    pub const DATE: &str = "date";
    /// Direction flag column
    pub const IS_FROM_ME: &str = "is_from_me";
    /// Service label column (iMessage, SMS, ...)
    pub const SERVICE: &str = "service";
    /// Foreign key to handle table
    pub const HANDLE_ID: &str = "handle_id";
}

/// Conversations table schema
pub mod chat {
    /// Table name
    pub const TABLE: &str = "chat";
    /// Primary key column
    pub const ROWID: &str = "ROWID";
    /// Stable identifier column
    pub const CHAT_IDENTIFIER: &str = "chat_identifier";
    /// Human display name column
    pub const DISPLAY_NAME: &str = "display_name";
    /// Service label column
    pub const SERVICE_NAME: &str = "service_name";
}

/// Participant handles table schema
pub mod handle {
    /// Table name
    pub const TABLE: &str = "handle";
    /// Primary key column
    pub const ROWID: &str = "ROWID";
    /// Phone number or email column
    pub const ID: &str = "id";
}

/// Attachments table schema
pub mod attachment {
    /// Table name
    pub const TABLE: &str = "attachment";
    /// Primary key column
    pub const ROWID: &str = "ROWID";
    /// Stored filename column, may start with `~`
    pub const FILENAME: &str = "filename";
    /// MIME type column
    pub const MIME_TYPE: &str = "mime_type";
    /// Original file name column
    pub const TRANSFER_NAME: &str = "transfer_name";
    /// File size in bytes column
    pub const TOTAL_BYTES: &str = "total_bytes";
}

/// Message to conversation join table
pub mod chat_message_join {
    /// Table name
    pub const TABLE: &str = "chat_message_join";
    /// Foreign key to chat table
    pub const CHAT_ID: &str = "chat_id";
    /// Foreign key to message table
    pub const MESSAGE_ID: &str = "message_id";
}

/// Message to attachment join table
pub mod message_attachment_join {
    /// Table name
    pub const TABLE: &str = "message_attachment_join";
    /// Foreign key to message table
    pub const MESSAGE_ID: &str = "message_id";
    /// Foreign key to attachment table
    pub const ATTACHMENT_ID: &str = "attachment_id";
}
