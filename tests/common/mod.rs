//! Fixture archive with the tables and columns of a real chat.db.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use imsg_archive::timestamp;
use rusqlite::{params, Connection};
use tempfile::TempDir;

const SCHEMA: &str = "
    CREATE TABLE message (
        ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
        guid TEXT UNIQUE NOT NULL,
        text TEXT,
        attributedBody BLOB,
        date INTEGER,
        is_from_me INTEGER DEFAULT 0,
        service TEXT,
        handle_id INTEGER DEFAULT 0
    );
    CREATE TABLE handle (
        ROWID INTEGER PRIMARY KEY AUTOINCREMENT UNIQUE,
        id TEXT NOT NULL,
        service TEXT NOT NULL
    );
    CREATE TABLE chat (
        ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
        guid TEXT UNIQUE NOT NULL,
        chat_identifier TEXT,
        service_name TEXT,
        display_name TEXT
    );
    CREATE TABLE chat_message_join (
        chat_id INTEGER REFERENCES chat (ROWID) ON DELETE CASCADE,
        message_id INTEGER REFERENCES message (ROWID) ON DELETE CASCADE,
        message_date INTEGER DEFAULT 0,
        PRIMARY KEY (chat_id, message_id)
    );
    CREATE TABLE attachment (
        ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
        guid TEXT UNIQUE NOT NULL,
        filename TEXT,
        mime_type TEXT,
        transfer_name TEXT,
        total_bytes INTEGER DEFAULT 0
    );
    CREATE TABLE message_attachment_join (
        message_id INTEGER REFERENCES message (ROWID) ON DELETE CASCADE,
        attachment_id INTEGER REFERENCES attachment (ROWID) ON DELETE CASCADE,
        UNIQUE(message_id, attachment_id)
    );
";

/// A writable chat.db in a temporary directory
pub struct Fixture {
    dir: TempDir,
    path: PathBuf,
    conn: Connection,
}

/// One message to insert
pub struct NewMessage<'a> {
    pub text: Option<&'a str>,
    pub body: Option<Vec<u8>>,
    pub date: DateTime<Utc>,
    pub from_me: bool,
    pub handle_id: i64,
    pub chat_id: Option<i64>,
}

impl<'a> NewMessage<'a> {
    pub fn text(text: &'a str, date: DateTime<Utc>) -> Self {
        Self {
            text: Some(text),
            body: None,
            date,
            from_me: false,
            handle_id: 0,
            chat_id: None,
        }
    }

    pub fn from(mut self, handle_id: i64) -> Self {
        self.handle_id = handle_id;
        self
    }

    pub fn in_chat(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    pub fn outbound(mut self) -> Self {
        self.from_me = true;
        self
    }
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("chat.db");
        let conn = Connection::open(&path).expect("create fixture archive");
        // Messages keeps chat.db in write-ahead-log mode
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .expect("enable WAL");
        assert_eq!(mode.to_lowercase(), "wal");
        conn.execute_batch(SCHEMA).expect("create schema");
        Self { dir, path, conn }
    }

    /// A second writable connection, like Messages holding the file open
    pub fn writer(&self) -> Connection {
        Connection::open(&self.path).expect("open writer connection")
    }

    /// Journal mode the archive file is in
    pub fn journal_mode(&self) -> String {
        self.conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .expect("read journal mode")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_handle(&self, id: &str) -> i64 {
        self.conn
            .execute("INSERT INTO handle (id, service) VALUES (?1, 'iMessage')", params![id])
            .expect("insert handle");
        self.conn.last_insert_rowid()
    }

    pub fn add_chat(&self, identifier: &str, display_name: Option<&str>) -> i64 {
        self.conn
            .execute(
                "INSERT INTO chat (guid, chat_identifier, service_name, display_name) \
                 VALUES (?1, ?2, 'iMessage', ?3)",
                params![format!("iMessage;-;{identifier}"), identifier, display_name.unwrap_or("")],
            )
            .expect("insert chat");
        self.conn.last_insert_rowid()
    }

    pub fn add_message(&self, message: NewMessage<'_>) -> i64 {
        let date = timestamp::from_absolute(message.date);
        let rowid: i64 = self
            .conn
            .query_row("SELECT COALESCE(MAX(ROWID), 0) + 1 FROM message", [], |row| row.get(0))
            .expect("next rowid");
        self.conn
            .execute(
                "INSERT INTO message (ROWID, guid, text, attributedBody, date, is_from_me, service, handle_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'iMessage', ?7)",
                params![
                    rowid,
                    format!("guid-{rowid}"),
                    message.text,
                    message.body,
                    date,
                    message.from_me,
                    message.handle_id
                ],
            )
            .expect("insert message");
        if let Some(chat_id) = message.chat_id {
            self.join_chat(chat_id, rowid);
        }
        rowid
    }

    pub fn join_chat(&self, chat_id: i64, message_id: i64) {
        self.conn
            .execute(
                "INSERT INTO chat_message_join (chat_id, message_id) VALUES (?1, ?2)",
                params![chat_id, message_id],
            )
            .expect("join chat");
    }

    pub fn add_attachment(&self, message_id: i64, filename: &str, mime: Option<&str>) -> i64 {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.conn
            .execute(
                "INSERT INTO attachment (guid, filename, mime_type, transfer_name, total_bytes) \
                 VALUES (?1, ?2, ?3, ?4, 2048)",
                params![format!("att-{message_id}-{name}"), filename, mime, name],
            )
            .expect("insert attachment");
        let attachment_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "INSERT INTO message_attachment_join (message_id, attachment_id) VALUES (?1, ?2)",
                params![message_id, attachment_id],
            )
            .expect("join attachment");
        attachment_id
    }
}

/// 2024-03-01 plus `minutes`
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

/// A minimal `attributedBody` payload carrying `text`
pub fn attributed_body(text: &str) -> Vec<u8> {
    let mut blob = b"\x04\x0bstreamtyped\x81\xe8\x03\x84\x01@\x84\x84\x84\x12NSAttributedString\x00\
\x84\x84\x08NSObject\x00\x85\x92\x84\x84\x84\x08NSString\x01\x94\x84\x01\x2b"
        .to_vec();
    blob.push(u8::try_from(text.len()).expect("short text"));
    blob.extend_from_slice(text.as_bytes());
    blob.extend_from_slice(b"\x86\x84\x02iI\x01\x05\x92");
    blob
}
