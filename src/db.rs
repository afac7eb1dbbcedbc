use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row, ToSql};
use tracing::{debug, info};

use crate::error::{ArchiveError, Result};
use crate::logging::OperationTimer;
use crate::metrics;
use crate::models::{enrich, Attachment, AttachmentRow, Conversation, Message, MessageFilter, MessageRow};
use crate::repository::MessageRepository;
use crate::schema::{attachment, chat, chat_message_join, handle, message, message_attachment_join};
use crate::timestamp;

/// SQLite's default bound-parameter ceiling is 32766; stay well below it.
const MAX_BOUND_PARAMS: usize = 900;

/// How long a read waits on a writer's lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-only handle on a message archive
pub struct Archive {
    conn: Connection,
    path: PathBuf,
}

impl Archive {
    /// Open the archive read-only and check that it looks like one.
    ///
    /// Any failure here is an access failure: the file is missing, unreadable,
    /// or not a message archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let access = |source| ArchiveError::Access {
            path: path.clone(),
            source,
        };

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(access)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(access)?;

        // SQLite opens lazily; touch the message table so permission and
        // schema problems surface now rather than on the first query.
        conn.query_row(
            &format!("SELECT 1 FROM {} LIMIT 1", message::TABLE),
            [],
            |_| Ok(()),
        )
        .optional()
        .map_err(access)?;

        info!(path = %path.display(), "Opened message archive");
        Ok(Self { conn, path })
    }

    /// Path the archive was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fetch_messages(conn: &Connection, query: &MessageQuery) -> Result<Vec<Message>> {
        let sql = query.sql();
        debug!(sql = %sql, "Fetching messages");

        let mut stmt = conn.prepare(&sql)?;
        let row_iter = stmt.query_map(params_from_iter(query.bound()), map_message_row)?;

        let mut rows = Vec::new();
        for row in row_iter {
            rows.push(row?);
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.rowid).collect();
        let attachments = Self::load_attachments(conn, &ids)?;
        Ok(enrich(rows, attachments))
    }

    /// Attachments for a batch of messages, keyed by message row identifier.
    fn load_attachments(conn: &Connection, message_ids: &[i64]) -> Result<HashMap<i64, Vec<Attachment>>> {
        let mut by_message: HashMap<i64, Vec<Attachment>> = HashMap::new();

        for chunk in message_ids.chunks(MAX_BOUND_PARAMS) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT j.{j_message}, a.{rowid}, a.{filename}, a.{mime}, a.{transfer}, a.{bytes} \
                 FROM {join} j JOIN {table} a ON a.{rowid} = j.{j_attachment} \
                 WHERE j.{j_message} IN ({placeholders}) \
                 ORDER BY j.{j_message}, a.{rowid}",
                j_message = message_attachment_join::MESSAGE_ID,
                j_attachment = message_attachment_join::ATTACHMENT_ID,
                join = message_attachment_join::TABLE,
                table = attachment::TABLE,
                rowid = attachment::ROWID,
                filename = attachment::FILENAME,
                mime = attachment::MIME_TYPE,
                transfer = attachment::TRANSFER_NAME,
                bytes = attachment::TOTAL_BYTES,
            );

            let mut stmt = conn.prepare(&sql)?;
            let row_iter = stmt.query_map(params_from_iter(chunk.iter()), map_attachment_row)?;
            for row in row_iter {
                let row = row?;
                let message_id = row.message_id;
                let resolved = row.resolve();
                if !resolved.exists {
                    debug!(message_id, attachment_id = resolved.id, "Attachment file not on disk");
                }
                by_message.entry(message_id).or_default().push(resolved);
            }
        }

        Ok(by_message)
    }

    /// Run a message query and its attachment query against one snapshot.
    fn run(&self, operation: &'static str, query: &MessageQuery) -> Result<Vec<Message>> {
        // Without an explicit transaction boundary each statement reads its own
        // snapshot, and the connection can keep an old one while Messages
        // appends to the file.
        let tx = self.conn.unchecked_transaction()?;
        let timer = OperationTimer::new(operation);
        let messages = Self::fetch_messages(&tx, query).inspect_err(|_| metrics::record_error("database"))?;
        tx.commit()?;
        timer.finish(messages.len());
        Ok(messages)
    }
}

impl MessageRepository for Archive {
    fn recent(&self, limit: usize) -> Result<Vec<Message>> {
        let mut query = MessageQuery::new(Order::NewestFirst);
        query.limit = Some(limit);
        self.run("recent", &query)
    }

    /// Matches the plain `text` column only. Bodies that exist solely in
    /// `attributedBody` are not searched.
    fn search(&self, term: &str, limit: usize) -> Result<Vec<Message>> {
        let mut query = MessageQuery::new(Order::NewestFirst);
        query.push(
            format!("m.{} LIKE ? ESCAPE '\\'", message::TEXT),
            format!("%{}%", escape_like(term)),
        );
        query.limit = Some(limit);
        self.run("search", &query)
    }

    fn history(&self, chat_id: i64, limit: usize, filter: &MessageFilter) -> Result<Vec<Message>> {
        let mut query = MessageQuery::new(Order::NewestFirst);
        query.chat_id = Some(chat_id);
        query.apply(filter);
        query.limit = Some(limit);
        self.run("history", &query)
    }

    fn list_conversations(&self, limit: Option<usize>) -> Result<Vec<Conversation>> {
        let timer = OperationTimer::new("list_conversations");
        let sql = format!(
            "SELECT c.{c_rowid}, c.{ident}, c.{name}, c.{service}, \
                    COUNT(m.{m_rowid}) AS message_count, MAX(m.{date}) AS last_date \
             FROM {chat} c \
             LEFT JOIN {cmj} cmj ON cmj.{cmj_chat} = c.{c_rowid} \
             LEFT JOIN {message} m ON m.{m_rowid} = cmj.{cmj_message} \
             GROUP BY c.{c_rowid} \
             ORDER BY last_date IS NULL, last_date DESC, c.{c_rowid} DESC \
             LIMIT ?",
            c_rowid = chat::ROWID,
            ident = chat::CHAT_IDENTIFIER,
            name = chat::DISPLAY_NAME,
            service = chat::SERVICE_NAME,
            m_rowid = message::ROWID,
            date = message::DATE,
            chat = chat::TABLE,
            cmj = chat_message_join::TABLE,
            cmj_chat = chat_message_join::CHAT_ID,
            cmj_message = chat_message_join::MESSAGE_ID,
            message = message::TABLE,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let conversations = stmt
            .query_map(params![sql_limit(limit)], |row| {
                Ok(Conversation {
                    id: row.get(0)?,
                    identifier: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    display_name: row.get::<_, Option<String>>(2)?.filter(|name| !name.is_empty()),
                    service: row.get(3)?,
                    message_count: row.get(4)?,
                    last_message_at: row.get::<_, Option<i64>>(5)?.map(timestamp::to_absolute),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .inspect_err(|_| metrics::record_error("database"))?;

        timer.finish(conversations.len());
        Ok(conversations)
    }

    fn max_rowid(&self) -> Result<i64> {
        let max = self.conn.query_row(
            &format!("SELECT COALESCE(MAX({}), 0) FROM {}", message::ROWID, message::TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn messages_after(&self, watermark: i64, chat_id: Option<i64>, filter: &MessageFilter) -> Result<Vec<Message>> {
        let mut query = MessageQuery::new(Order::ArrivalOrder);
        query.push(format!("m.{} > ?", message::ROWID), watermark);
        query.chat_id = chat_id;
        query.apply(filter);
        self.run("messages_after", &query)
    }
}

#[derive(Debug, Clone, Copy)]
enum Order {
    NewestFirst,
    ArrivalOrder,
}

/// WHERE clauses and bound values for a message query
///
/// Produces exactly one row per message, so `LIMIT` counts messages. With
/// `chat_id` set the row carries that chat; otherwise it carries the lowest
/// chat the message is filed under.
struct MessageQuery {
    chat_id: Option<i64>,
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
    order: Order,
    limit: Option<usize>,
}

impl MessageQuery {
    fn new(order: Order) -> Self {
        Self {
            chat_id: None,
            clauses: Vec::new(),
            params: Vec::new(),
            order,
            limit: None,
        }
    }

    /// Values in placeholder order: the chat join first, then the WHERE clauses.
    fn bound(&self) -> Vec<&dyn ToSql> {
        let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(self.params.len() + 1);
        if let Some(chat_id) = &self.chat_id {
            bound.push(chat_id);
        }
        bound.extend(self.params.iter().map(|param| &**param));
        bound
    }

    /// Join yielding at most one chat per message.
    fn chat_join(&self) -> String {
        match self.chat_id {
            Some(_) => format!(
                "JOIN {cmj} cmj ON cmj.{cmj_message} = m.{rowid} AND cmj.{cmj_chat} = ?",
                cmj = chat_message_join::TABLE,
                cmj_message = chat_message_join::MESSAGE_ID,
                cmj_chat = chat_message_join::CHAT_ID,
                rowid = message::ROWID,
            ),
            None => format!(
                "LEFT JOIN (SELECT {cmj_message}, MIN({cmj_chat}) AS {cmj_chat} FROM {cmj} GROUP BY {cmj_message}) cmj \
                 ON cmj.{cmj_message} = m.{rowid}",
                cmj = chat_message_join::TABLE,
                cmj_message = chat_message_join::MESSAGE_ID,
                cmj_chat = chat_message_join::CHAT_ID,
                rowid = message::ROWID,
            ),
        }
    }

    fn push(&mut self, clause: String, value: impl ToSql + 'static) {
        self.clauses.push(clause);
        self.params.push(Box::new(value));
    }

    fn apply(&mut self, filter: &MessageFilter) {
        if !filter.participants.is_empty() {
            let placeholders = vec!["?"; filter.participants.len()].join(", ");
            self.clauses.push(format!("h.{} IN ({placeholders})", handle::ID));
            for participant in &filter.participants {
                self.params.push(Box::new(participant.clone()));
            }
        }

        if let Some(start) = filter.start {
            self.push(format!("m.{} >= ?", message::DATE), timestamp::from_absolute(start));
        }
        if let Some(end) = filter.end {
            self.push(format!("m.{} < ?", message::DATE), timestamp::from_absolute(end));
        }
    }

    fn sql(&self) -> String {
        let mut sql = format!(
            "SELECT m.{rowid}, m.{guid}, m.{text}, m.{body}, m.{date}, m.{from_me}, m.{service}, m.{handle_id}, \
                    h.{handle}, c.{c_rowid}, c.{ident}, c.{name} \
             FROM {message} m \
             LEFT JOIN {handle_table} h ON h.{h_rowid} = m.{handle_id} \
             {chat_join} \
             LEFT JOIN {chat} c ON c.{c_rowid} = cmj.{cmj_chat}",
            rowid = message::ROWID,
            guid = message::GUID,
            text = message::TEXT,
            body = message::ATTRIBUTED_BODY,
            date = message::DATE,
            from_me = message::IS_FROM_ME,
            service = message::SERVICE,
            handle_id = message::HANDLE_ID,
            handle = handle::ID,
            c_rowid = chat::ROWID,
            ident = chat::CHAT_IDENTIFIER,
            name = chat::DISPLAY_NAME,
            message = message::TABLE,
            handle_table = handle::TABLE,
            h_rowid = handle::ROWID,
            chat_join = self.chat_join(),
            cmj_chat = chat_message_join::CHAT_ID,
            chat = chat::TABLE,
        );

        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }

        match self.order {
            Order::NewestFirst => {
                sql.push_str(&format!(" ORDER BY m.{} DESC, m.{} DESC", message::DATE, message::ROWID));
            },
            Order::ArrivalOrder => sql.push_str(&format!(" ORDER BY m.{} ASC", message::ROWID)),
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", sql_limit(Some(limit))));
        }
        sql
    }
}

fn map_message_row(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        rowid: row.get(0)?,
        guid: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        text: row.get(2)?,
        attributed_body: row.get(3)?,
        date: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
        is_from_me: row.get::<_, Option<bool>>(5)?.unwrap_or_default(),
        service: row.get(6)?,
        // 0 is how the archive spells "no handle"
        handle_id: row.get::<_, Option<i64>>(7)?.filter(|&id| id != 0),
        sender: row.get(8)?,
        chat_id: row.get(9)?,
        chat_identifier: row.get(10)?,
        chat_name: row.get::<_, Option<String>>(11)?.filter(|name| !name.is_empty()),
    })
}

fn map_attachment_row(row: &Row) -> rusqlite::Result<AttachmentRow> {
    Ok(AttachmentRow {
        message_id: row.get(0)?,
        id: row.get(1)?,
        filename: row.get(2)?,
        mime_type: row.get(3)?,
        transfer_name: row.get(4)?,
        total_bytes: row.get(5)?,
    })
}

/// SQLite treats a negative LIMIT as "no limit".
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

/// Escape `LIKE` wildcards so the term matches literally (escape char `\`).
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
