use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result, Row};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::models::{Document, DocumentChanges, DocumentFilter, NewDocumentRow, User};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const DOCUMENT_COLUMNS: &str = "id, category_id, doc_type_id, subtype_id, doc_date, \
     party_main_account, party_sub_account, file_path, file_name, uploaded_by, \
     uploaded_date, modified_by, modified_date, remarks";

const USER_COLUMNS: &str = "id, username, password, fullname, email, phone_number";

/// Fixed-width UTC text, so string comparison in SQL is chronological.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn decode_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|naive| naive.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).expect("valid time of day");
    date.and_time(last).and_utc()
}

fn user_from_row(row: &Row) -> Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        fullname: row.get(3)?,
        email: row.get(4)?,
        phone_number: row.get(5)?,
    })
}

fn document_from_row(row: &Row) -> Result<Document> {
    let modified_date = match row.get::<_, Option<String>>(12)? {
        Some(raw) => Some(decode_timestamp(12, &raw)?),
        None => None,
    };

    Ok(Document {
        id: row.get(0)?,
        category_id: row.get(1)?,
        doc_type_id: row.get(2)?,
        subtype_id: row.get(3)?,
        doc_date: row.get(4)?,
        party_main_account: row.get(5)?,
        party_sub_account: row.get(6)?,
        file_path: row.get(7)?,
        file_name: row.get(8)?,
        uploaded_by: row.get(9)?,
        uploaded_date: decode_timestamp(10, &row.get::<_, String>(10)?)?,
        modified_by: row.get(11)?,
        modified_date,
        remarks: row.get(13)?,
    })
}

/// Shared handle to the SQLite store.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        // Bundled SQLite enforces foreign keys by default; owners are not
        // required to have a user row.
        conn.execute_batch(
            "PRAGMA foreign_keys = OFF;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                fullname TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone_number TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER NOT NULL,
                doc_type_id INTEGER NOT NULL,
                subtype_id INTEGER NOT NULL,
                doc_date TEXT NOT NULL,
                party_main_account TEXT NOT NULL,
                party_sub_account TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_name TEXT NOT NULL,
                uploaded_by INTEGER NOT NULL,
                uploaded_date TEXT NOT NULL,
                modified_by INTEGER,
                modified_date TEXT,
                remarks TEXT,
                FOREIGN KEY (uploaded_by) REFERENCES users (id),
                FOREIGN KEY (modified_by) REFERENCES users (id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_uploaded_by ON documents (uploaded_by);",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens a unit of work. It holds the connection until committed or
    /// dropped; a dropped session rolls back.
    pub async fn begin(&self) -> Result<Session<'_>> {
        let conn = self.conn.lock().await;
        conn.execute_batch("BEGIN")?;
        Ok(Session {
            conn,
            finished: false,
        })
    }
}

pub struct Session<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Session<'_> {
    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    pub fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        fullname: &str,
        email: &str,
        phone_number: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO users (username, password, fullname, email, phone_number) VALUES (?, ?, ?, ?, ?)",
            params![username, password_hash, fullname, email, phone_number],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                [id],
                user_from_row,
            )
            .optional()
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
                [email],
                user_from_row,
            )
            .optional()
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"),
                [username],
                user_from_row,
            )
            .optional()
    }

    pub fn insert_document(&self, row: &NewDocumentRow<'_>) -> Result<i64> {
        let uploaded = encode_timestamp(&row.uploaded_date);
        self.conn.execute(
            "INSERT INTO documents (category_id, doc_type_id, subtype_id, doc_date, \
             party_main_account, party_sub_account, file_path, file_name, uploaded_by, \
             uploaded_date, modified_by, modified_date, remarks) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                row.category_id,
                row.doc_type_id,
                row.subtype_id,
                row.doc_date,
                row.party_main_account,
                row.party_sub_account,
                row.file_path,
                row.file_name,
                row.uploaded_by,
                uploaded,
                row.uploaded_by,
                uploaded,
                row.remarks,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn document(&self, id: i64) -> Result<Option<Document>> {
        self.conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"),
                [id],
                document_from_row,
            )
            .optional()
    }

    pub fn owned_document(&self, id: i64, owner: i64) -> Result<Option<Document>> {
        self.conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ? AND uploaded_by = ?"),
                [id, owner],
                document_from_row,
            )
            .optional()
    }

    /// Documents owned by `owner`, narrowed by whichever filter fields are set.
    /// Date bounds apply to `modified_date` and are inclusive of whole days.
    pub fn documents_by_owner(&self, owner: i64, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let mut sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE uploaded_by = ?");
        let mut values = vec![Value::Integer(owner)];

        if let Some(category_id) = filter.category_id {
            sql.push_str(" AND category_id = ?");
            values.push(Value::Integer(category_id));
        }
        if let Some(doc_type_id) = filter.doc_type_id {
            sql.push_str(" AND doc_type_id = ?");
            values.push(Value::Integer(doc_type_id));
        }
        if let Some(from) = filter.from_date {
            sql.push_str(" AND modified_date >= ?");
            values.push(Value::Text(encode_timestamp(&start_of_day(from))));
        }
        if let Some(to) = filter.to_date {
            sql.push_str(" AND modified_date <= ?");
            values.push(Value::Text(encode_timestamp(&end_of_day(to))));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let docs = stmt
            .query_map(params_from_iter(values), document_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(docs)
    }

    pub fn update_document(
        &self,
        id: i64,
        changes: &DocumentChanges,
        modified_date: DateTime<Utc>,
    ) -> Result<usize> {
        self.conn.execute(
            "UPDATE documents SET category_id = ?, doc_type_id = ?, subtype_id = ?, doc_date = ?, \
             party_main_account = ?, party_sub_account = ?, modified_by = ?, modified_date = ?, \
             remarks = ? WHERE id = ?",
            params![
                changes.category_id,
                changes.doc_type_id,
                changes.subtype_id,
                changes.doc_date,
                changes.party_main_account,
                changes.party_sub_account,
                changes.modified_by,
                encode_timestamp(&modified_date),
                changes.remarks,
                id,
            ],
        )
    }

    pub fn delete_document(&self, id: i64) -> Result<usize> {
        self.conn.execute("DELETE FROM documents WHERE id = ?", [id])
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Rollback failed: {}", e);
            }
        }
    }
}
