use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use rollcall_core::{FaceTemplate, Ledger, MarkOutcome, UserId};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use crate::error::StoreError;

/// A registered user. Created once; never mutated or deleted.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub roll_number: String,
    pub name: String,
    pub created_at: String,
}

/// Attendance status. Only `Present` is ever written; absence is the
/// absence of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Present,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        "Present"
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Present" => Ok(Status::Present),
            other => Err(FromSqlError::Other(
                format!("unknown attendance status: {other}").into(),
            )),
        }
    }
}

/// One attendance mark: a user was present on a date.
#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: Status,
    pub created_at: String,
}

/// A ledger row joined with its user, ready for export.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub roll_number: String,
    pub name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: Status,
}

/// Result of rebuilding the template gallery from stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainSummary {
    pub users: usize,
    pub samples: usize,
}

/// SQLite-backed identity store, attendance ledger, and face-data store.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened attendance database");
        Self::init(conn)
    }

    /// In-memory database, used by tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS users (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              roll_number TEXT NOT NULL UNIQUE,
              name TEXT NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS attendance (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              user_id INTEGER NOT NULL REFERENCES users(id),
              date TEXT NOT NULL,
              time TEXT NOT NULL,
              status TEXT NOT NULL DEFAULT 'Present',
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              UNIQUE(user_id, date)
            );

            CREATE TABLE IF NOT EXISTS face_samples (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              user_id INTEGER NOT NULL REFERENCES users(id),
              features TEXT NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS face_templates (
              user_id INTEGER PRIMARY KEY REFERENCES users(id),
              features TEXT NOT NULL,
              trained_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    // --- Identity store ---

    /// Register a user. Roll numbers are unique and immutable.
    pub fn add_user(&self, roll_number: &str, name: &str) -> Result<UserId, StoreError> {
        match self.conn.execute(
            "INSERT INTO users (roll_number, name) VALUES (?1, ?2)",
            params![roll_number, name],
        ) {
            Ok(_) => {
                let id = self.conn.last_insert_rowid();
                tracing::info!(id, roll_number, name, "user registered");
                Ok(id)
            }
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::DuplicateIdentity(roll_number.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let user = self
            .conn
            .query_row(
                "SELECT id, roll_number, name, created_at FROM users WHERE id = ?1",
                params![id],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn user_by_roll(&self, roll_number: &str) -> Result<Option<User>, StoreError> {
        let user = self
            .conn
            .query_row(
                "SELECT id, roll_number, name, created_at FROM users WHERE roll_number = ?1",
                params![roll_number],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    /// All users in insertion order.
    pub fn users(&self) -> Result<Vec<User>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, roll_number, name, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], map_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // --- Attendance ledger ---

    /// Attempt to insert the one record for `(user_id, date)`.
    ///
    /// A single atomic `INSERT OR IGNORE`: when the uniqueness constraint
    /// rejects the row, the outcome is `AlreadyMarked` and the stored
    /// record is unchanged. Safe under concurrent callers — exactly one
    /// gets `Created`.
    pub fn mark_present(
        &self,
        user_id: UserId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<MarkOutcome, StoreError> {
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO attendance (user_id, date, time) VALUES (?1, ?2, ?3)",
                params![user_id, date, time],
            )
            .map_err(|err| {
                if is_fk_violation(&err) {
                    StoreError::ForeignKey(user_id)
                } else {
                    err.into()
                }
            })?;
        Ok(if changed == 0 {
            MarkOutcome::AlreadyMarked
        } else {
            MarkOutcome::Created
        })
    }

    pub fn records_for_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, date, time, status, created_at
             FROM attendance WHERE date = ?1 ORDER BY time",
        )?;
        let records = stmt
            .query_map(params![date], map_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn records_for_user(&self, user_id: UserId) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, date, time, status, created_at
             FROM attendance WHERE user_id = ?1 ORDER BY date",
        )?;
        let records = stmt
            .query_map(params![user_id], map_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn all_records(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, date, time, status, created_at
             FROM attendance ORDER BY date DESC, time DESC",
        )?;
        let records = stmt
            .query_map([], map_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Total days present for a user.
    pub fn attendance_count(&self, user_id: UserId) -> Result<i64, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // --- Report rows (ledger joined with users) ---

    pub fn report_rows_for_date(&self, date: NaiveDate) -> Result<Vec<ReportRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.roll_number, u.name, a.date, a.time, a.status
             FROM attendance a JOIN users u ON a.user_id = u.id
             WHERE a.date = ?1 ORDER BY a.time",
        )?;
        let rows = stmt
            .query_map(params![date], map_report_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn report_rows_all(&self) -> Result<Vec<ReportRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.roll_number, u.name, a.date, a.time, a.status
             FROM attendance a JOIN users u ON a.user_id = u.id
             ORDER BY a.date DESC, a.time DESC",
        )?;
        let rows = stmt
            .query_map([], map_report_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn report_rows_for_user(&self, user_id: UserId) -> Result<Vec<ReportRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.roll_number, u.name, a.date, a.time, a.status
             FROM attendance a JOIN users u ON a.user_id = u.id
             WHERE a.user_id = ?1 ORDER BY a.date DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id], map_report_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- Face samples and templates ---

    /// Store one enrolled feature vector for a user.
    pub fn add_face_sample(&self, user_id: UserId, features: &[f32]) -> Result<(), StoreError> {
        let json = serde_json::to_string(features)
            .map_err(|source| StoreError::Features { user_id, source })?;
        self.conn
            .execute(
                "INSERT INTO face_samples (user_id, features) VALUES (?1, ?2)",
                params![user_id, json],
            )
            .map_err(|err| {
                if is_fk_violation(&err) {
                    StoreError::ForeignKey(user_id)
                } else {
                    err.into()
                }
            })?;
        Ok(())
    }

    pub fn sample_count(&self, user_id: UserId) -> Result<i64, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM face_samples WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Rebuild the template gallery: one mean feature vector per user with
    /// at least one stored sample. Replaces all previous templates.
    pub fn rebuild_templates(&mut self) -> Result<TrainSummary, StoreError> {
        let mut by_user: BTreeMap<UserId, Vec<Vec<f32>>> = BTreeMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT user_id, features FROM face_samples ORDER BY user_id, id")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, UserId>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (user_id, json) = row?;
                let features: Vec<f32> = serde_json::from_str(&json)
                    .map_err(|source| StoreError::Features { user_id, source })?;
                by_user.entry(user_id).or_default().push(features);
            }
        }

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM face_templates", [])?;
        let mut samples = 0;
        for (user_id, vectors) in &by_user {
            samples += vectors.len();
            let mean = mean_features(vectors);
            let json = serde_json::to_string(&mean).map_err(|source| StoreError::Features {
                user_id: *user_id,
                source,
            })?;
            tx.execute(
                "INSERT INTO face_templates (user_id, features) VALUES (?1, ?2)",
                params![user_id, json],
            )?;
        }
        tx.commit()?;

        let summary = TrainSummary {
            users: by_user.len(),
            samples,
        };
        tracing::info!(users = summary.users, samples = summary.samples, "templates rebuilt");
        Ok(summary)
    }

    /// Load the trained gallery for a recognition session.
    pub fn load_templates(&self) -> Result<Vec<FaceTemplate>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, features FROM face_templates ORDER BY user_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, UserId>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut templates = Vec::new();
        for row in rows {
            let (user_id, json) = row?;
            let features = serde_json::from_str(&json)
                .map_err(|source| StoreError::Features { user_id, source })?;
            templates.push(FaceTemplate { user_id, features });
        }
        Ok(templates)
    }
}

impl Ledger for Database {
    type Error = StoreError;

    fn mark_present(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<MarkOutcome, StoreError> {
        Database::mark_present(self, user_id, date, time)
    }
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        roll_number: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        time: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        roll_number: row.get(0)?,
        name: row.get(1)?,
        date: row.get(2)?,
        time: row.get(3)?,
        status: row.get(4)?,
    })
}

/// Element-wise mean of equally shaped vectors. Vectors with a different
/// length than the first are skipped with a warning.
fn mean_features(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut sum = vec![0f32; first.len()];
    let mut count = 0usize;
    for v in vectors {
        if v.len() != first.len() {
            tracing::warn!(
                expected = first.len(),
                actual = v.len(),
                "skipping sample with mismatched feature length"
            );
            continue;
        }
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += x;
        }
        count += 1;
    }
    for acc in sum.iter_mut() {
        *acc /= count as f32;
    }
    sum
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn is_fk_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}
