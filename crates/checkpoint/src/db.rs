//! `CheckpointDb` — the embedded, crash-safe log of every fetched
//! announcement and its per-stage progress (§4.1).
//!
//! `rusqlite::Connection` is not `Send`/`Sync`, so (mirroring the pack's
//! SQLite streaming backend) all I/O runs on a single dedicated blocking
//! thread; callers talk to it through an async channel of commands.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::CheckpointError;

/// One `announcements` row as scraped, before any checkpoint columns are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAnnouncementRow {
    pub news_id: String,
    pub scrip_cd: String,
    pub headline: String,
    pub raw_json: String,
}

/// A fully hydrated checkpoint row, as read back by the replayer.
#[derive(Debug, Clone)]
pub struct CheckpointRow {
    pub news_id: String,
    pub scrip_cd: String,
    pub headline: String,
    pub raw_json: String,
    pub fetched_at: DateTime<Utc>,
    pub downloaded_pdf_file: Option<String>,
    pub pdf_pages: Option<i64>,
    pub ai_processed: bool,
    pub ai_summary: Option<String>,
    pub ai_error: Option<String>,
    pub sent_to_supabase: bool,
}

/// Partial update applied to one `news_id`'s checkpoint row. Every field is
/// optional; only `Some` fields are written — columns advance monotonically,
/// never backwards.
#[derive(Debug, Clone, Default)]
pub struct CheckpointUpdate {
    pub downloaded_pdf_file: Option<String>,
    pub pdf_pages: Option<i64>,
    pub pdf_downloaded_at: Option<DateTime<Utc>>,
    pub ai_processed: Option<bool>,
    pub ai_summary: Option<String>,
    pub ai_error: Option<String>,
    pub ai_processed_at: Option<DateTime<Utc>>,
    pub sent_to_supabase: Option<bool>,
    pub sent_to_supabase_at: Option<DateTime<Utc>>,
}

enum Command {
    SaveRawFetch {
        rows: Vec<RawAnnouncementRow>,
        url: String,
        params: String,
        resp: oneshot::Sender<Result<bool, CheckpointError>>,
    },
    UpdateCheckpoint {
        news_id: String,
        update: CheckpointUpdate,
        resp: oneshot::Sender<Result<(), CheckpointError>>,
    },
    RowsNeedingWork {
        date: NaiveDate,
        limit: u32,
        resp: oneshot::Sender<Result<Vec<CheckpointRow>, CheckpointError>>,
    },
    RowExists {
        news_id: String,
        resp: oneshot::Sender<Result<bool, CheckpointError>>,
    },
}

/// Handle to the checkpoint DB's dedicated worker thread. Cheap to clone
/// (it's just an `mpsc::Sender`); every clone talks to the same connection.
#[derive(Clone)]
pub struct CheckpointDb {
    tx: mpsc::Sender<Command>,
}

impl CheckpointDb {
    /// Open (creating if absent) the SQLite file at `path`, enable WAL mode,
    /// and run the self-migrating schema guard. Spawns the worker thread.
    pub async fn open(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (tx, mut rx) = mpsc::channel::<Command>(256);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), CheckpointError>>();

        std::thread::spawn(move || {
            let conn = match open_and_migrate(&path, wal_mode) {
                Ok(conn) => conn,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    Command::SaveRawFetch { rows, url, params, resp } => {
                        let result = save_raw_fetch(&conn, &rows, &url, &params);
                        let _ = resp.send(result);
                    }
                    Command::UpdateCheckpoint { news_id, update, resp } => {
                        let result = update_checkpoint(&conn, &news_id, &update);
                        let _ = resp.send(result);
                    }
                    Command::RowsNeedingWork { date, limit, resp } => {
                        let result = rows_needing_work(&conn, date, limit);
                        let _ = resp.send(result);
                    }
                    Command::RowExists { news_id, resp } => {
                        let result = row_exists(&conn, &news_id);
                        let _ = resp.send(result);
                    }
                }
            }
        });

        ready_rx
            .await
            .map_err(|_| CheckpointError::WorkerGone("checkpoint worker exited before init".into()))??;

        Ok(Self { tx })
    }

    /// Insert one `raw_responses` row and one `announcements` row per item.
    /// Returns `true` on best-effort success; a duplicate `news_id` is logged
    /// and skipped without aborting the rest of the batch.
    pub async fn save_raw_fetch(
        &self,
        rows: Vec<RawAnnouncementRow>,
        url: impl Into<String>,
        params: impl Into<String>,
    ) -> Result<bool, CheckpointError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(Command::SaveRawFetch { rows, url: url.into(), params: params.into(), resp })
            .await
            .map_err(|_| CheckpointError::WorkerGone("checkpoint worker channel closed".into()))?;
        rx.await.map_err(|_| CheckpointError::WorkerGone("checkpoint worker dropped response".into()))?
    }

    pub async fn update_checkpoint(
        &self,
        news_id: impl Into<String>,
        update: CheckpointUpdate,
    ) -> Result<(), CheckpointError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(Command::UpdateCheckpoint { news_id: news_id.into(), update, resp })
            .await
            .map_err(|_| CheckpointError::WorkerGone("checkpoint worker channel closed".into()))?;
        rx.await.map_err(|_| CheckpointError::WorkerGone("checkpoint worker dropped response".into()))?
    }

    /// Rows on `date` where `ai_processed=0` or `sent_to_supabase=0`.
    pub async fn rows_needing_work(
        &self,
        date: NaiveDate,
        limit: u32,
    ) -> Result<Vec<CheckpointRow>, CheckpointError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(Command::RowsNeedingWork { date, limit, resp })
            .await
            .map_err(|_| CheckpointError::WorkerGone("checkpoint worker channel closed".into()))?;
        rx.await.map_err(|_| CheckpointError::WorkerGone("checkpoint worker dropped response".into()))?
    }

    pub async fn row_exists(&self, news_id: impl Into<String>) -> Result<bool, CheckpointError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(Command::RowExists { news_id: news_id.into(), resp })
            .await
            .map_err(|_| CheckpointError::WorkerGone("checkpoint worker channel closed".into()))?;
        rx.await.map_err(|_| CheckpointError::WorkerGone("checkpoint worker dropped response".into()))?
    }
}

const CHECKPOINT_COLUMNS: &[(&str, &str)] = &[
    ("downloaded_pdf_file", "TEXT"),
    ("pdf_pages", "INTEGER"),
    ("pdf_downloaded_at", "TEXT"),
    ("ai_processed", "INTEGER NOT NULL DEFAULT 0"),
    ("ai_summary", "TEXT"),
    ("ai_error", "TEXT"),
    ("ai_processed_at", "TEXT"),
    ("sent_to_supabase", "INTEGER NOT NULL DEFAULT 0"),
    ("sent_to_supabase_at", "TEXT"),
];

fn open_and_migrate(path: &Path, wal_mode: bool) -> Result<Connection, CheckpointError> {
    let conn = Connection::open(path)?;
    if wal_mode {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS raw_responses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fetched_at TEXT NOT NULL,
            url TEXT NOT NULL,
            params TEXT NOT NULL,
            raw_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS announcements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            news_id TEXT NOT NULL UNIQUE,
            scrip_cd TEXT NOT NULL,
            headline TEXT NOT NULL,
            fetched_at TEXT NOT NULL,
            raw_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_announcements_fetched_at ON announcements(fetched_at);
        "#,
    )?;

    // Self-migrating schema: probe existing columns, add any missing
    // checkpoint columns idempotently.
    let mut existing = std::collections::HashSet::new();
    {
        let mut stmt = conn.prepare("PRAGMA table_info(announcements)")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            existing.insert(name);
        }
    }
    for (col, decl) in CHECKPOINT_COLUMNS {
        if !existing.contains(*col) {
            conn.execute(&format!("ALTER TABLE announcements ADD COLUMN {col} {decl}"), [])?;
        }
    }

    Ok(conn)
}

fn save_raw_fetch(
    conn: &Connection,
    rows: &[RawAnnouncementRow],
    url: &str,
    params: &str,
) -> Result<bool, CheckpointError> {
    let now = Utc::now().to_rfc3339();
    let batch_json = serde_json::to_string(rows)?;
    conn.execute(
        "INSERT INTO raw_responses (fetched_at, url, params, raw_json) VALUES (?1, ?2, ?3, ?4)",
        params![now, url, params, batch_json],
    )?;

    for row in rows {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO announcements (news_id, scrip_cd, headline, fetched_at, raw_json) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![row.news_id, row.scrip_cd, row.headline, now, row.raw_json],
        )?;
        if inserted == 0 {
            tracing::debug!(news_id = %row.news_id, "duplicate news_id, skipped");
        }
    }

    Ok(true)
}

fn update_checkpoint(
    conn: &Connection,
    news_id: &str,
    update: &CheckpointUpdate,
) -> Result<(), CheckpointError> {
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    macro_rules! set_field {
        ($col:literal, $val:expr) => {
            if let Some(v) = $val {
                sets.push(format!("{} = ?", $col));
                values.push(Box::new(v.clone()));
            }
        };
    }

    set_field!("downloaded_pdf_file", &update.downloaded_pdf_file);
    set_field!("pdf_pages", &update.pdf_pages);
    if let Some(v) = &update.pdf_downloaded_at {
        sets.push("pdf_downloaded_at = ?".to_string());
        values.push(Box::new(v.to_rfc3339()));
    }
    if let Some(v) = update.ai_processed {
        sets.push("ai_processed = ?".to_string());
        values.push(Box::new(v as i64));
    }
    set_field!("ai_summary", &update.ai_summary);
    set_field!("ai_error", &update.ai_error);
    if let Some(v) = &update.ai_processed_at {
        sets.push("ai_processed_at = ?".to_string());
        values.push(Box::new(v.to_rfc3339()));
    }
    if let Some(v) = update.sent_to_supabase {
        sets.push("sent_to_supabase = ?".to_string());
        values.push(Box::new(v as i64));
    }
    if let Some(v) = &update.sent_to_supabase_at {
        sets.push("sent_to_supabase_at = ?".to_string());
        values.push(Box::new(v.to_rfc3339()));
    }

    if sets.is_empty() {
        return Ok(());
    }

    let sql = format!("UPDATE announcements SET {} WHERE news_id = ?", sets.join(", "));
    values.push(Box::new(news_id.to_string()));

    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
    conn.execute(&sql, param_refs.as_slice())?;
    Ok(())
}

fn rows_needing_work(
    conn: &Connection,
    date: NaiveDate,
    limit: u32,
) -> Result<Vec<CheckpointRow>, CheckpointError> {
    let day_start = format!("{}T00:00:00", date.format("%Y-%m-%d"));
    let day_end = format!("{}T23:59:59.999999", date.format("%Y-%m-%d"));

    let mut stmt = conn.prepare(
        "SELECT news_id, scrip_cd, headline, raw_json, fetched_at, downloaded_pdf_file, \
                pdf_pages, ai_processed, ai_summary, ai_error, sent_to_supabase \
         FROM announcements \
         WHERE fetched_at >= ?1 AND fetched_at <= ?2 \
           AND (ai_processed = 0 OR sent_to_supabase = 0) \
         ORDER BY fetched_at ASC LIMIT ?3",
    )?;

    let rows = stmt
        .query_map(params![day_start, day_end, limit], |row| {
            let fetched_at: String = row.get(4)?;
            Ok(CheckpointRow {
                news_id: row.get(0)?,
                scrip_cd: row.get(1)?,
                headline: row.get(2)?,
                raw_json: row.get(3)?,
                fetched_at: DateTime::parse_from_rfc3339(&fetched_at)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                downloaded_pdf_file: row.get(5)?,
                pdf_pages: row.get(6)?,
                ai_processed: row.get::<_, i64>(7)? != 0,
                ai_summary: row.get(8)?,
                ai_error: row.get(9)?,
                sent_to_supabase: row.get::<_, i64>(10)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn row_exists(conn: &Connection, news_id: &str) -> Result<bool, CheckpointError> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM announcements WHERE news_id = ?1",
            params![news_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_db() -> (tempfile::TempDir, CheckpointDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = CheckpointDb::open(dir.path().join("test.db"), true).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn duplicate_news_id_is_a_no_op_not_an_abort() {
        let (_dir, db) = temp_db().await;
        let row = RawAnnouncementRow {
            news_id: "N001".to_string(),
            scrip_cd: "500325".to_string(),
            headline: "Board Meeting Outcome".to_string(),
            raw_json: "{}".to_string(),
        };
        assert!(db.save_raw_fetch(vec![row.clone()], "https://x", "{}").await.unwrap());
        assert!(db.save_raw_fetch(vec![row], "https://x", "{}").await.unwrap());
        assert!(db.row_exists("N001").await.unwrap());
    }

    #[tokio::test]
    async fn checkpoint_columns_advance_monotonically_via_partial_update() {
        let (_dir, db) = temp_db().await;
        let row = RawAnnouncementRow {
            news_id: "N002".to_string(),
            scrip_cd: "1".to_string(),
            headline: "h".to_string(),
            raw_json: "{}".to_string(),
        };
        db.save_raw_fetch(vec![row], "https://x", "{}").await.unwrap();

        db.update_checkpoint(
            "N002",
            CheckpointUpdate { ai_processed: Some(true), ai_summary: Some("sum".into()), ..Default::default() },
        )
        .await
        .unwrap();

        let rows = db.rows_needing_work(Utc::now().date_naive(), 10).await.unwrap();
        // ai_processed=1 but sent_to_supabase still 0, so the row still needs work.
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ai_processed);
        assert_eq!(rows[0].ai_summary.as_deref(), Some("sum"));

        db.update_checkpoint(
            "N002",
            CheckpointUpdate { sent_to_supabase: Some(true), ..Default::default() },
        )
        .await
        .unwrap();
        let rows = db.rows_needing_work(Utc::now().date_naive(), 10).await.unwrap();
        assert!(rows.is_empty());
    }
}
