//! App visit history

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub app_id: String,
    pub url: String,
    pub visited_at: DateTime<Utc>,
    pub visit_count: i32,
}

pub struct HistoryRepository {
    db: Database,
}

impl HistoryRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a visit, bumping the count if the app/url pair was seen before
    pub fn record_visit(&self, app_id: &str, url: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        self.db.with_transaction(|tx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM history WHERE app_id = ?1 AND url = ?2",
                    [app_id, url],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(id) = existing {
                tx.execute(
                    "UPDATE history SET visited_at = ?1, visit_count = visit_count + 1
                     WHERE id = ?2",
                    rusqlite::params![now, id],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO history (app_id, url, visited_at, visit_count)
                     VALUES (?1, ?2, ?3, 1)",
                    rusqlite::params![app_id, url, now],
                )?;
            }

            Ok(())
        })?;

        tracing::debug!(app_id = %app_id, url = %url, "Recorded visit");

        Ok(())
    }

    /// Most recent visits across all apps
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, app_id, url, visited_at, visit_count FROM history
                 ORDER BY visited_at DESC, id DESC
                 LIMIT ?1",
            )?;

            let entries = stmt
                .query_map([limit as i64], entry_from_row)?
                .filter_map(|r| r.ok())
                .collect();

            Ok(entries)
        })
    }

    pub fn for_app(&self, app_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, app_id, url, visited_at, visit_count FROM history
                 WHERE app_id = ?1
                 ORDER BY visited_at DESC, id DESC
                 LIMIT ?2",
            )?;

            let entries = stmt
                .query_map(rusqlite::params![app_id, limit as i64], entry_from_row)?
                .filter_map(|r| r.ok())
                .collect();

            Ok(entries)
        })
    }

    pub fn clear(&self) -> Result<usize> {
        let removed = self
            .db
            .with_connection(|conn| Ok(conn.execute("DELETE FROM history", [])?))?;

        tracing::info!(removed, "Cleared history");

        Ok(removed)
    }
}

impl Clone for HistoryRepository {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let visited_str: String = row.get(3)?;
    let visited_at = DateTime::parse_from_rfc3339(&visited_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(HistoryEntry {
        id: row.get(0)?,
        app_id: row.get(1)?,
        url: row.get(2)?,
        visited_at,
        visit_count: row.get(4)?,
    })
}
