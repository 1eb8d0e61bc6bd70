use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::params;

use crate::db::{connection::Database, helpers::format_date};

/// Rows removed by a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub page_times: usize,
    pub sessions: usize,
    pub goal_progress: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.page_times + self.sessions + self.goal_progress
    }
}

impl Database {
    /// Delete sessions (and their page times) started more than `days` ago, and
    /// old progress rows of goals that are no longer being pursued. Open
    /// sessions are never touched.
    pub async fn cleanup_old_data(&self, days: u32) -> Result<CleanupReport> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        let cutoff_ts = cutoff.to_rfc3339();
        let cutoff_date = format_date(cutoff.date_naive());

        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let page_times = tx.execute(
                "DELETE FROM page_times
                 WHERE session_id IN (
                     SELECT id FROM sessions WHERE started_at < ?1 AND ended_at IS NOT NULL
                 )",
                params![cutoff_ts],
            )?;

            let sessions = tx.execute(
                "DELETE FROM sessions WHERE started_at < ?1 AND ended_at IS NOT NULL",
                params![cutoff_ts],
            )?;

            let goal_progress = tx.execute(
                "DELETE FROM goal_progress
                 WHERE date < ?1
                 AND goal_id IN (SELECT id FROM goals WHERE is_completed = 1 OR is_active = 0)",
                params![cutoff_date],
            )?;

            tx.commit()?;
            Ok(CleanupReport {
                page_times,
                sessions,
                goal_progress,
            })
        })
        .await
    }
}
