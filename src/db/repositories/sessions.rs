use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_date, parse_datetime, parse_document, parse_optional_datetime, parse_status,
        to_i64, to_u32, to_u64,
    },
    models::{
        efficiency_percent, DailyReadingStats, DocumentRef, MetricSubject, Session, SessionClose,
        SessionId, SessionRefs, SessionStatus, TopicId,
    },
    repositories::reading_metrics::apply_metric_sample,
};

const SESSION_COLUMNS: &str = "id, document_kind, document_id, topic_id, status, started_at, ended_at,
     total_ms, active_ms, idle_ms, pages_visited, reading_speed_ppm, efficiency_percent,
     created_at, updated_at";

const HISTORY_LIMIT: i64 = 50;

fn row_to_session(row: &Row) -> Result<Session> {
    let document_kind: String = row.get("document_kind")?;
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let status: String = row.get("status")?;

    Ok(Session {
        id: row.get("id")?,
        document: parse_document(&document_kind, row.get("document_id")?)?,
        topic_id: row.get("topic_id")?,
        status: parse_status(&status)?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        total_ms: to_u64(row.get("total_ms")?, "total_ms")?,
        active_ms: to_u64(row.get("active_ms")?, "active_ms")?,
        idle_ms: to_u64(row.get("idle_ms")?, "idle_ms")?,
        pages_visited: to_u32(row.get("pages_visited")?, "pages_visited")?,
        reading_speed_ppm: row.get("reading_speed_ppm")?,
        efficiency_percent: row.get("efficiency_percent")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_session(
        &self,
        session_id: SessionId,
        document: DocumentRef,
        topic_id: Option<TopicId>,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, document_kind, document_id, topic_id, status, started_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session_id,
                    document.kind_str(),
                    document.id(),
                    topic_id,
                    SessionStatus::Running.as_str(),
                    started_at.to_rfc3339(),
                    started_at.to_rfc3339(),
                    started_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Close a session and fold its reading-speed sample into the document and
    /// topic metrics. Everything commits together or not at all.
    pub async fn close_session(&self, close: SessionClose) -> Result<SessionRefs> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let refs = tx
                .query_row(
                    "SELECT document_kind, document_id, topic_id FROM sessions WHERE id = ?1",
                    params![close.session_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, Option<i64>>(2)?,
                        ))
                    },
                )
                .optional()?
                .ok_or_else(|| anyhow!("Session {} not found", close.session_id))?;

            let refs = SessionRefs {
                document: parse_document(&refs.0, refs.1)?,
                topic_id: refs.2,
            };

            let ppm = close.metric.map(|m| m.pages_per_minute).unwrap_or(0.0);
            tx.execute(
                "UPDATE sessions
                 SET status = ?1,
                     ended_at = ?2,
                     total_ms = ?3,
                     active_ms = ?4,
                     idle_ms = ?5,
                     pages_visited = ?6,
                     reading_speed_ppm = ?7,
                     efficiency_percent = ?8,
                     updated_at = ?9
                 WHERE id = ?10",
                params![
                    SessionStatus::Completed.as_str(),
                    close.ended_at.to_rfc3339(),
                    to_i64(close.total_ms)?,
                    to_i64(close.active_ms)?,
                    to_i64(close.idle_ms)?,
                    close.pages_visited,
                    ppm,
                    efficiency_percent(close.total_ms, close.active_ms),
                    close.ended_at.to_rfc3339(),
                    close.session_id,
                ],
            )?;

            if let Some(sample) = close.metric {
                apply_metric_sample(&tx, MetricSubject::Document(refs.document), &sample, close.ended_at)?;
                if let Some(topic_id) = refs.topic_id {
                    apply_metric_sample(&tx, MetricSubject::Topic(topic_id), &sample, close.ended_at)?;
                }
            }

            tx.commit()?;
            Ok(refs)
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![session_id])?;
            let session = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(session)
        })
        .await
    }

    pub async fn get_incomplete_sessions(&self) -> Result<Vec<Session>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status = 'Running'
                 ORDER BY started_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    pub async fn mark_session_interrupted(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     ended_at = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    SessionStatus::Interrupted.as_str(),
                    ended_at.to_rfc3339(),
                    ended_at.to_rfc3339(),
                    session_id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Finished sessions started within the last `days` days, newest first.
    pub async fn list_session_history(
        &self,
        days: u32,
        document: Option<DocumentRef>,
    ) -> Result<Vec<Session>> {
        let since = (Utc::now() - Duration::days(days as i64)).to_rfc3339();
        self.execute(move |conn| {
            let mut sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE started_at >= ?1 AND ended_at IS NOT NULL"
            );
            if document.is_some() {
                sql.push_str(" AND document_kind = ?3 AND document_id = ?4");
            }
            sql.push_str(" ORDER BY started_at DESC LIMIT ?2");

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = match document {
                Some(document) => stmt.query(params![since, HISTORY_LIMIT, document.kind_str(), document.id()])?,
                None => stmt.query(params![since, HISTORY_LIMIT])?,
            };

            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    /// Totals over the finished sessions that started on `date` (UTC calendar day).
    pub async fn get_daily_reading_stats(&self, date: NaiveDate) -> Result<Option<DailyReadingStats>> {
        let day_prefix = format!("{}%", format_date(date));
        self.execute(move |conn| {
            let (count, total_ms, active_ms, pages, ppm): (i64, i64, i64, i64, f64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(total_ms), 0),
                        COALESCE(SUM(active_ms), 0),
                        COALESCE(SUM(pages_visited), 0),
                        COALESCE(AVG(reading_speed_ppm), 0.0)
                 FROM sessions
                 WHERE ended_at IS NOT NULL AND started_at LIKE ?1",
                params![day_prefix],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;

            if count == 0 {
                return Ok(None);
            }

            Ok(Some(DailyReadingStats {
                date,
                sessions_count: to_u32(count, "sessions_count")?,
                total_ms: to_u64(total_ms, "total_ms")?,
                active_ms: to_u64(active_ms, "active_ms")?,
                pages_read: to_u64(pages, "pages_visited")?,
                avg_reading_speed_ppm: ppm,
            }))
        })
        .await
    }
}
