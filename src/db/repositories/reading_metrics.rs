use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u64},
    models::{MetricSample, MetricSubject, ReadingMetric},
};

/// Add a session's pages and time to the subject's cumulative totals and
/// recompute the pooled averages. Totals only ever grow.
pub(crate) fn apply_metric_sample(
    conn: &Connection,
    subject: MetricSubject,
    sample: &MetricSample,
    calculated_at: DateTime<Utc>,
) -> Result<()> {
    let Some((kind, subject_id)) = subject.columns() else {
        bail!("the user-wide reading metric is derived and cannot be updated directly");
    };

    let existing: Option<(i64, i64)> = conn
        .query_row(
            "SELECT total_pages_read, total_time_ms FROM reading_metrics
             WHERE subject_kind = ?1 AND subject_id = ?2",
            params![kind, subject_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (prev_pages, prev_ms) = match existing {
        Some((pages, ms)) => (to_u64(pages, "total_pages_read")?, to_u64(ms, "total_time_ms")?),
        None => (0, 0),
    };
    let total_pages = prev_pages.saturating_add(sample.pages_read);
    let total_ms = prev_ms.saturating_add(sample.time_spent_ms);
    let (ppm, avg) = ReadingMetric::pooled(total_pages, total_ms);

    conn.execute(
        "INSERT INTO reading_metrics
            (subject_kind, subject_id, pages_per_minute, avg_seconds_per_page,
             total_pages_read, total_time_ms, last_calculated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (subject_kind, subject_id) DO UPDATE SET
            pages_per_minute = excluded.pages_per_minute,
            avg_seconds_per_page = excluded.avg_seconds_per_page,
            total_pages_read = excluded.total_pages_read,
            total_time_ms = excluded.total_time_ms,
            last_calculated = excluded.last_calculated",
        params![
            kind,
            subject_id,
            ppm,
            avg,
            to_i64(total_pages)?,
            to_i64(total_ms)?,
            calculated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn load_metric(conn: &Connection, subject: MetricSubject) -> Result<Option<ReadingMetric>> {
    match subject.columns() {
        Some((kind, subject_id)) => {
            let row = conn
                .query_row(
                    "SELECT pages_per_minute, avg_seconds_per_page, total_pages_read, total_time_ms, last_calculated
                     FROM reading_metrics
                     WHERE subject_kind = ?1 AND subject_id = ?2",
                    params![kind, subject_id],
                    |row| {
                        Ok((
                            row.get::<_, f64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()?;

            let Some((ppm, avg, pages, ms, calculated)) = row else {
                return Ok(None);
            };
            Ok(Some(ReadingMetric {
                subject,
                pages_per_minute: ppm,
                avg_seconds_per_page: avg,
                total_pages_read: to_u64(pages, "total_pages_read")?,
                total_time_ms: to_u64(ms, "total_time_ms")?,
                last_calculated: parse_datetime(&calculated, "last_calculated")?,
            }))
        }
        None => {
            // Pool document-level rows only; topic rows repeat the same sessions.
            let (rows, pages, ms, calculated): (i64, i64, i64, Option<String>) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(total_pages_read), 0),
                        COALESCE(SUM(total_time_ms), 0),
                        MAX(last_calculated)
                 FROM reading_metrics
                 WHERE subject_kind IN ('pdf', 'exercise') AND total_pages_read > 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

            let Some(calculated) = calculated.filter(|_| rows > 0) else {
                return Ok(None);
            };
            let total_pages = to_u64(pages, "total_pages_read")?;
            let total_ms = to_u64(ms, "total_time_ms")?;
            let (ppm, avg) = ReadingMetric::pooled(total_pages, total_ms);
            Ok(Some(ReadingMetric {
                subject,
                pages_per_minute: ppm,
                avg_seconds_per_page: avg,
                total_pages_read: total_pages,
                total_time_ms: total_ms,
                last_calculated: parse_datetime(&calculated, "last_calculated")?,
            }))
        }
    }
}

impl Database {
    pub async fn update_reading_metric(&self, subject: MetricSubject, sample: MetricSample) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            apply_metric_sample(&tx, subject, &sample, Utc::now())?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_reading_metric(&self, subject: MetricSubject) -> Result<Option<ReadingMetric>> {
        self.execute(move |conn| load_metric(conn, subject)).await
    }
}
