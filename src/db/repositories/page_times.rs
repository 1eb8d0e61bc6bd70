use anyhow::Result;
use chrono::Utc;
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{parse_document, to_i64, to_u32, to_u64},
    models::PageTimeRecord,
};

impl Database {
    pub async fn insert_page_time(&self, record: &PageTimeRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO page_times (session_id, document_kind, document_id, page_number, duration_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.session_id,
                    record.document.kind_str(),
                    record.document.id(),
                    record.page_number,
                    to_i64(record.duration_ms)?,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Page visits of a session in the order they were recorded.
    pub async fn get_page_times_for_session(&self, session_id: &str) -> Result<Vec<PageTimeRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, document_kind, document_id, page_number, duration_ms
                 FROM page_times
                 WHERE session_id = ?1
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let kind: String = row.get(1)?;
                records.push(PageTimeRecord {
                    session_id: row.get(0)?,
                    document: parse_document(&kind, row.get(2)?)?,
                    page_number: to_u32(row.get(3)?, "page_number")?,
                    duration_ms: to_u64(row.get(4)?, "duration_ms")?,
                });
            }
            Ok(records)
        })
        .await
    }
}
