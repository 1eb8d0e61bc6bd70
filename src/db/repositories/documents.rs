use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::{to_i64, to_u32, to_u64},
    models::{DocumentInfo, DocumentProgress, DocumentRef, Topic, TopicId},
};

/// Topic of a document; exercises inherit the topic of their parent document.
pub(crate) fn topic_for_document(conn: &Connection, document: DocumentRef) -> Result<Option<TopicId>> {
    let topic = match document {
        DocumentRef::Main(id) => conn
            .query_row("SELECT topic_id FROM pdfs WHERE id = ?1", params![id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?,
        DocumentRef::Exercise(id) => conn
            .query_row(
                "SELECT p.topic_id
                 FROM exercise_pdfs e
                 JOIN pdfs p ON p.id = e.parent_pdf_id
                 WHERE e.id = ?1",
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?,
    };
    Ok(topic)
}

/// Pages read across the main documents of a topic, counting pages before the
/// current page as read.
pub(crate) fn progress_for_topic(conn: &Connection, topic_id: TopicId) -> Result<DocumentProgress> {
    let (total_pages, pages_read): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(total_pages), 0),
                COALESCE(SUM(MIN(MAX(current_page - 1, 0), total_pages)), 0)
         FROM pdfs
         WHERE topic_id = ?1",
        params![topic_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(DocumentProgress {
        total_pages: to_u64(total_pages, "total_pages")?,
        pages_read: to_u64(pages_read, "pages_read")?,
    })
}

impl Database {
    pub async fn create_topic(&self, name: String) -> Result<Topic> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO topics (name, created_at) VALUES (?1, ?2)",
                params![name, Utc::now().to_rfc3339()],
            )?;
            Ok(Topic {
                id: conn.last_insert_rowid(),
                name,
            })
        })
        .await
    }

    pub async fn add_pdf(&self, topic_id: TopicId, title: String, total_pages: u32) -> Result<DocumentRef> {
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO pdfs (topic_id, title, total_pages, current_page, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?5)",
                params![topic_id, title, total_pages, now, now],
            )?;
            Ok(DocumentRef::Main(conn.last_insert_rowid()))
        })
        .await
    }

    pub async fn add_exercise_pdf(
        &self,
        parent_pdf_id: i64,
        title: String,
        total_pages: u32,
    ) -> Result<DocumentRef> {
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO exercise_pdfs (parent_pdf_id, title, total_pages, current_page, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?5)",
                params![parent_pdf_id, title, total_pages, now, now],
            )?;
            Ok(DocumentRef::Exercise(conn.last_insert_rowid()))
        })
        .await
    }

    /// Remember where the reader left off. `total_pages + 1` marks the document
    /// as finished; anything further is clamped to it.
    pub async fn update_current_page(&self, document: DocumentRef, current_page: u32) -> Result<()> {
        self.execute(move |conn| {
            let table = match document {
                DocumentRef::Main(_) => "pdfs",
                DocumentRef::Exercise(_) => "exercise_pdfs",
            };
            let sql = format!(
                "UPDATE {table}
                 SET current_page = MAX(1, CASE WHEN total_pages > 0 THEN MIN(?1, total_pages + 1) ELSE ?1 END),
                     updated_at = ?2
                 WHERE id = ?3"
            );
            let rows_affected = conn.execute(
                &sql,
                params![to_i64(current_page as u64)?, Utc::now().to_rfc3339(), document.id()],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("{document} not found"));
            }
            Ok(())
        })
        .await
    }

    pub async fn get_document(&self, document: DocumentRef) -> Result<Option<DocumentInfo>> {
        self.execute(move |conn| {
            let table = match document {
                DocumentRef::Main(_) => "pdfs",
                DocumentRef::Exercise(_) => "exercise_pdfs",
            };
            let sql = format!("SELECT title, total_pages, current_page FROM {table} WHERE id = ?1");
            let row = conn
                .query_row(&sql, params![document.id()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .optional()?;

            let Some((title, total_pages, current_page)) = row else {
                return Ok(None);
            };

            Ok(Some(DocumentInfo {
                document,
                topic_id: topic_for_document(conn, document)?,
                title,
                total_pages: to_u32(total_pages, "total_pages")?,
                current_page: to_u32(current_page, "current_page")?,
            }))
        })
        .await
    }

    pub async fn get_document_topic(&self, document: DocumentRef) -> Result<Option<TopicId>> {
        self.execute(move |conn| topic_for_document(conn, document)).await
    }

    pub async fn get_topic_progress(&self, topic_id: TopicId) -> Result<DocumentProgress> {
        self.execute(move |conn| progress_for_topic(conn, topic_id)).await
    }
}
