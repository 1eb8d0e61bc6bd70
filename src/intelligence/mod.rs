//! Reading-speed lookups and time-to-finish estimates.
//!
//! Everything here is advisory: store errors are logged and surface as `None`
//! or an empty list, never as an error to the caller.

mod estimate;

use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate};

use crate::{
    db::models::{
        DailyReadingStats, DocumentProgress, DocumentRef, MetricSubject, ReadingMetric, Session,
        TopicId,
    },
    store::StudyStore,
};

pub use estimate::{
    build_estimate, default_seconds_per_page, pages_remaining, sessions_needed, Confidence,
    EstimateSource, FinishEstimate, ReadingPace, DEFAULT_EXERCISE_SECONDS_PER_PAGE,
    DEFAULT_SECONDS_PER_PAGE, SESSION_MINUTES,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

#[derive(Clone)]
pub struct ReadingIntelligence {
    store: Arc<dyn StudyStore>,
}

impl ReadingIntelligence {
    pub fn new(store: Arc<dyn StudyStore>) -> Self {
        Self { store }
    }

    /// Metric for one document or topic, or the pooled user-wide figure.
    pub async fn get_reading_speed(&self, subject: MetricSubject) -> Option<ReadingMetric> {
        match self.store.get_reading_metric(subject).await {
            Ok(metric) => metric,
            Err(err) => {
                log_error!("failed to load reading metric for {subject:?}: {err:?}");
                None
            }
        }
    }

    pub async fn estimate_finish_time(
        &self,
        document: DocumentRef,
        current_page: u32,
        total_pages: u32,
    ) -> Option<FinishEstimate> {
        match self.estimate(document, current_page, total_pages).await {
            Ok(estimate) => Some(estimate),
            Err(err) => {
                log_error!("failed to estimate finish time for {document}: {err:?}");
                None
            }
        }
    }

    /// Finished sessions of the last `days` days, newest first.
    pub async fn get_session_history(
        &self,
        days: u32,
        document: Option<DocumentRef>,
    ) -> Vec<Session> {
        self.store
            .get_session_history(days, document)
            .await
            .unwrap_or_else(|err| {
                log_error!("failed to load session history: {err:?}");
                Vec::new()
            })
    }

    /// Reading totals for `date`, today when omitted.
    pub async fn get_daily_stats(&self, date: Option<NaiveDate>) -> Option<DailyReadingStats> {
        let date = date.unwrap_or_else(|| Local::now().date_naive());
        match self.store.get_daily_stats(date).await {
            Ok(stats) => stats,
            Err(err) => {
                log_error!("failed to load daily stats for {date}: {err:?}");
                None
            }
        }
    }

    pub async fn get_topic_progress(&self, topic_id: TopicId) -> Option<DocumentProgress> {
        match self.store.get_document_progress(topic_id).await {
            Ok(progress) => Some(progress),
            Err(err) => {
                log_error!("failed to load progress for topic {topic_id}: {err:?}");
                None
            }
        }
    }

    async fn estimate(
        &self,
        document: DocumentRef,
        current_page: u32,
        total_pages: u32,
    ) -> Result<FinishEstimate> {
        let (metric, source) = self.best_metric(document).await?;

        let estimate = match metric {
            Some(metric) => build_estimate(
                current_page,
                total_pages,
                metric.avg_seconds_per_page,
                Some(metric.total_pages_read),
                source,
            ),
            None => build_estimate(
                current_page,
                total_pages,
                default_seconds_per_page(document),
                None,
                EstimateSource::Default,
            ),
        };

        log_debug!(
            "estimate for {document}: {} pages left, {:.1} min ({:?})",
            estimate.pages_remaining,
            estimate.estimated_minutes,
            estimate.source
        );
        Ok(estimate)
    }

    /// Document metric, then the document's topic, then the user-wide pool.
    async fn best_metric(
        &self,
        document: DocumentRef,
    ) -> Result<(Option<ReadingMetric>, EstimateSource)> {
        if let Some(metric) = usable(
            self.store
                .get_reading_metric(MetricSubject::Document(document))
                .await?,
        ) {
            return Ok((Some(metric), EstimateSource::Document));
        }

        if let Some(topic_id) = self.store.get_document_topic(document).await? {
            if let Some(metric) = usable(
                self.store
                    .get_reading_metric(MetricSubject::Topic(topic_id))
                    .await?,
            ) {
                return Ok((Some(metric), EstimateSource::Topic));
            }
        }

        if let Some(metric) = usable(self.store.get_reading_metric(MetricSubject::UserWide).await?) {
            return Ok((Some(metric), EstimateSource::UserWide));
        }

        Ok((None, EstimateSource::Default))
    }
}

fn usable(metric: Option<ReadingMetric>) -> Option<ReadingMetric> {
    metric.filter(|metric| metric.avg_seconds_per_page > 0.0)
}
