mod common;

use std::{sync::Arc, time::Duration};

use chrono::{NaiveDate, Utc};

use common::{quiet_config, seed_document, temp_database};
use studytrack::{
    db::models::{MetricSample, MetricSubject},
    intelligence::{Confidence, EstimateSource, ReadingPace},
    timer::ManualClock,
    Database, ReadingIntelligence, SessionTimer, StudyStore,
};

fn intelligence(db: &Database) -> ReadingIntelligence {
    let store: Arc<dyn StudyStore> = Arc::new(db.clone());
    ReadingIntelligence::new(store)
}

fn sample(pages: u32, secs: u64) -> MetricSample {
    MetricSample::from_session(pages, secs * 1000).expect("non-empty sample")
}

#[tokio::test]
async fn estimates_fall_back_to_fixed_defaults() {
    let (_dir, db) = temp_database();
    let (_, document) = seed_document(&db, 20).await;
    let exercise = db
        .add_exercise_pdf(document.id(), "Drills".into(), 20)
        .await
        .unwrap();
    let reading = intelligence(&db);

    assert!(reading
        .get_reading_speed(MetricSubject::Document(document))
        .await
        .is_none());
    assert!(reading.get_reading_speed(MetricSubject::UserWide).await.is_none());

    let estimate = reading.estimate_finish_time(document, 1, 20).await.unwrap();
    assert_eq!(estimate.source, EstimateSource::Default);
    assert_eq!(estimate.pages_remaining, 20);
    assert_eq!(estimate.avg_seconds_per_page, 90.0);
    assert_eq!(estimate.estimated_seconds, 1800.0);
    assert_eq!(estimate.estimated_minutes, 30.0);
    assert_eq!(estimate.sessions_needed, 2);
    assert_eq!(estimate.confidence, Confidence::Low);
    assert_eq!(estimate.pace, ReadingPace::Careful);

    let estimate = reading.estimate_finish_time(exercise, 11, 20).await.unwrap();
    assert_eq!(estimate.avg_seconds_per_page, 120.0);
    assert_eq!(estimate.pages_remaining, 10);
}

#[tokio::test]
async fn last_page_needs_no_more_reading_but_one_session() {
    let (_dir, db) = temp_database();
    let (_, document) = seed_document(&db, 50).await;
    let reading = intelligence(&db);

    let estimate = reading.estimate_finish_time(document, 50, 50).await.unwrap();
    assert_eq!(estimate.pages_remaining, 0);
    assert_eq!(estimate.estimated_seconds, 0.0);
    assert_eq!(estimate.sessions_needed, 1);

    let past_the_end = reading.estimate_finish_time(document, 60, 50).await.unwrap();
    assert_eq!(past_the_end.pages_remaining, 0);
}

#[tokio::test]
async fn most_specific_metric_wins() {
    let (_dir, db) = temp_database();
    let (topic_id, first) = seed_document(&db, 100).await;
    let second = db.add_pdf(topic_id, "Second volume".into(), 100).await.unwrap();
    let (_, elsewhere) = seed_document(&db, 100).await;
    let reading = intelligence(&db);

    db.update_reading_metric(MetricSubject::Topic(topic_id), sample(10, 300))
        .await
        .unwrap();
    db.update_reading_metric(MetricSubject::Document(first), sample(10, 600))
        .await
        .unwrap();

    let estimate = reading.estimate_finish_time(first, 91, 100).await.unwrap();
    assert_eq!(estimate.source, EstimateSource::Document);
    assert!((estimate.avg_seconds_per_page - 60.0).abs() < 1e-9);
    assert_eq!(estimate.confidence, Confidence::Medium);
    assert_eq!(estimate.pace, ReadingPace::Moderate);

    let estimate = reading.estimate_finish_time(second, 91, 100).await.unwrap();
    assert_eq!(estimate.source, EstimateSource::Topic);
    assert!((estimate.avg_seconds_per_page - 30.0).abs() < 1e-9);
    assert_eq!(estimate.pace, ReadingPace::Fast);

    let estimate = reading.estimate_finish_time(elsewhere, 91, 100).await.unwrap();
    assert_eq!(estimate.source, EstimateSource::UserWide);
    assert!((estimate.avg_seconds_per_page - 60.0).abs() < 1e-9);
    assert!((estimate.estimated_minutes - 10.0).abs() < 1e-9);
    assert_eq!(estimate.sessions_needed, 1);
}

#[tokio::test]
async fn user_wide_speed_pools_document_totals() {
    let (_dir, db) = temp_database();
    let (topic_id, first) = seed_document(&db, 100).await;
    let second = db.add_pdf(topic_id, "Second volume".into(), 100).await.unwrap();
    let reading = intelligence(&db);

    db.update_reading_metric(MetricSubject::Document(first), sample(10, 600))
        .await
        .unwrap();
    db.update_reading_metric(MetricSubject::Document(second), sample(30, 900))
        .await
        .unwrap();
    db.update_reading_metric(MetricSubject::Topic(topic_id), sample(40, 1500))
        .await
        .unwrap();

    let pooled = reading
        .get_reading_speed(MetricSubject::UserWide)
        .await
        .unwrap();
    assert_eq!(pooled.subject, MetricSubject::UserWide);
    assert_eq!(pooled.total_pages_read, 40);
    assert_eq!(pooled.total_time_ms, 1_500_000);
    assert!((pooled.avg_seconds_per_page - 37.5).abs() < 1e-9);
    assert!((pooled.pages_per_minute - 1.6).abs() < 1e-9);

    // Repeated samples accumulate into the same row.
    db.update_reading_metric(MetricSubject::Document(first), sample(10, 600))
        .await
        .unwrap();
    let first_metric = reading
        .get_reading_speed(MetricSubject::Document(first))
        .await
        .unwrap();
    assert_eq!(first_metric.total_pages_read, 20);
    assert_eq!(first_metric.total_time_ms, 1_200_000);

    assert!(db
        .update_reading_metric(MetricSubject::UserWide, sample(1, 60))
        .await
        .is_err());
}

#[tokio::test]
async fn history_and_daily_totals_cover_finished_sessions() {
    let (_dir, db) = temp_database();
    let (topic_id, document) = seed_document(&db, 100).await;
    let (_, other) = seed_document(&db, 100).await;
    let store: Arc<dyn StudyStore> = Arc::new(db.clone());
    let clock = ManualClock::new();
    let timer = SessionTimer::with_clock(store, Arc::new(clock.clone()), quiet_config());
    let reading = intelligence(&db);

    timer.start_session(document, Some(topic_id)).await.unwrap();
    timer.change_page(2).await.unwrap();
    clock.advance(Duration::from_secs(40));
    timer.change_page(3).await.unwrap();
    clock.advance(Duration::from_secs(20));
    timer.end_session().await.unwrap();

    // Still open, so not part of the history.
    timer.start_session(other, None).await.unwrap();

    let history = reading.get_session_history(7, None).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].document, document);
    assert_eq!(history[0].pages_visited, 2);
    assert!(reading
        .get_session_history(7, Some(other))
        .await
        .is_empty());

    let today = Utc::now().date_naive();
    let stats = reading.get_daily_stats(Some(today)).await.unwrap();
    assert_eq!(stats.sessions_count, 1);
    assert_eq!(stats.pages_read, 2);
    assert_eq!(stats.active_ms, 60_000);
    assert!((stats.avg_reading_speed_ppm - 2.0).abs() < 1e-9);

    let long_ago = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
    assert!(reading.get_daily_stats(Some(long_ago)).await.is_none());

    timer.shutdown().await;
}

#[tokio::test]
async fn topic_progress_counts_pages_before_the_current_one() {
    let (_dir, db) = temp_database();
    let (topic_id, document) = seed_document(&db, 40).await;
    db.add_pdf(topic_id, "Appendix".into(), 10).await.unwrap();
    let reading = intelligence(&db);

    db.update_current_page(document, 21).await.unwrap();
    let progress = reading.get_topic_progress(topic_id).await.unwrap();
    assert_eq!(progress.total_pages, 50);
    assert_eq!(progress.pages_read, 20);
    assert_eq!(progress.percent(), Some(40.0));

    db.update_current_page(document, 500).await.unwrap();
    let info = db.get_document(document).await.unwrap().unwrap();
    assert_eq!(info.current_page, 41);
    let progress = reading.get_topic_progress(topic_id).await.unwrap();
    assert_eq!(progress.pages_read, 40);
}
