use chrono::{Duration, Utc};

use studytrack::{
    db::models::{DocumentRef, PageTimeRecord, SessionClose, SessionStatus},
    StudyTracker, TimerSettings,
};

async fn seed(tracker: &StudyTracker) -> DocumentRef {
    let db = tracker.database();
    let topic = db.create_topic("Thermodynamics".into()).await.unwrap();
    db.add_pdf(topic.id, "Chapter 1".into(), 30).await.unwrap()
}

#[tokio::test]
async fn open_creates_the_data_directory() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("nested").join("studytrack");

    let tracker = StudyTracker::open(&data_dir).await.unwrap();
    assert!(data_dir.join("studytrack.sqlite3").exists());
    assert_eq!(tracker.settings().retention_days(), 90);
    assert!(tracker.timer().get_current_stats().await.is_none());

    tracker
        .settings()
        .update_timer(TimerSettings {
            idle_threshold_secs: 300,
            ..TimerSettings::default()
        })
        .unwrap();
    tracker.shutdown().await;

    let reopened = StudyTracker::open(&data_dir).await.unwrap();
    assert_eq!(reopened.settings().timer().idle_threshold_secs, 300);
    reopened.shutdown().await;
}

#[tokio::test]
async fn sessions_left_running_are_marked_interrupted_on_open() {
    let dir = tempfile::tempdir().unwrap();

    let tracker = StudyTracker::open(dir.path()).await.unwrap();
    let document = seed(&tracker).await;
    tracker
        .database()
        .insert_session("crashed".into(), document, None, Utc::now())
        .await
        .unwrap();
    tracker.shutdown().await;

    let reopened = StudyTracker::open(dir.path()).await.unwrap();
    let session = reopened
        .database()
        .get_session("crashed")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Interrupted);
    assert!(session.ended_at.is_some());
    assert!(reopened
        .database()
        .get_incomplete_sessions()
        .await
        .unwrap()
        .is_empty());
    reopened.shutdown().await;
}

#[tokio::test]
async fn cleanup_drops_sessions_outside_the_retention_window() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = StudyTracker::open(dir.path()).await.unwrap();
    let document = seed(&tracker).await;
    let db = tracker.database();

    let old_start = Utc::now() - Duration::days(200);
    db.insert_session("old".into(), document, None, old_start)
        .await
        .unwrap();
    db.insert_page_time(&PageTimeRecord {
        session_id: "old".into(),
        document,
        page_number: 2,
        duration_ms: 30_000,
    })
    .await
    .unwrap();
    db.close_session(SessionClose {
        session_id: "old".into(),
        ended_at: old_start + Duration::minutes(1),
        total_ms: 60_000,
        active_ms: 60_000,
        idle_ms: 0,
        pages_visited: 1,
        metric: None,
    })
    .await
    .unwrap();

    // Open sessions are kept no matter how old.
    db.insert_session("stale-open".into(), document, None, old_start)
        .await
        .unwrap();

    let recent = tracker.timer().start_session(document, None).await.unwrap();
    tracker.timer().end_session().await.unwrap();

    let report = tracker.cleanup_old_data().await.unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(report.page_times, 1);
    assert_eq!(report.total(), 2);

    assert!(db.get_session("old").await.unwrap().is_none());
    assert!(db.get_session("stale-open").await.unwrap().is_some());
    assert!(db.get_session(&recent).await.unwrap().is_some());
    tracker.shutdown().await;
}
