//! Study-tracking core: reading sessions with idle detection, reading-speed
//! estimates and study goals, persisted in SQLite.

pub mod db;
pub mod goals;
pub mod intelligence;
pub mod settings;
pub mod store;
pub mod timer;
mod utils;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;

pub use db::{CleanupReport, Database};
pub use goals::GoalsManager;
pub use intelligence::ReadingIntelligence;
pub use settings::{SettingsStore, TimerSettings, TrackerSettings};
pub use store::StudyStore;
pub use timer::{SessionEvent, SessionTimer, TimerConfig};
pub use utils::logging::init_logging;

const ENABLE_LOGS: bool = true;

const DATABASE_FILE: &str = "studytrack.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// Everything an embedding application needs, wired to one data directory.
pub struct StudyTracker {
    db: Database,
    settings: SettingsStore,
    timer: SessionTimer,
    intelligence: ReadingIntelligence,
    goals: GoalsManager,
}

impl StudyTracker {
    /// Open (or create) the tracker's data directory. Must run inside a tokio
    /// runtime; the session timer task is spawned on it.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;

        recover_interrupted_sessions(&db).await?;

        match db.cleanup_old_data(settings.retention_days()).await {
            Ok(report) if report.total() > 0 => log_info!(
                "retention cleanup removed {} sessions, {} page times, {} goal progress rows",
                report.sessions,
                report.page_times,
                report.goal_progress
            ),
            Ok(_) => {}
            Err(err) => log_warn!("retention cleanup failed: {err:?}"),
        }

        let store: Arc<dyn StudyStore> = Arc::new(db.clone());
        let config = settings.timer().to_config().with_env_overrides();

        Ok(Self {
            timer: SessionTimer::spawn(store.clone(), config),
            intelligence: ReadingIntelligence::new(store.clone()),
            goals: GoalsManager::new(store),
            db,
            settings,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn intelligence(&self) -> &ReadingIntelligence {
        &self.intelligence
    }

    pub fn goals(&self) -> &GoalsManager {
        &self.goals
    }

    /// Purge data older than the configured retention window.
    pub async fn cleanup_old_data(&self) -> Result<CleanupReport> {
        self.db.cleanup_old_data(self.settings.retention_days()).await
    }

    /// End any open session and stop the timer task.
    pub async fn shutdown(&self) {
        self.timer.shutdown().await;
    }
}

/// Sessions still marked running were left open by a crash.
async fn recover_interrupted_sessions(db: &Database) -> Result<()> {
    let sessions = db
        .get_incomplete_sessions()
        .await
        .context("failed to look up incomplete sessions")?;

    for session in sessions {
        log_warn!(
            "Recovered incomplete session {}; marking as Interrupted",
            session.id
        );
        db.mark_session_interrupted(&session.id, Utc::now()).await?;
    }
    Ok(())
}
