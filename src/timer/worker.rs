use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::models::{
        efficiency_percent, DocumentRef, MetricSample, SessionClose, SessionId, SessionStats,
        TopicId,
    },
    goals::GoalsManager,
    store::StudyStore,
};

use super::{
    clock::Clock,
    config::TimerConfig,
    events::{LiveStats, SessionEvent},
    state::{Effect, FinishedSession, SessionState},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub(crate) enum TimerCommand {
    Start {
        document: DocumentRef,
        topic_id: Option<TopicId>,
        reply: oneshot::Sender<Result<SessionId>>,
    },
    ChangePage {
        page: u32,
        reply: oneshot::Sender<Result<()>>,
    },
    Interaction {
        reply: oneshot::Sender<()>,
    },
    Pause {
        reply: oneshot::Sender<()>,
    },
    Resume {
        reply: oneshot::Sender<()>,
    },
    End {
        reply: oneshot::Sender<Result<Option<SessionStats>>>,
    },
    Stats {
        reply: oneshot::Sender<Option<LiveStats>>,
    },
}

/// Sole owner of the session state. Commands, idle checks and stats ticks are
/// handled one at a time, in arrival order.
pub(crate) struct TimerWorker {
    state: SessionState,
    store: Arc<dyn StudyStore>,
    goals: GoalsManager,
    clock: Arc<dyn Clock>,
    config: TimerConfig,
    events: broadcast::Sender<SessionEvent>,
}

impl TimerWorker {
    pub(crate) fn new(
        store: Arc<dyn StudyStore>,
        clock: Arc<dyn Clock>,
        config: TimerConfig,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state: SessionState::new(),
            goals: GoalsManager::new(store.clone()),
            store,
            clock,
            config,
            events,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<TimerCommand>,
        cancel_token: CancellationToken,
    ) {
        let mut idle_ticker = time::interval(self.config.idle_check_interval);
        idle_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats_ticker = time::interval(self.config.stats_interval);
        stats_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        log_info!("timer handle dropped, shutting down");
                        break;
                    };
                    let started = matches!(command, TimerCommand::Start { .. });
                    self.handle(command).await;
                    if started {
                        idle_ticker.reset();
                        stats_ticker.reset();
                    }
                }
                _ = idle_ticker.tick(), if self.state.is_open() => {
                    let now = self.clock.now();
                    let effects = self.state.check_idle(now, self.config.idle_threshold);
                    if !effects.is_empty() {
                        log_debug!("session idle after {:?} without activity", self.config.idle_threshold);
                    }
                    self.apply(effects).await;
                }
                _ = stats_ticker.tick(), if self.state.is_open() => {
                    if let Some(stats) = self.state.snapshot(self.clock.now()) {
                        self.emit(SessionEvent::StatsUpdated(stats));
                    }
                }
                _ = cancel_token.cancelled() => {
                    log_info!("timer loop shutting down");
                    break;
                }
            }
        }

        if self.state.is_open() {
            if let Err(err) = self.end_session().await {
                log_error!("failed to close open session on shutdown: {err:?}");
            }
        }
    }

    async fn handle(&mut self, command: TimerCommand) {
        match command {
            TimerCommand::Start {
                document,
                topic_id,
                reply,
            } => {
                let result = self.start_session(document, topic_id).await;
                let _ = reply.send(result);
            }
            TimerCommand::ChangePage { page, reply } => {
                let result = match self.state.change_page(page, self.clock.now()) {
                    Ok(effects) => {
                        if !effects.is_empty() {
                            log_debug!("page changed to {page}");
                        }
                        self.apply(effects).await;
                        Ok(())
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            TimerCommand::Interaction { reply } => {
                let effects = self.state.record_interaction(self.clock.now());
                self.apply(effects).await;
                let _ = reply.send(());
            }
            TimerCommand::Pause { reply } => {
                let effects = self.state.pause(self.clock.now());
                self.apply(effects).await;
                let _ = reply.send(());
            }
            TimerCommand::Resume { reply } => {
                let effects = self.state.resume(self.clock.now());
                self.apply(effects).await;
                let _ = reply.send(());
            }
            TimerCommand::End { reply } => {
                let result = self.end_session().await;
                let _ = reply.send(result);
            }
            TimerCommand::Stats { reply } => {
                let _ = reply.send(self.state.snapshot(self.clock.now()));
            }
        }
    }

    async fn start_session(
        &mut self,
        document: DocumentRef,
        topic_id: Option<TopicId>,
    ) -> Result<SessionId> {
        if self.state.is_open() {
            log_info!("starting a new session, ending the open one first");
            if let Err(err) = self.end_session().await {
                log_warn!("previous session did not close cleanly: {err:?}");
            }
        }

        let started_at = Utc::now();
        let session_id = self
            .store
            .create_session(document, topic_id, started_at)
            .await
            .context("failed to create session")?;

        let effects = self.state.begin(
            session_id.clone(),
            document,
            topic_id,
            started_at,
            self.clock.now(),
        );
        self.apply(effects).await;

        log_info!("started session {session_id} for {document}");
        Ok(session_id)
    }

    async fn end_session(&mut self) -> Result<Option<SessionStats>> {
        let Some((finished, effects)) = self.state.finish(self.clock.now()) else {
            return Ok(None);
        };
        self.apply(effects).await;

        let metric = MetricSample::from_session(finished.pages_visited, finished.active_ms);
        let close = SessionClose {
            session_id: finished.session_id.clone(),
            ended_at: finished.started_at + ChronoDuration::milliseconds(finished.total_ms as i64),
            total_ms: finished.total_ms,
            active_ms: finished.active_ms,
            idle_ms: finished.idle_ms,
            pages_visited: finished.pages_visited,
            metric,
        };
        let ended_at = close.ended_at;

        let result = self.store.end_session(close).await;
        let stats = final_stats(&finished, ended_at, metric, result.is_ok());

        self.emit(SessionEvent::SessionEnded {
            session_id: finished.session_id.clone(),
            stats: stats.clone(),
        });

        let refs = match result {
            Ok(refs) => refs,
            Err(err) => {
                log_error!("failed to save session {}: {err:?}", finished.session_id);
                return Err(err.context(format!(
                    "session {} ended but was not saved",
                    finished.session_id
                )));
            }
        };

        log_info!(
            "ended session {}: {}s total, {}s active, {} pages",
            stats.session_id,
            stats.total_secs(),
            stats.active_secs(),
            stats.pages_visited
        );

        if let Some(topic_id) = refs.topic_id.or(finished.topic_id) {
            let today = Local::now().date_naive();
            if let Err(err) = self
                .goals
                .update_progress_after_session(
                    topic_id,
                    finished.pages_visited,
                    finished.active_ms / 1000,
                    today,
                )
                .await
            {
                log_error!("failed to update goal progress for topic {topic_id}: {err:?}");
            }
        }

        Ok(Some(stats))
    }

    async fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Emit(event) => self.emit(event),
                Effect::SavePageTime(record) => {
                    let page = record.page_number;
                    if let Err(err) = self.store.save_page_time(record).await {
                        log_error!("failed to save time for page {page}: {err:?}");
                    }
                }
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn final_stats(
    finished: &FinishedSession,
    ended_at: DateTime<Utc>,
    metric: Option<MetricSample>,
    saved: bool,
) -> SessionStats {
    SessionStats {
        session_id: finished.session_id.clone(),
        document: finished.document,
        topic_id: finished.topic_id,
        started_at: finished.started_at,
        ended_at,
        total_ms: finished.total_ms,
        active_ms: finished.active_ms,
        idle_ms: finished.idle_ms,
        pages_visited: finished.pages_visited,
        pages_per_minute: metric.map(|m| m.pages_per_minute).unwrap_or(0.0),
        avg_seconds_per_page: metric.map(|m| m.avg_seconds_per_page),
        efficiency_percent: efficiency_percent(finished.total_ms, finished.active_ms),
        saved,
    }
}
