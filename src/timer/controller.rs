use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::{
    sync::{broadcast, mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::models::{DocumentRef, SessionId, SessionStats, TopicId},
    store::StudyStore,
};

use super::{
    clock::{Clock, SystemClock},
    config::TimerConfig,
    events::{LiveStats, SessionEvent},
    worker::{TimerCommand, TimerWorker},
};

const ENABLE_LOGS: bool = true;

use crate::log_error;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

/// Handle to the session timer task. Cheap to clone; every clone talks to the
/// same task, which processes requests strictly in the order they arrive.
#[derive(Clone)]
pub struct SessionTimer {
    commands: mpsc::Sender<TimerCommand>,
    events: broadcast::Sender<SessionEvent>,
    cancel_token: CancellationToken,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionTimer {
    /// Spawn the timer task on the current tokio runtime.
    pub fn spawn(store: Arc<dyn StudyStore>, config: TimerConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(store: Arc<dyn StudyStore>, clock: Arc<dyn Clock>, config: TimerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let cancel_token = CancellationToken::new();

        let worker = TimerWorker::new(store, clock, config, event_tx.clone());
        let handle = tokio::spawn(worker.run(command_rx, cancel_token.clone()));

        Self {
            commands: command_tx,
            events: event_tx,
            cancel_token,
            worker: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Open a session for `document`, ending any session still open.
    pub async fn start_session(
        &self,
        document: DocumentRef,
        topic_id: Option<TopicId>,
    ) -> Result<SessionId> {
        self.request(|reply| TimerCommand::Start {
            document,
            topic_id,
            reply,
        })
        .await?
    }

    pub async fn change_page(&self, page: u32) -> Result<()> {
        self.request(|reply| TimerCommand::ChangePage { page, reply })
            .await?
    }

    pub async fn record_interaction(&self) -> Result<()> {
        self.request(|reply| TimerCommand::Interaction { reply }).await
    }

    pub async fn pause_session(&self) -> Result<()> {
        self.request(|reply| TimerCommand::Pause { reply }).await
    }

    pub async fn resume_session(&self) -> Result<()> {
        self.request(|reply| TimerCommand::Resume { reply }).await
    }

    /// End the open session. `Ok(None)` when nothing was open. On a failed
    /// save the timer is still reset and the error is returned.
    pub async fn end_session(&self) -> Result<Option<SessionStats>> {
        self.request(|reply| TimerCommand::End { reply }).await?
    }

    pub async fn get_current_stats(&self) -> Option<LiveStats> {
        self.request(|reply| TimerCommand::Stats { reply })
            .await
            .ok()
            .flatten()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the timer task, closing any open session first.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(err) = handle.await {
                log_error!("session timer task failed: {err}");
            }
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> TimerCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| anyhow!("session timer is not running"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("session timer stopped before replying"))
    }
}
