use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{DocumentRef, PageTimeRecord, SessionId, TopicId};

use super::{
    clock::{duration_ms, Stopwatch},
    events::{LiveStats, SessionEvent},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PauseKind {
    Manual,
    AutoIdle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    /// No session is open.
    #[default]
    Idle,
    Active,
    Paused(PauseKind),
}

/// Side effects requested by a transition, applied in order by the timer task.
#[derive(Debug, Clone)]
pub(crate) enum Effect {
    Emit(SessionEvent),
    SavePageTime(PageTimeRecord),
}

/// Aggregates of a session taken off the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FinishedSession {
    pub session_id: SessionId,
    pub document: DocumentRef,
    pub topic_id: Option<TopicId>,
    pub started_at: DateTime<Utc>,
    pub total_ms: u64,
    pub active_ms: u64,
    pub idle_ms: u64,
    pub pages_visited: u32,
}

#[derive(Debug, Clone)]
struct OpenSession {
    session_id: SessionId,
    document: DocumentRef,
    topic_id: Option<TopicId>,
    started_at: DateTime<Utc>,
    elapsed: Stopwatch,
    last_activity: Instant,
    pause: Option<(PauseKind, Instant)>,
    /// Idle time of pauses that already ended.
    idle_ms: u64,
    /// `None` until the first `change_page`.
    current_page: Option<u32>,
    /// Open visit on `current_page`; `None` before the first page change and while paused.
    page_visit: Option<Stopwatch>,
    visited: BTreeSet<u32>,
}

impl OpenSession {
    fn close_visit(&mut self, now: Instant) -> Option<Effect> {
        let page_number = self.current_page?;
        let visit = self.page_visit.take()?;
        Some(Effect::SavePageTime(PageTimeRecord {
            session_id: self.session_id.clone(),
            document: self.document,
            page_number,
            duration_ms: visit.elapsed_ms(now),
        }))
    }

    fn enter_pause(&mut self, kind: PauseKind, now: Instant) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self.close_visit(now).into_iter().collect();
        self.pause = Some((kind, now));
        effects.push(Effect::Emit(SessionEvent::IdleDetected { is_idle: true }));
        effects.push(Effect::Emit(SessionEvent::SessionPaused {
            session_id: self.session_id.clone(),
            is_manual: kind == PauseKind::Manual,
        }));
        effects
    }

    fn exit_pause(&mut self, now: Instant) -> Vec<Effect> {
        let Some((_, since)) = self.pause.take() else {
            return Vec::new();
        };
        self.idle_ms = self
            .idle_ms
            .saturating_add(duration_ms(now.saturating_duration_since(since)));
        if !self.visited.is_empty() {
            self.page_visit = Some(Stopwatch::started_at(now));
        }
        vec![
            Effect::Emit(SessionEvent::IdleDetected { is_idle: false }),
            Effect::Emit(SessionEvent::SessionResumed {
                session_id: self.session_id.clone(),
            }),
        ]
    }

    fn mark_activity(&mut self, now: Instant) -> Vec<Effect> {
        self.last_activity = now;
        self.exit_pause(now)
    }

    /// `(total, active, idle)` in milliseconds, counting an open pause as idle.
    fn totals(&self, now: Instant) -> (u64, u64, u64) {
        let total = self.elapsed.elapsed_ms(now);
        let open_pause = self
            .pause
            .map(|(_, since)| duration_ms(now.saturating_duration_since(since)))
            .unwrap_or(0);
        let idle = self.idle_ms.saturating_add(open_pause).min(total);
        (total, total - idle, idle)
    }
}

/// The session timer's state machine. Every transition takes the current
/// instant explicitly and returns the effects the caller must apply.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    open: Option<OpenSession>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.open.as_ref().map(|open| open.session_id.as_str())
    }

    pub fn status(&self) -> TimerStatus {
        match &self.open {
            None => TimerStatus::Idle,
            Some(open) => match open.pause {
                Some((kind, _)) => TimerStatus::Paused(kind),
                None => TimerStatus::Active,
            },
        }
    }

    pub(crate) fn begin(
        &mut self,
        session_id: SessionId,
        document: DocumentRef,
        topic_id: Option<TopicId>,
        started_at: DateTime<Utc>,
        now: Instant,
    ) -> Vec<Effect> {
        self.open = Some(OpenSession {
            session_id: session_id.clone(),
            document,
            topic_id,
            started_at,
            elapsed: Stopwatch::started_at(now),
            last_activity: now,
            pause: None,
            idle_ms: 0,
            current_page: None,
            page_visit: None,
            visited: BTreeSet::new(),
        });
        vec![Effect::Emit(SessionEvent::SessionStarted { session_id })]
    }

    pub(crate) fn change_page(&mut self, page: u32, now: Instant) -> Result<Vec<Effect>> {
        if page == 0 {
            bail!("page numbers start at 1");
        }
        let Some(open) = self.open.as_mut() else {
            return Ok(Vec::new());
        };
        if open.current_page == Some(page) {
            return Ok(Vec::new());
        }

        let mut effects: Vec<Effect> = open.close_visit(now).into_iter().collect();
        effects.extend(open.mark_activity(now));

        // Documents open on page 1.
        let old_page = open.current_page.unwrap_or(1);
        open.current_page = Some(page);
        open.visited.insert(page);
        open.page_visit = Some(Stopwatch::started_at(now));

        effects.push(Effect::Emit(SessionEvent::PageChanged {
            session_id: open.session_id.clone(),
            old_page,
            new_page: page,
        }));
        Ok(effects)
    }

    pub(crate) fn record_interaction(&mut self, now: Instant) -> Vec<Effect> {
        match self.open.as_mut() {
            Some(open) => open.mark_activity(now),
            None => Vec::new(),
        }
    }

    pub(crate) fn pause(&mut self, now: Instant) -> Vec<Effect> {
        match self.open.as_mut() {
            Some(open) if open.pause.is_none() => open.enter_pause(PauseKind::Manual, now),
            _ => Vec::new(),
        }
    }

    pub(crate) fn resume(&mut self, now: Instant) -> Vec<Effect> {
        match self.open.as_mut() {
            Some(open) if open.pause.is_some() => open.mark_activity(now),
            _ => Vec::new(),
        }
    }

    /// Auto-pause once nothing happened for `threshold`. The idle interval
    /// starts at the moment of detection.
    pub(crate) fn check_idle(&mut self, now: Instant, threshold: Duration) -> Vec<Effect> {
        match self.open.as_mut() {
            Some(open)
                if open.pause.is_none()
                    && now.saturating_duration_since(open.last_activity) >= threshold =>
            {
                open.enter_pause(PauseKind::AutoIdle, now)
            }
            _ => Vec::new(),
        }
    }

    pub fn snapshot(&self, now: Instant) -> Option<LiveStats> {
        let open = self.open.as_ref()?;
        let (total, active, idle) = open.totals(now);
        let pages_visited = open.visited.len() as u32;
        Some(LiveStats {
            session_id: open.session_id.clone(),
            document: open.document,
            topic_id: open.topic_id,
            elapsed_secs: total / 1000,
            active_secs: active / 1000,
            idle_secs: idle / 1000,
            pages_visited,
            current_page: open.current_page.unwrap_or(1),
            is_idle: matches!(open.pause, Some((PauseKind::AutoIdle, _))),
            is_paused: open.pause.is_some(),
            pages_per_minute: pages_per_minute(pages_visited, active),
        })
    }

    /// Stop the clock and hand back the session's aggregates. The state is
    /// back to "no session" afterwards.
    pub(crate) fn finish(&mut self, now: Instant) -> Option<(FinishedSession, Vec<Effect>)> {
        let mut open = self.open.take()?;
        let effects: Vec<Effect> = open.close_visit(now).into_iter().collect();
        let (total_ms, active_ms, idle_ms) = open.totals(now);

        Some((
            FinishedSession {
                session_id: open.session_id,
                document: open.document,
                topic_id: open.topic_id,
                started_at: open.started_at,
                total_ms,
                active_ms,
                idle_ms,
                pages_visited: open.visited.len() as u32,
            },
            effects,
        ))
    }
}

fn pages_per_minute(pages: u32, active_ms: u64) -> f64 {
    if pages == 0 || active_ms == 0 {
        return 0.0;
    }
    pages as f64 / (active_ms as f64 / 60_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(120);

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn open_state(t0: Instant) -> SessionState {
        let mut state = SessionState::new();
        state.begin("s1".into(), DocumentRef::Main(7), Some(3), Utc::now(), t0);
        state
    }

    fn page_records(effects: &[Effect]) -> Vec<&PageTimeRecord> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::SavePageTime(record) => Some(record),
                Effect::Emit(_) => None,
            })
            .collect()
    }

    fn idle_events(effects: &[Effect]) -> Vec<bool> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Emit(SessionEvent::IdleDetected { is_idle }) => Some(*is_idle),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn basic_session_counts_pages_two_and_three() {
        let t0 = Instant::now();
        let mut state = open_state(t0);

        state.change_page(2, t0 + secs(1)).unwrap();
        state.change_page(3, t0 + secs(1)).unwrap();
        let (finished, _) = state.finish(t0 + secs(2)).unwrap();

        assert_eq!(finished.pages_visited, 2);
        assert_eq!(finished.total_ms, 2_000);
        assert_eq!(finished.active_ms, finished.total_ms);
        assert_eq!(finished.idle_ms, 0);
        assert!(!state.is_open());
    }

    #[test]
    fn explicit_first_page_opens_a_visit() {
        let t0 = Instant::now();
        let mut state = open_state(t0);

        let effects = state.change_page(1, t0).unwrap();
        assert!(matches!(
            effects.last(),
            Some(Effect::Emit(SessionEvent::PageChanged { old_page: 1, new_page: 1, .. }))
        ));
        assert!(state.change_page(1, t0 + secs(10)).unwrap().is_empty());

        let (finished, effects) = state.finish(t0 + secs(30)).unwrap();
        assert_eq!(finished.pages_visited, 1);
        let records = page_records(&effects);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].page_number, 1);
        assert_eq!(records[0].duration_ms, 30_000);
    }

    #[test]
    fn no_page_change_means_no_visits() {
        let t0 = Instant::now();
        let mut state = open_state(t0);
        assert_eq!(state.snapshot(t0).unwrap().current_page, 1);

        let (finished, effects) = state.finish(t0 + secs(30)).unwrap();
        assert_eq!(finished.pages_visited, 0);
        assert!(page_records(&effects).is_empty());
    }

    #[test]
    fn repeated_page_is_a_noop() {
        let t0 = Instant::now();
        let mut state = open_state(t0);

        let first = state.change_page(4, t0 + secs(1)).unwrap();
        let second = state.change_page(4, t0 + secs(2)).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn revisited_pages_count_once_but_record_every_visit() {
        let t0 = Instant::now();
        let mut state = open_state(t0);
        let mut records = Vec::new();

        for (offset, page) in [(0, 2), (5, 3), (9, 2), (12, 3)] {
            let effects = state.change_page(page, t0 + secs(offset)).unwrap();
            records.extend(page_records(&effects).into_iter().cloned());
        }
        let (finished, effects) = state.finish(t0 + secs(20)).unwrap();
        records.extend(page_records(&effects).into_iter().cloned());

        assert_eq!(finished.pages_visited, 2);
        let pages: Vec<u32> = records.iter().map(|r| r.page_number).collect();
        assert_eq!(pages, vec![2, 3, 2, 3]);
        let durations: Vec<u64> = records.iter().map(|r| r.duration_ms).collect();
        assert_eq!(durations, vec![5_000, 4_000, 3_000, 8_000]);
    }

    #[test]
    fn page_records_sum_to_active_time_without_idle() {
        let t0 = Instant::now();
        let mut state = open_state(t0);
        let mut total_recorded = 0;

        for (offset, page) in [(0, 2), (3, 3), (7, 4)] {
            let effects = state.change_page(page, t0 + secs(offset)).unwrap();
            total_recorded += page_records(&effects).iter().map(|r| r.duration_ms).sum::<u64>();
        }
        let (finished, effects) = state.finish(t0 + secs(10)).unwrap();
        let closing = page_records(&effects);
        total_recorded += closing.iter().map(|r| r.duration_ms).sum::<u64>();

        assert_eq!(closing.len(), 1);
        assert_eq!(total_recorded, finished.active_ms);
    }

    #[test]
    fn zero_page_is_rejected_without_touching_state() {
        let t0 = Instant::now();
        let mut state = open_state(t0);
        state.change_page(5, t0).unwrap();

        assert!(state.change_page(0, t0 + secs(1)).is_err());
        assert_eq!(state.snapshot(t0 + secs(1)).unwrap().current_page, 5);
    }

    #[test]
    fn idle_detection_fires_once_and_accrues_idle_time() {
        let t0 = Instant::now();
        let mut state = open_state(t0);

        assert!(state.check_idle(t0 + secs(119), THRESHOLD).is_empty());
        let entered = state.check_idle(t0 + secs(120), THRESHOLD);
        assert_eq!(idle_events(&entered), vec![true]);
        assert_eq!(state.status(), TimerStatus::Paused(PauseKind::AutoIdle));
        assert!(state.check_idle(t0 + secs(200), THRESHOLD).is_empty());

        let exited = state.record_interaction(t0 + secs(180));
        assert_eq!(idle_events(&exited), vec![false]);
        assert_eq!(state.status(), TimerStatus::Active);

        let (finished, _) = state.finish(t0 + secs(190)).unwrap();
        assert_eq!(finished.idle_ms, 60_000);
        assert_eq!(finished.active_ms, 130_000);
        assert_eq!(finished.total_ms, finished.active_ms + finished.idle_ms);
    }

    #[test]
    fn ending_while_paused_folds_the_open_pause_into_idle() {
        let t0 = Instant::now();
        let mut state = open_state(t0);
        state.change_page(2, t0).unwrap();

        let paused = state.pause(t0 + secs(30));
        assert_eq!(page_records(&paused).len(), 1);
        assert!(state.pause(t0 + secs(31)).is_empty());

        let (finished, effects) = state.finish(t0 + secs(50)).unwrap();
        assert!(page_records(&effects).is_empty());
        assert_eq!(finished.idle_ms, 20_000);
        assert_eq!(finished.active_ms, 30_000);
    }

    #[test]
    fn page_change_resumes_a_manual_pause() {
        let t0 = Instant::now();
        let mut state = open_state(t0);
        state.pause(t0 + secs(5));

        let effects = state.change_page(2, t0 + secs(15)).unwrap();

        assert!(matches!(
            effects.last(),
            Some(Effect::Emit(SessionEvent::PageChanged { old_page: 1, new_page: 2, .. }))
        ));
        assert!(effects.iter().any(|e| matches!(e, Effect::Emit(SessionEvent::SessionResumed { .. }))));
        assert!(page_records(&effects).is_empty());
        assert_eq!(state.status(), TimerStatus::Active);
        assert_eq!(state.snapshot(t0 + secs(15)).unwrap().idle_secs, 10);
    }

    #[test]
    fn resume_without_pause_is_a_noop() {
        let t0 = Instant::now();
        let mut state = open_state(t0);
        assert!(state.resume(t0 + secs(1)).is_empty());
        assert!(SessionState::new().resume(t0).is_empty());
    }

    #[test]
    fn snapshot_reports_flags_and_speed() {
        let t0 = Instant::now();
        let mut state = open_state(t0);
        state.change_page(2, t0).unwrap();
        state.change_page(3, t0 + secs(30)).unwrap();

        let live = state.snapshot(t0 + secs(60)).unwrap();
        assert_eq!(live.pages_visited, 2);
        assert!((live.pages_per_minute - 2.0).abs() < 1e-9);
        assert!(!live.is_paused);

        state.check_idle(t0 + secs(200), THRESHOLD);
        let live = state.snapshot(t0 + secs(210)).unwrap();
        assert!(live.is_idle && live.is_paused);
        assert_eq!(live.idle_secs, 10);
    }
}
