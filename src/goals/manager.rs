use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{
        Goal, GoalAdjustment, GoalId, GoalProgress, GoalType, NewGoal, ProgressDelta,
        ScheduleGap, TopicId,
    },
    store::StudyStore,
};

use super::{
    analytics::{self, TrendAnalysis},
    status::{self, DailyLabel, GoalStatus, OverallStatus},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub const MAX_DAILY_MINUTES: u32 = 480;
pub const MAX_DAILY_PAGES: u32 = 100;

/// Reason recorded with automatic adjustments of deadline goals.
pub const BEHIND_SCHEDULE: &str = "behind_schedule";

/// An active goal with its derived status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalOverview {
    #[serde(flatten)]
    pub goal: Goal,
    pub status: GoalStatus,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyGoalToday {
    pub goal: Goal,
    pub pages_read_today: u32,
    pub minutes_today: u32,
    pub target_met_today: bool,
    pub progress_percent: f64,
    pub status: DailyLabel,
}

/// Today's contribution towards a deadline goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineGoalToday {
    pub goal: Goal,
    pub pages_read_today: u32,
    pub minutes_today: u32,
    pub sessions_today: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayProgress {
    pub date: NaiveDate,
    pub daily_goals: Vec<DailyGoalToday>,
    pub deadline_goals: Vec<DeadlineGoalToday>,
    pub overall_status: OverallStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAnalytics {
    pub goal_id: GoalId,
    pub days: u32,
    /// Newest first.
    pub history: Vec<GoalProgress>,
    pub tracked_days: u32,
    pub days_target_met: u32,
    pub completion_rate: f64,
    pub current_streak: u32,
    pub average_daily_pages: f64,
    pub average_daily_minutes: f64,
    pub consistency_score: f64,
    pub trend: TrendAnalysis,
    pub adjustments: Vec<GoalAdjustment>,
}

/// What a goal asks of the reader today.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlan {
    pub goal_id: GoalId,
    pub target_type: GoalType,
    /// Pages (or minutes for `daily_time`) already done today.
    pub done_today: u32,
    /// Pages (or minutes for `daily_time`) still needed today.
    pub needed_today: u64,
    pub pages_remaining: Option<u64>,
    pub days_remaining: Option<i64>,
    /// Deadline goals only: pages below the expected progress for today.
    pub pages_behind: Option<u64>,
    /// Deadline goals only: pages per day that also catch up the backlog.
    pub adjusted_daily_target: Option<u64>,
    pub status: GoalStatus,
}

/// Where a deadline goal stands against its schedule on a given day.
#[derive(Debug, Clone, Copy)]
struct DeadlineOutlook {
    status: GoalStatus,
    percent: f64,
    pages_remaining: u64,
    days_remaining: i64,
    pages_behind: u64,
    adjusted_daily_target: u64,
}

/// Goal bookkeeping over a [`StudyStore`]. Holds no state of its own.
#[derive(Clone)]
pub struct GoalsManager {
    store: Arc<dyn StudyStore>,
}

impl GoalsManager {
    pub fn new(store: Arc<dyn StudyStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a goal. Returns `None` when the goal is rejected
    /// or cannot be stored.
    pub async fn create_goal(
        &self,
        topic_id: TopicId,
        target_type: GoalType,
        target_value: u32,
        deadline: Option<NaiveDate>,
    ) -> Option<GoalId> {
        let goal = NewGoal {
            topic_id,
            target_type,
            target_value,
            deadline,
        };
        match self.try_create_goal(goal, today()).await {
            Ok(goal) => {
                log_info!(
                    "created {} goal {} for topic {topic_id}",
                    target_type.as_str(),
                    goal.id
                );
                Some(goal.id)
            }
            Err(err) => {
                log_warn!("rejected {} goal for topic {topic_id}: {err:#}", target_type.as_str());
                None
            }
        }
    }

    async fn try_create_goal(&self, goal: NewGoal, today: NaiveDate) -> Result<Goal> {
        validate_goal(&goal, today)?;

        let existing = self.store.get_active_goals(Some(goal.topic_id)).await?;
        if existing.iter().any(|g| g.target_type == goal.target_type) {
            bail!(
                "an active {} goal already exists for topic {}",
                goal.target_type.as_str(),
                goal.topic_id
            );
        }

        self.store.create_goal(goal).await.context("failed to store goal")
    }

    /// Add a finished session's output to every active goal of the topic, then
    /// complete deadline goals whose documents are fully read and re-target
    /// the ones that fell behind schedule.
    pub async fn update_progress_after_session(
        &self,
        topic_id: TopicId,
        pages_read: u32,
        time_spent_secs: u64,
        date: NaiveDate,
    ) -> Result<Vec<GoalProgress>> {
        let delta = ProgressDelta {
            date,
            pages: pages_read,
            minutes: u32::try_from(time_spent_secs / 60).unwrap_or(u32::MAX),
        };
        let rows = self
            .store
            .record_topic_progress(topic_id, delta)
            .await
            .with_context(|| format!("failed to record progress for topic {topic_id}"))?;

        log_info!(
            "goal progress for topic {topic_id}: {} pages, {} min across {} goals",
            delta.pages,
            delta.minutes,
            rows.len()
        );

        self.complete_finished_deadline_goals(topic_id).await?;
        if let Err(err) = self.adjust_lagging_deadline_goals(topic_id, date).await {
            log_warn!("failed to check deadline goals of topic {topic_id}: {err:?}");
        }
        Ok(rows)
    }

    /// Raise the daily page target of deadline goals that are behind or very
    /// behind as of `today`. An adjustment is only recorded when the target
    /// actually changes.
    async fn adjust_lagging_deadline_goals(&self, topic_id: TopicId, today: NaiveDate) -> Result<()> {
        let goals = self.store.get_active_goals(Some(topic_id)).await?;
        for goal in goals
            .iter()
            .filter(|g| g.target_type == GoalType::FinishByDate && !g.is_completed)
        {
            let outlook = self.deadline_outlook(goal, today).await?;
            if !matches!(outlook.status, GoalStatus::Behind | GoalStatus::VeryBehind) {
                continue;
            }
            let new_target = u32::try_from(outlook.adjusted_daily_target).unwrap_or(u32::MAX);
            if new_target == goal.target_value {
                continue;
            }

            let gap = ScheduleGap {
                pages_behind: outlook.pages_behind,
                days_remaining: outlook.days_remaining,
            };
            self.store
                .adjust_goal(goal.id, new_target, BEHIND_SCHEDULE.into(), today, Some(gap))
                .await?;
            log_info!(
                "deadline goal {} is {} pages behind with {} days left, target {} -> {new_target} pages/day",
                goal.id,
                gap.pages_behind,
                gap.days_remaining,
                goal.target_value
            );
        }
        Ok(())
    }

    async fn complete_finished_deadline_goals(&self, topic_id: TopicId) -> Result<()> {
        let goals = self.store.get_active_goals(Some(topic_id)).await?;
        if !goals.iter().any(|g| g.target_type == GoalType::FinishByDate) {
            return Ok(());
        }

        let progress = self.store.get_document_progress(topic_id).await?;
        if progress.percent().unwrap_or(0.0) < 100.0 {
            return Ok(());
        }

        for goal in goals.iter().filter(|g| g.target_type == GoalType::FinishByDate) {
            self.store.complete_goal(goal.id).await?;
            log_info!("deadline goal {} completed, topic {topic_id} fully read", goal.id);
        }
        Ok(())
    }

    /// Active, not completed goals with their status, newest first.
    pub async fn get_active_goals(&self, topic_id: Option<TopicId>) -> Vec<GoalOverview> {
        match self.active_goals(topic_id, today()).await {
            Ok(goals) => goals,
            Err(err) => {
                log_error!("failed to load active goals: {err:?}");
                Vec::new()
            }
        }
    }

    async fn active_goals(&self, topic_id: Option<TopicId>, today: NaiveDate) -> Result<Vec<GoalOverview>> {
        let goals = self.store.get_active_goals(topic_id).await?;
        let mut overviews = Vec::with_capacity(goals.len());
        for goal in goals {
            let (status, progress_percent) = self.evaluate(&goal, today).await?;
            overviews.push(GoalOverview {
                goal,
                status,
                progress_percent,
            });
        }
        Ok(overviews)
    }

    /// Status and percentage of one goal as of `today`.
    async fn evaluate(&self, goal: &Goal, today: NaiveDate) -> Result<(GoalStatus, f64)> {
        if goal.is_completed {
            return Ok((GoalStatus::Completed, 100.0));
        }

        match goal.target_type {
            GoalType::FinishByDate => {
                let outlook = self.deadline_outlook(goal, today).await?;
                Ok((outlook.status, outlook.percent))
            }
            GoalType::DailyPages | GoalType::DailyTime => {
                let done = self.done_today(goal, today).await?;
                let percent = status::percent_of(done, goal.target_value);
                Ok((status::daily_status(percent), percent.min(100.0)))
            }
        }
    }

    async fn deadline_outlook(&self, goal: &Goal, today: NaiveDate) -> Result<DeadlineOutlook> {
        let Some(deadline) = goal.deadline else {
            bail!("deadline goal {} has no deadline", goal.id);
        };
        let progress = self.store.get_document_progress(goal.topic_id).await?;
        let percent = progress.percent().unwrap_or(0.0);
        let expected = status::expected_progress(goal.created_at.date_naive(), deadline, today);

        let pages_remaining = progress.total_pages.saturating_sub(progress.pages_read);
        let days_remaining = (deadline - today).num_days();
        let pages_behind = status::pages_behind(progress.total_pages, progress.pages_read, expected);

        Ok(DeadlineOutlook {
            status: status::deadline_status(percent, expected, deadline, today),
            percent,
            pages_remaining,
            days_remaining,
            pages_behind,
            adjusted_daily_target: status::adjusted_daily_target(
                pages_remaining,
                pages_behind,
                days_remaining,
            ),
        })
    }

    async fn done_today(&self, goal: &Goal, today: NaiveDate) -> Result<u32> {
        let row = self.store.get_goal_progress(goal.id, today).await?;
        Ok(row
            .map(|row| match goal.target_type {
                GoalType::DailyTime => row.time_spent_minutes,
                _ => row.pages_read,
            })
            .unwrap_or(0))
    }

    pub async fn get_today_progress(&self, topic_id: Option<TopicId>) -> Option<TodayProgress> {
        match self.today_progress(topic_id, today()).await {
            Ok(progress) => Some(progress),
            Err(err) => {
                log_error!("failed to load today's goal progress: {err:?}");
                None
            }
        }
    }

    async fn today_progress(&self, topic_id: Option<TopicId>, today: NaiveDate) -> Result<TodayProgress> {
        let goals = self.store.get_active_goals(topic_id).await?;
        let mut daily_goals = Vec::new();
        let mut deadline_goals = Vec::new();

        for goal in goals {
            let row = self.store.get_goal_progress(goal.id, today).await?;
            let pages = row.as_ref().map(|r| r.pages_read).unwrap_or(0);
            let minutes = row.as_ref().map(|r| r.time_spent_minutes).unwrap_or(0);

            match goal.target_type {
                GoalType::FinishByDate => deadline_goals.push(DeadlineGoalToday {
                    pages_read_today: pages,
                    minutes_today: minutes,
                    sessions_today: row.as_ref().map(|r| r.sessions_count).unwrap_or(0),
                    goal,
                }),
                GoalType::DailyPages | GoalType::DailyTime => {
                    let done = if goal.target_type == GoalType::DailyTime {
                        minutes
                    } else {
                        pages
                    };
                    let met = row.as_ref().map(|r| r.target_met).unwrap_or(false);
                    let percent = status::percent_of(done, goal.target_value);
                    daily_goals.push(DailyGoalToday {
                        pages_read_today: pages,
                        minutes_today: minutes,
                        target_met_today: met,
                        progress_percent: percent.min(100.0),
                        status: status::daily_label(met, percent),
                        goal,
                    });
                }
            }
        }

        let met = daily_goals.iter().filter(|g| g.target_met_today).count();
        let overall_status = status::overall_status(met, daily_goals.len());

        Ok(TodayProgress {
            date: today,
            daily_goals,
            deadline_goals,
            overall_status,
        })
    }

    /// Day-by-day history of the trailing `days` days plus summary figures.
    pub async fn get_goal_analytics(&self, goal_id: GoalId, days: u32) -> Option<GoalAnalytics> {
        match self.goal_analytics(goal_id, days, today()).await {
            Ok(analytics) => Some(analytics),
            Err(err) => {
                log_error!("failed to build analytics for goal {goal_id}: {err:?}");
                None
            }
        }
    }

    async fn goal_analytics(&self, goal_id: GoalId, days: u32, today: NaiveDate) -> Result<GoalAnalytics> {
        let since = today - Duration::days(days as i64);
        let history = self.store.get_goal_progress_history(goal_id, since).await?;
        let adjustments = self.store.get_goal_adjustments(goal_id).await?;

        Ok(GoalAnalytics {
            goal_id,
            days,
            tracked_days: history.len() as u32,
            days_target_met: history.iter().filter(|d| d.target_met).count() as u32,
            completion_rate: analytics::completion_rate(&history),
            current_streak: analytics::current_streak(&history),
            average_daily_pages: analytics::average_daily_pages(&history),
            average_daily_minutes: analytics::average_daily_minutes(&history),
            consistency_score: analytics::consistency_score(&history),
            trend: analytics::analyze_trend(&history),
            history,
            adjustments,
        })
    }

    pub async fn get_daily_plan(&self, goal_id: GoalId) -> Option<DailyPlan> {
        match self.daily_plan(goal_id, today()).await {
            Ok(plan) => plan,
            Err(err) => {
                log_error!("failed to build daily plan for goal {goal_id}: {err:?}");
                None
            }
        }
    }

    async fn daily_plan(&self, goal_id: GoalId, today: NaiveDate) -> Result<Option<DailyPlan>> {
        let Some(goal) = self.store.get_goal(goal_id).await? else {
            return Ok(None);
        };
        let (status, _) = self.evaluate(&goal, today).await?;

        let plan = match goal.target_type {
            GoalType::DailyPages | GoalType::DailyTime => {
                let done = self.done_today(&goal, today).await?;
                DailyPlan {
                    goal_id,
                    target_type: goal.target_type,
                    done_today: done,
                    needed_today: goal.target_value.saturating_sub(done) as u64,
                    pages_remaining: None,
                    days_remaining: None,
                    pages_behind: None,
                    adjusted_daily_target: None,
                    status,
                }
            }
            GoalType::FinishByDate => {
                let outlook = self.deadline_outlook(&goal, today).await?;
                let remaining = outlook.pages_remaining;
                let needed_today = match u64::try_from(outlook.days_remaining) {
                    Ok(days) if days > 0 => remaining.div_ceil(days),
                    _ => remaining,
                };
                let done_today = self
                    .store
                    .get_goal_progress(goal_id, today)
                    .await?
                    .map(|row| row.pages_read)
                    .unwrap_or(0);

                DailyPlan {
                    goal_id,
                    target_type: goal.target_type,
                    done_today,
                    needed_today,
                    pages_remaining: Some(remaining),
                    days_remaining: Some(outlook.days_remaining),
                    pages_behind: Some(outlook.pages_behind),
                    adjusted_daily_target: Some(outlook.adjusted_daily_target),
                    status,
                }
            }
        };
        Ok(Some(plan))
    }

    pub async fn complete_goal(&self, goal_id: GoalId) -> Result<()> {
        self.store.complete_goal(goal_id).await?;
        log_info!("completed goal {goal_id}");
        Ok(())
    }

    pub async fn deactivate_goal(&self, goal_id: GoalId) -> Result<()> {
        self.store.deactivate_goal(goal_id).await?;
        log_info!("deactivated goal {goal_id}");
        Ok(())
    }

    /// Change a goal's target, keeping the old value in the adjustment history.
    pub async fn adjust_goal(
        &self,
        goal_id: GoalId,
        new_target: u32,
        reason: impl Into<String>,
    ) -> Result<GoalAdjustment> {
        let Some(goal) = self.store.get_goal(goal_id).await? else {
            bail!("goal {goal_id} not found");
        };
        validate_target(goal.target_type, new_target)?;

        let adjustment = self
            .store
            .adjust_goal(goal_id, new_target, reason.into(), today(), None)
            .await?;
        log_info!(
            "adjusted goal {goal_id}: {} -> {} ({})",
            adjustment.old_target,
            adjustment.new_target,
            adjustment.reason
        );
        Ok(adjustment)
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn validate_goal(goal: &NewGoal, today: NaiveDate) -> Result<()> {
    validate_target(goal.target_type, goal.target_value)?;
    match (goal.target_type, goal.deadline) {
        (GoalType::FinishByDate, None) => bail!("finish_by_date goals need a deadline"),
        (GoalType::FinishByDate, Some(deadline)) if deadline <= today => {
            bail!("deadline {deadline} is not in the future")
        }
        (GoalType::DailyPages | GoalType::DailyTime, Some(_)) => {
            bail!("daily goals take no deadline")
        }
        _ => Ok(()),
    }
}

fn validate_target(target_type: GoalType, target_value: u32) -> Result<()> {
    match target_type {
        GoalType::FinishByDate => Ok(()),
        _ if target_value == 0 => bail!("daily targets must be positive"),
        GoalType::DailyTime if target_value > MAX_DAILY_MINUTES => {
            bail!("daily time target above {MAX_DAILY_MINUTES} minutes")
        }
        GoalType::DailyPages if target_value > MAX_DAILY_PAGES => {
            bail!("daily pages target above {MAX_DAILY_PAGES} pages")
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_goal(target_type: GoalType, target_value: u32, deadline: Option<NaiveDate>) -> NewGoal {
        NewGoal {
            topic_id: 1,
            target_type,
            target_value,
            deadline,
        }
    }

    #[test]
    fn goal_validation() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let tomorrow = today.succ_opt().unwrap();

        assert!(validate_goal(&new_goal(GoalType::DailyPages, 10, None), today).is_ok());
        assert!(validate_goal(&new_goal(GoalType::DailyPages, 0, None), today).is_err());
        assert!(validate_goal(&new_goal(GoalType::DailyPages, 101, None), today).is_err());
        assert!(validate_goal(&new_goal(GoalType::DailyTime, 480, None), today).is_ok());
        assert!(validate_goal(&new_goal(GoalType::DailyTime, 481, None), today).is_err());
        assert!(validate_goal(&new_goal(GoalType::DailyTime, 30, Some(tomorrow)), today).is_err());

        assert!(validate_goal(&new_goal(GoalType::FinishByDate, 0, Some(tomorrow)), today).is_ok());
        assert!(validate_goal(&new_goal(GoalType::FinishByDate, 0, Some(today)), today).is_err());
        assert!(validate_goal(&new_goal(GoalType::FinishByDate, 0, None), today).is_err());
    }
}
