//! Goal-related data models.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::document::TopicId;

pub type GoalId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    FinishByDate,
    DailyTime,
    DailyPages,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::FinishByDate => "finish_by_date",
            GoalType::DailyTime => "daily_time",
            GoalType::DailyPages => "daily_pages",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "finish_by_date" => Ok(GoalType::FinishByDate),
            "daily_time" => Ok(GoalType::DailyTime),
            "daily_pages" => Ok(GoalType::DailyPages),
            other => Err(anyhow!("unknown goal type {other}")),
        }
    }

    pub fn is_daily(&self) -> bool {
        !matches!(self, GoalType::FinishByDate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: GoalId,
    pub topic_id: TopicId,
    pub target_type: GoalType,
    /// Pages per day for `DailyPages`, minutes per day for `DailyTime`. For
    /// `FinishByDate` the pages per day last set by a behind-schedule adjustment.
    pub target_value: u32,
    pub deadline: Option<NaiveDate>,
    pub is_active: bool,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a goal; validated by the goals manager before insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub topic_id: TopicId,
    pub target_type: GoalType,
    pub target_value: u32,
    pub deadline: Option<NaiveDate>,
}

/// One goal's accumulated progress for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub goal_id: GoalId,
    pub date: NaiveDate,
    pub pages_read: u32,
    pub time_spent_minutes: u32,
    pub sessions_count: u32,
    pub target_met: bool,
}

/// Increment applied to every active goal of a topic after a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDelta {
    pub date: NaiveDate,
    pub pages: u32,
    pub minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAdjustment {
    pub goal_id: GoalId,
    pub adjusted_on: NaiveDate,
    pub old_target: u32,
    pub new_target: u32,
    pub reason: String,
    /// Set on automatic adjustments of deadline goals.
    pub schedule: Option<ScheduleGap>,
}

/// How far a deadline goal trailed its schedule when it was adjusted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleGap {
    pub pages_behind: u64,
    pub days_remaining: i64,
}

impl Goal {
    /// Whether a day's cumulative totals satisfy this goal's daily target.
    /// Deadline goals never meet a target through daily progress.
    pub fn daily_target_met(&self, pages_read: u32, minutes: u32) -> bool {
        match self.target_type {
            GoalType::DailyPages => pages_read >= self.target_value,
            GoalType::DailyTime => minutes >= self.target_value,
            GoalType::FinishByDate => false,
        }
    }
}
