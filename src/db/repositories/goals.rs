use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_date, parse_date, parse_datetime, parse_optional_date, parse_optional_datetime,
        to_i64, to_u32, to_u64,
    },
    models::{
        Goal, GoalAdjustment, GoalId, GoalProgress, GoalType, NewGoal, ProgressDelta,
        ScheduleGap, TopicId,
    },
};

const GOAL_COLUMNS: &str = "id, topic_id, target_type, target_value, deadline, is_active, is_completed,
     completed_at, created_at, updated_at";

fn row_to_goal(row: &Row) -> Result<Goal> {
    let target_type: String = row.get("target_type")?;
    let deadline: Option<String> = row.get("deadline")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Goal {
        id: row.get("id")?,
        topic_id: row.get("topic_id")?,
        target_type: GoalType::parse(&target_type)?,
        target_value: to_u32(row.get("target_value")?, "target_value")?,
        deadline: parse_optional_date(deadline, "deadline")?,
        is_active: row.get("is_active")?,
        is_completed: row.get("is_completed")?,
        completed_at: parse_optional_datetime(completed_at, "completed_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn row_to_progress(row: &Row) -> Result<GoalProgress> {
    let date: String = row.get("date")?;
    Ok(GoalProgress {
        goal_id: row.get("goal_id")?,
        date: parse_date(&date, "date")?,
        pages_read: to_u32(row.get("pages_read")?, "pages_read")?,
        time_spent_minutes: to_u32(row.get("time_spent_minutes")?, "time_spent_minutes")?,
        sessions_count: to_u32(row.get("sessions_count")?, "sessions_count")?,
        target_met: row.get("target_met")?,
    })
}

fn load_goal(conn: &Connection, goal_id: GoalId) -> Result<Option<Goal>> {
    let sql = format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![goal_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_goal(row)?)),
        None => Ok(None),
    }
}

fn load_active_goals(conn: &Connection, topic_id: Option<TopicId>) -> Result<Vec<Goal>> {
    let mut sql = format!(
        "SELECT {GOAL_COLUMNS} FROM goals
         WHERE is_active = 1 AND is_completed = 0"
    );
    if topic_id.is_some() {
        sql.push_str(" AND topic_id = ?1");
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = match topic_id {
        Some(topic_id) => stmt.query(params![topic_id])?,
        None => stmt.query([])?,
    };

    let mut goals = Vec::new();
    while let Some(row) = rows.next()? {
        goals.push(row_to_goal(row)?);
    }
    Ok(goals)
}

fn load_progress(conn: &Connection, goal_id: GoalId, date: NaiveDate) -> Result<Option<GoalProgress>> {
    let mut stmt = conn.prepare(
        "SELECT goal_id, date, pages_read, time_spent_minutes, sessions_count, target_met
         FROM goal_progress
         WHERE goal_id = ?1 AND date = ?2",
    )?;
    let mut rows = stmt.query(params![goal_id, format_date(date)])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_progress(row)?)),
        None => Ok(None),
    }
}

/// Add a session's pages and minutes to the goal's row for the day, creating
/// it when missing, and re-evaluate whether the day's target is met.
pub(crate) fn upsert_progress(conn: &Connection, goal: &Goal, delta: &ProgressDelta) -> Result<GoalProgress> {
    let now = Utc::now().to_rfc3339();
    let date = format_date(delta.date);

    conn.execute(
        "INSERT INTO goal_progress (goal_id, date, pages_read, time_spent_minutes, sessions_count, target_met, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, 0, ?5, ?6)
         ON CONFLICT (goal_id, date) DO UPDATE SET
            pages_read = goal_progress.pages_read + excluded.pages_read,
            time_spent_minutes = goal_progress.time_spent_minutes + excluded.time_spent_minutes,
            sessions_count = goal_progress.sessions_count + 1,
            updated_at = excluded.updated_at",
        params![goal.id, date, delta.pages, delta.minutes, now, now],
    )?;

    let mut progress = load_progress(conn, goal.id, delta.date)?
        .ok_or_else(|| anyhow!("goal progress row missing after upsert for goal {}", goal.id))?;

    if goal.target_type.is_daily() {
        let met = goal.daily_target_met(progress.pages_read, progress.time_spent_minutes);
        if met != progress.target_met {
            conn.execute(
                "UPDATE goal_progress SET target_met = ?1 WHERE goal_id = ?2 AND date = ?3",
                params![met, goal.id, date],
            )?;
            progress.target_met = met;
        }
    }

    Ok(progress)
}

impl Database {
    pub async fn insert_goal(&self, new_goal: NewGoal) -> Result<Goal> {
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO goals (topic_id, target_type, target_value, deadline, is_active, is_completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 1, 0, ?5, ?6)",
                params![
                    new_goal.topic_id,
                    new_goal.target_type.as_str(),
                    new_goal.target_value,
                    new_goal.deadline.map(format_date),
                    now,
                    now,
                ],
            )?;

            let goal_id = conn.last_insert_rowid();
            load_goal(conn, goal_id)?.ok_or_else(|| anyhow!("Goal not found after insert"))
        })
        .await
    }

    pub async fn get_goal(&self, goal_id: GoalId) -> Result<Option<Goal>> {
        self.execute(move |conn| load_goal(conn, goal_id)).await
    }

    /// Active, not yet completed goals, newest first.
    pub async fn get_active_goals(&self, topic_id: Option<TopicId>) -> Result<Vec<Goal>> {
        self.execute(move |conn| load_active_goals(conn, topic_id)).await
    }

    pub async fn upsert_goal_progress(&self, goal_id: GoalId, delta: ProgressDelta) -> Result<GoalProgress> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let goal = load_goal(&tx, goal_id)?.ok_or_else(|| anyhow!("Goal {goal_id} not found"))?;
            let progress = upsert_progress(&tx, &goal, &delta)?;
            tx.commit()?;
            Ok(progress)
        })
        .await
    }

    /// Apply one session's output to every active goal of the topic atomically.
    pub async fn record_topic_progress(
        &self,
        topic_id: TopicId,
        delta: ProgressDelta,
    ) -> Result<Vec<GoalProgress>> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let goals = load_active_goals(&tx, Some(topic_id))?;
            let mut rows = Vec::with_capacity(goals.len());
            for goal in &goals {
                rows.push(upsert_progress(&tx, goal, &delta)?);
            }
            tx.commit()?;
            Ok(rows)
        })
        .await
    }

    pub async fn get_goal_progress(&self, goal_id: GoalId, date: NaiveDate) -> Result<Option<GoalProgress>> {
        self.execute(move |conn| load_progress(conn, goal_id, date)).await
    }

    /// Progress rows dated on or after `since`, newest first.
    pub async fn get_goal_progress_history(
        &self,
        goal_id: GoalId,
        since: NaiveDate,
    ) -> Result<Vec<GoalProgress>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT goal_id, date, pages_read, time_spent_minutes, sessions_count, target_met
                 FROM goal_progress
                 WHERE goal_id = ?1 AND date >= ?2
                 ORDER BY date DESC",
            )?;
            let mut rows = stmt.query(params![goal_id, format_date(since)])?;
            let mut history = Vec::new();
            while let Some(row) = rows.next()? {
                history.push(row_to_progress(row)?);
            }
            Ok(history)
        })
        .await
    }

    pub async fn mark_goal_completed(&self, goal_id: GoalId) -> Result<()> {
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let rows_affected = conn.execute(
                "UPDATE goals
                 SET is_completed = 1, completed_at = ?1, updated_at = ?2
                 WHERE id = ?3",
                params![now, now, goal_id],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("Goal {goal_id} not found"));
            }
            Ok(())
        })
        .await
    }

    pub async fn deactivate_goal(&self, goal_id: GoalId) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE goals SET is_active = 0, updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), goal_id],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("Goal {goal_id} not found"));
            }
            Ok(())
        })
        .await
    }

    /// Change a goal's target and keep a record of the old and new values.
    pub async fn adjust_goal_target(
        &self,
        goal_id: GoalId,
        new_target: u32,
        reason: String,
        adjusted_on: NaiveDate,
        schedule: Option<ScheduleGap>,
    ) -> Result<GoalAdjustment> {
        let pages_behind = schedule.map(|gap| to_i64(gap.pages_behind)).transpose()?;
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let old_target: i64 = tx
                .query_row(
                    "SELECT target_value FROM goals WHERE id = ?1",
                    params![goal_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| anyhow!("Goal {goal_id} not found"))?;

            let now = Utc::now().to_rfc3339();
            tx.execute(
                "UPDATE goals SET target_value = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_target, now, goal_id],
            )?;
            tx.execute(
                "INSERT INTO goal_adjustments
                     (goal_id, adjusted_on, old_target, new_target, reason, pages_behind, days_remaining, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    goal_id,
                    format_date(adjusted_on),
                    old_target,
                    new_target,
                    reason,
                    pages_behind,
                    schedule.map(|gap| gap.days_remaining),
                    now
                ],
            )?;
            tx.commit()?;

            Ok(GoalAdjustment {
                goal_id,
                adjusted_on,
                old_target: to_u32(old_target, "target_value")?,
                new_target,
                reason,
                schedule,
            })
        })
        .await
    }

    pub async fn get_goal_adjustments(&self, goal_id: GoalId) -> Result<Vec<GoalAdjustment>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT adjusted_on, old_target, new_target, reason, pages_behind, days_remaining
                 FROM goal_adjustments
                 WHERE goal_id = ?1
                 ORDER BY adjusted_on DESC, id DESC",
            )?;
            let mut rows = stmt.query(params![goal_id])?;
            let mut adjustments = Vec::new();
            while let Some(row) = rows.next()? {
                let adjusted_on: String = row.get(0)?;
                let pages_behind: Option<i64> = row.get(4)?;
                let days_remaining: Option<i64> = row.get(5)?;
                let schedule = match (pages_behind, days_remaining) {
                    (Some(pages_behind), Some(days_remaining)) => Some(ScheduleGap {
                        pages_behind: to_u64(pages_behind, "pages_behind")?,
                        days_remaining,
                    }),
                    _ => None,
                };
                adjustments.push(GoalAdjustment {
                    goal_id,
                    adjusted_on: parse_date(&adjusted_on, "adjusted_on")?,
                    old_target: to_u32(row.get(1)?, "old_target")?,
                    new_target: to_u32(row.get(2)?, "new_target")?,
                    reason: row.get(3)?,
                    schedule,
                });
            }
            Ok(adjustments)
        })
        .await
    }
}
