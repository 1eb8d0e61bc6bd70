use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How a goal is doing overall.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    OnTrack,
    SlightlyBehind,
    Behind,
    VeryBehind,
    Completed,
}

/// Per-goal label used in today's progress view of daily goals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DailyLabel {
    Completed,
    AlmostDone,
    Halfway,
    Started,
    NotStarted,
}

/// Share of daily goals met today.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    NoGoals,
    AllCompleted,
    MostlyCompleted,
    PartiallyCompleted,
    NoneCompleted,
}

/// `value` as a percentage of `target`; a zero target counts as done.
pub fn percent_of(value: u32, target: u32) -> f64 {
    if target == 0 {
        return 100.0;
    }
    value as f64 / target as f64 * 100.0
}

pub fn daily_status(percent: f64) -> GoalStatus {
    if percent >= 100.0 {
        GoalStatus::Completed
    } else if percent >= 75.0 {
        GoalStatus::OnTrack
    } else if percent >= 50.0 {
        GoalStatus::SlightlyBehind
    } else {
        GoalStatus::Behind
    }
}

/// Progress a deadline goal should have reached by `today`, in percent: days
/// elapsed since creation over days from creation to the deadline.
pub fn expected_progress(created_on: NaiveDate, deadline: NaiveDate, today: NaiveDate) -> f64 {
    let total_days = (deadline - created_on).num_days();
    if total_days <= 0 {
        return 100.0;
    }
    let elapsed_days = (today - created_on).num_days();
    (elapsed_days as f64 / total_days as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn deadline_status(
    actual_percent: f64,
    expected_percent: f64,
    deadline: NaiveDate,
    today: NaiveDate,
) -> GoalStatus {
    if actual_percent >= 100.0 {
        GoalStatus::Completed
    } else if today > deadline {
        GoalStatus::VeryBehind
    } else if actual_percent >= expected_percent {
        GoalStatus::OnTrack
    } else if actual_percent >= expected_percent * 0.8 {
        GoalStatus::SlightlyBehind
    } else {
        GoalStatus::Behind
    }
}

/// Pages a deadline goal trails its schedule by: the share of `total_pages`
/// expected by now, less what has been read.
pub fn pages_behind(total_pages: u64, pages_read: u64, expected_percent: f64) -> u64 {
    let expected_pages = (total_pages as f64 * expected_percent / 100.0).floor() as u64;
    expected_pages.saturating_sub(pages_read)
}

/// Pages per day that clear the remaining pages plus the backlog before the
/// deadline. With no days left everything remaining is due now.
pub fn adjusted_daily_target(pages_remaining: u64, pages_behind: u64, days_remaining: i64) -> u64 {
    match u64::try_from(days_remaining) {
        Ok(days) if days > 0 => (pages_remaining.saturating_add(pages_behind) / days).max(1),
        _ => pages_remaining,
    }
}

pub fn daily_label(target_met: bool, percent: f64) -> DailyLabel {
    if target_met || percent >= 100.0 {
        DailyLabel::Completed
    } else if percent >= 80.0 {
        DailyLabel::AlmostDone
    } else if percent >= 50.0 {
        DailyLabel::Halfway
    } else if percent > 0.0 {
        DailyLabel::Started
    } else {
        DailyLabel::NotStarted
    }
}

pub fn overall_status(met: usize, total: usize) -> OverallStatus {
    if total == 0 {
        OverallStatus::NoGoals
    } else if met == total {
        OverallStatus::AllCompleted
    } else if met as f64 >= total as f64 * 0.7 {
        OverallStatus::MostlyCompleted
    } else if met > 0 {
        OverallStatus::PartiallyCompleted
    } else {
        OverallStatus::NoneCompleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_status_thresholds() {
        assert_eq!(daily_status(100.0), GoalStatus::Completed);
        assert_eq!(daily_status(75.0), GoalStatus::OnTrack);
        assert_eq!(daily_status(74.9), GoalStatus::SlightlyBehind);
        assert_eq!(daily_status(50.0), GoalStatus::SlightlyBehind);
        assert_eq!(daily_status(10.0), GoalStatus::Behind);
    }

    #[test]
    fn expected_progress_is_elapsed_over_total_days() {
        let created = date(2024, 3, 1);
        let deadline = date(2024, 3, 11);

        assert_eq!(expected_progress(created, deadline, created), 0.0);
        assert_eq!(expected_progress(created, deadline, date(2024, 3, 6)), 50.0);
        assert_eq!(expected_progress(created, deadline, date(2024, 4, 1)), 100.0);
        assert_eq!(expected_progress(deadline, created, deadline), 100.0);
    }

    #[test]
    fn deadline_status_compares_against_expected() {
        let deadline = date(2024, 3, 11);
        let today = date(2024, 3, 6);

        assert_eq!(deadline_status(100.0, 50.0, deadline, today), GoalStatus::Completed);
        assert_eq!(deadline_status(55.0, 50.0, deadline, today), GoalStatus::OnTrack);
        assert_eq!(deadline_status(40.0, 50.0, deadline, today), GoalStatus::SlightlyBehind);
        assert_eq!(deadline_status(39.0, 50.0, deadline, today), GoalStatus::Behind);
        assert_eq!(
            deadline_status(99.0, 100.0, deadline, date(2024, 3, 12)),
            GoalStatus::VeryBehind
        );
    }

    #[test]
    fn schedule_gap_and_adjusted_target() {
        assert_eq!(pages_behind(100, 20, 50.0), 30);
        assert_eq!(pages_behind(100, 60, 50.0), 0);
        assert_eq!(pages_behind(7, 0, 50.0), 3);

        assert_eq!(adjusted_daily_target(100, 50, 5), 30);
        assert_eq!(adjusted_daily_target(80, 0, 10), 8);
        assert_eq!(adjusted_daily_target(3, 0, 10), 1);
        assert_eq!(adjusted_daily_target(40, 10, 0), 40);
        assert_eq!(adjusted_daily_target(40, 10, -3), 40);
    }

    #[test]
    fn daily_labels() {
        assert_eq!(daily_label(true, 20.0), DailyLabel::Completed);
        assert_eq!(daily_label(false, 80.0), DailyLabel::AlmostDone);
        assert_eq!(daily_label(false, 50.0), DailyLabel::Halfway);
        assert_eq!(daily_label(false, 1.0), DailyLabel::Started);
        assert_eq!(daily_label(false, 0.0), DailyLabel::NotStarted);
    }

    #[test]
    fn overall_status_buckets() {
        assert_eq!(overall_status(0, 0), OverallStatus::NoGoals);
        assert_eq!(overall_status(3, 3), OverallStatus::AllCompleted);
        assert_eq!(overall_status(7, 10), OverallStatus::MostlyCompleted);
        assert_eq!(overall_status(1, 3), OverallStatus::PartiallyCompleted);
        assert_eq!(overall_status(0, 2), OverallStatus::NoneCompleted);
    }
}
