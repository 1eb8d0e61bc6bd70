//! Summary figures over a goal's daily progress rows. All functions expect the
//! rows newest first, as the store returns them.

use serde::{Deserialize, Serialize};

use crate::db::models::GoalProgress;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub trend: Trend,
    pub change_percent: f64,
    pub recent_average: f64,
    pub earlier_average: f64,
}

/// Consecutive days, from the most recent one backwards, on which the target was met.
pub fn current_streak(history: &[GoalProgress]) -> u32 {
    history.iter().take_while(|day| day.target_met).count() as u32
}

pub fn completion_rate(history: &[GoalProgress]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let met = history.iter().filter(|day| day.target_met).count();
    met as f64 / history.len() as f64 * 100.0
}

pub fn average_daily_pages(history: &[GoalProgress]) -> f64 {
    mean(history.iter().map(|day| day.pages_read as f64))
}

pub fn average_daily_minutes(history: &[GoalProgress]) -> f64 {
    mean(history.iter().map(|day| day.time_spent_minutes as f64))
}

/// 100 minus half the coefficient of variation of daily pages, in percent
/// points, floored at zero. Needs at least two days.
pub fn consistency_score(history: &[GoalProgress]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let pages: Vec<f64> = history.iter().map(|day| day.pages_read as f64).collect();
    let mean_pages = mean(pages.iter().copied());
    if mean_pages == 0.0 {
        return 0.0;
    }
    let variance = mean(pages.iter().map(|p| (p - mean_pages).powi(2)));
    let cv = variance.sqrt() / mean_pages;
    (100.0 - cv * 50.0).max(0.0)
}

/// Compare the recent half of the window with the earlier half.
pub fn analyze_trend(history: &[GoalProgress]) -> TrendAnalysis {
    if history.len() < 3 {
        return TrendAnalysis {
            trend: Trend::InsufficientData,
            change_percent: 0.0,
            recent_average: 0.0,
            earlier_average: 0.0,
        };
    }

    let (recent, earlier) = history.split_at(history.len() / 2);
    let recent_average = average_daily_pages(recent);
    let earlier_average = average_daily_pages(earlier);

    let trend = if recent_average > earlier_average * 1.1 {
        Trend::Improving
    } else if recent_average < earlier_average * 0.9 {
        Trend::Declining
    } else {
        Trend::Stable
    };
    let change_percent = if earlier_average > 0.0 {
        (recent_average - earlier_average) / earlier_average * 100.0
    } else {
        0.0
    };

    TrendAnalysis {
        trend,
        change_percent: round1(change_percent),
        recent_average: round1(recent_average),
        earlier_average: round1(earlier_average),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
