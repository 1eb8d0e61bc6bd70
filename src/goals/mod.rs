pub mod analytics;
mod manager;
pub mod status;

pub use analytics::{Trend, TrendAnalysis};
pub use manager::{
    DailyGoalToday, DailyPlan, DeadlineGoalToday, GoalAnalytics, GoalOverview, GoalsManager,
    TodayProgress, BEHIND_SCHEDULE, MAX_DAILY_MINUTES, MAX_DAILY_PAGES,
};
pub use status::{DailyLabel, GoalStatus, OverallStatus};
