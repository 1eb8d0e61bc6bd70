pub mod document;
pub mod goal;
pub mod metric;
pub mod session;

pub use document::{DocumentInfo, DocumentProgress, DocumentRef, Topic, TopicId};
pub use goal::{
    Goal, GoalAdjustment, GoalId, GoalProgress, GoalType, NewGoal, ProgressDelta, ScheduleGap,
};
pub use metric::{MetricSubject, ReadingMetric};
pub use session::{
    efficiency_percent, DailyReadingStats, MetricSample, PageTimeRecord, Session, SessionClose,
    SessionId, SessionRefs, SessionStats, SessionStatus,
};
