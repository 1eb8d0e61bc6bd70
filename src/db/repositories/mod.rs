pub mod documents;
pub mod goals;
pub mod maintenance;
pub mod page_times;
pub mod reading_metrics;
pub mod sessions;

pub use maintenance::CleanupReport;
