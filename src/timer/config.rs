use std::time::Duration;

/// Tunables of the session timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// No interaction for this long turns the session idle.
    pub idle_threshold: Duration,
    pub idle_check_interval: Duration,
    /// Period of the live `stats-updated` broadcast.
    pub stats_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            idle_threshold: Duration::from_secs(120),
            idle_check_interval: Duration::from_secs(1),
            stats_interval: Duration::from_secs(3),
        }
    }
}

impl TimerConfig {
    /// Defaults, with `STUDYTRACK_DEBUG=1` speeding up the stats broadcast.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        let debug_mode = std::env::var("STUDYTRACK_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if debug_mode {
            self.stats_interval = Duration::from_secs(1);
        }
        self
    }
}
