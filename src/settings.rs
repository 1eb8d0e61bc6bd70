use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::timer::TimerConfig;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimerSettings {
    pub idle_threshold_secs: u64,
    pub idle_check_interval_secs: u64,
    pub stats_interval_secs: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self::from(TimerConfig::default())
    }
}

impl From<TimerConfig> for TimerSettings {
    fn from(config: TimerConfig) -> Self {
        Self {
            idle_threshold_secs: config.idle_threshold.as_secs(),
            idle_check_interval_secs: config.idle_check_interval.as_secs(),
            stats_interval_secs: config.stats_interval.as_secs(),
        }
    }
}

impl TimerSettings {
    /// Zero intervals are replaced by the defaults.
    pub fn to_config(self) -> TimerConfig {
        let defaults = TimerConfig::default();
        let or_default = |secs: u64, fallback: Duration| {
            if secs == 0 {
                fallback
            } else {
                Duration::from_secs(secs)
            }
        };
        TimerConfig {
            idle_threshold: or_default(self.idle_threshold_secs, defaults.idle_threshold),
            idle_check_interval: or_default(self.idle_check_interval_secs, defaults.idle_check_interval),
            stats_interval: or_default(self.stats_interval_secs, defaults.stats_interval),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerSettings {
    pub timer: TimerSettings,
    /// Finished sessions and stale goal progress older than this are purged on open.
    pub retention_days: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            timer: TimerSettings::default(),
            retention_days: 90,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<TrackerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("Ignoring unreadable settings at {}: {err}", path.display());
                TrackerSettings::default()
            })
        } else {
            TrackerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> TrackerSettings {
        self.read().clone()
    }

    pub fn timer(&self) -> TimerSettings {
        self.read().timer
    }

    pub fn retention_days(&self) -> u32 {
        self.read().retention_days
    }

    pub fn update_timer(&self, settings: TimerSettings) -> Result<()> {
        let mut guard = self.write();
        guard.timer = settings;
        self.persist(&guard)
    }

    pub fn update_retention_days(&self, days: u32) -> Result<()> {
        let mut guard = self.write();
        guard.retention_days = days;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: TrackerSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &TrackerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
