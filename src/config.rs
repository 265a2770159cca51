use std::path::PathBuf;

use chrono::{Local, NaiveDate};

pub const DATA_DIR_ENV: &str = "ATTENDANCE_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = ".attendance";

/// Runtime settings resolved from flags, then environment, then defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub data_dir: PathBuf,
    pub today: NaiveDate,
}

impl TrackerConfig {
    pub fn resolve(data_dir: Option<PathBuf>, today: Option<NaiveDate>) -> Self {
        Self::resolve_with(data_dir, std::env::var(DATA_DIR_ENV).ok(), today)
    }

    fn resolve_with(
        data_dir: Option<PathBuf>,
        env_dir: Option<String>,
        today: Option<NaiveDate>,
    ) -> Self {
        let data_dir = data_dir
            .or_else(|| env_dir.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Self {
            data_dir,
            today: today.unwrap_or_else(|| Local::now().date_naive()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn flag_wins_over_environment() {
        let config = TrackerConfig::resolve_with(
            Some(PathBuf::from("/tmp/flag")),
            Some("/tmp/env".to_string()),
            Some(date(2026, 10, 19)),
        );
        assert_eq!(config.data_dir, PathBuf::from("/tmp/flag"));
        assert_eq!(config.today, date(2026, 10, 19));
    }

    #[test]
    fn environment_then_default() {
        let config = TrackerConfig::resolve_with(None, Some("/tmp/env".to_string()), None);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/env"));

        let config = TrackerConfig::resolve_with(None, Some("  ".to_string()), None);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }
}
