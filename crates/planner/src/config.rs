//! Runtime configuration read from the environment.

use std::{env, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::athlete::seasons::SEASON_LIMIT_DAYS;

pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Root holding one directory per athlete.
    pub data_dir: PathBuf,
    pub athlete: String,
    /// How far past today scheduled workouts are loaded.
    pub lookahead_days: i64,
    /// Longest span a season may have before it is split.
    pub season_limit_days: i64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let home = env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
        Self {
            data_dir: home.join("sports-planner"),
            athlete: "athlete".to_string(),
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            season_limit_days: SEASON_LIMIT_DAYS,
        }
    }
}

impl PlannerConfig {
    /// Reads `PLANNER_DATA_DIR`, `PLANNER_ATHLETE`, `PLANNER_LOOKAHEAD_DAYS`
    /// and `PLANNER_SEASON_LIMIT_DAYS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var_os("PLANNER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            athlete: env::var("PLANNER_ATHLETE").unwrap_or(defaults.athlete),
            lookahead_days: parse_days(
                env::var("PLANNER_LOOKAHEAD_DAYS").ok(),
                defaults.lookahead_days,
            ),
            season_limit_days: parse_days(
                env::var("PLANNER_SEASON_LIMIT_DAYS").ok(),
                defaults.season_limit_days,
            ),
        }
    }

    pub fn athlete_dir(&self) -> PathBuf {
        self.data_dir.join(&self.athlete)
    }

    pub fn activities_dir(&self) -> PathBuf {
        self.athlete_dir().join("activities")
    }

    pub fn workouts_dir(&self) -> PathBuf {
        self.athlete_dir().join("workouts")
    }
}

/// A day count from the environment. Unparseable or negative values fall
/// back to `default`.
fn parse_days(raw: Option<String>, default: i64) -> i64 {
    match raw.as_deref().map(str::parse::<i64>) {
        Some(Ok(days)) if days >= 0 => days,
        Some(_) => {
            warn!("Ignoring invalid day count {raw:?}, using {default}");
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_counts_must_be_non_negative() {
        assert_eq!(parse_days(Some("90".into()), 730), 90);
        assert_eq!(parse_days(Some("0".into()), 730), 0);
        assert_eq!(parse_days(Some("-1".into()), 730), 730);
        assert_eq!(parse_days(Some("soon".into()), 60), 60);
        assert_eq!(parse_days(None, 60), 60);
    }

    #[test]
    fn test_directory_layout() {
        let config = PlannerConfig {
            data_dir: PathBuf::from("/data"),
            athlete: "jo@example.com".into(),
            ..PlannerConfig::default()
        };
        assert_eq!(
            config.activities_dir(),
            PathBuf::from("/data/jo@example.com/activities")
        );
        assert_eq!(
            config.workouts_dir(),
            PathBuf::from("/data/jo@example.com/workouts")
        );
        assert_eq!(config.season_limit_days, 730);
    }
}
