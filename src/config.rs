use std::{env, path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub data_dir: PathBuf,
    pub refresh_interval: Duration,
    pub confirm_ticks: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("data/rooms"),
            refresh_interval: Duration::from_secs(60),
            confirm_ticks: 5,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parse_var("PORT").unwrap_or(defaults.port),
            data_dir: env::var("APP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            refresh_interval: parse_var("BABY_STATS_REFRESH_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_interval),
            confirm_ticks: parse_var("BABY_STATS_CONFIRM_TICKS")
                .filter(|ticks| *ticks > 0)
                .unwrap_or(defaults.confirm_ticks),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(%name, %value, "ignoring unparsable setting");
            None
        }
    }
}
