use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::game_logs::BREF_GAME_LOG_URL;
use crate::http_client::REQUEST_TIMEOUT_SECS;
use crate::lineups::LINEUPS_BASE_URL;
use crate::pacing::DEFAULT_REQUESTS_PER_MINUTE;
use crate::retry::{DEFAULT_RETRY_DELAY, RetryPolicy};
use crate::season::{SeasonCalendar, SeasonDates};
use crate::stats_fetch::BREF_DAILY_URL;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub lineups_base_url: String,
    pub stats_base_url: String,
    pub game_log_base_url: String,
    pub request_timeout_secs: u64,
    pub requests_per_minute: u32,
    pub retry_delay_secs: u64,
    pub retry_max_attempts: Option<u32>,
    pub response_cache: bool,
    pub cache_dir: Option<PathBuf>,
    pub egress_pool: Option<PathBuf>,
    pub artifact_dir: PathBuf,
    pub outcomes: Vec<String>,
    pub seasons: BTreeMap<i32, SeasonDates>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lineups_base_url: LINEUPS_BASE_URL.to_string(),
            stats_base_url: BREF_DAILY_URL.to_string(),
            game_log_base_url: BREF_GAME_LOG_URL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            retry_max_attempts: None,
            response_cache: true,
            cache_dir: None,
            egress_pool: None,
            artifact_dir: PathBuf::from("data"),
            outcomes: vec!["R".to_string()],
            seasons: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| env::var(key).ok())
    }

    pub fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = text("LINEUPS_BASE_URL") {
            self.lineups_base_url = url;
        }
        if let Some(url) = text("LINEUPS_STATS_URL") {
            self.stats_base_url = url;
        }
        self.request_timeout_secs = text("LINEUPS_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(self.request_timeout_secs)
            .max(1);
        self.requests_per_minute = text("LINEUPS_REQUESTS_PER_MINUTE")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(self.requests_per_minute)
            .clamp(1, 600);
        self.retry_delay_secs = text("LINEUPS_RETRY_DELAY_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(self.retry_delay_secs);
        if let Some(max) = text("LINEUPS_RETRY_MAX_ATTEMPTS") {
            // 0 means unbounded.
            self.retry_max_attempts = max.parse::<u32>().ok().filter(|n| *n > 0);
        }
        self.response_cache = env_bool(&var, "LINEUPS_HTTP_CACHE", self.response_cache);
        if let Some(dir) = text("LINEUPS_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = text("LINEUPS_EGRESS_POOL") {
            self.egress_pool = Some(PathBuf::from(path));
        }
        if let Some(dir) = text("LINEUPS_ARTIFACT_DIR") {
            self.artifact_dir = PathBuf::from(dir);
        }
        if let Some(list) = text("LINEUPS_OUTCOMES") {
            let outcomes = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();
            if !outcomes.is_empty() {
                self.outcomes = outcomes;
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_secs(self.retry_delay_secs),
            max_attempts: self.retry_max_attempts,
        }
    }

    pub fn calendar(&self) -> SeasonCalendar {
        self.seasons
            .iter()
            .fold(SeasonCalendar::default(), |cal, (year, dates)| {
                cal.with_season(*year, *dates)
            })
    }
}

fn env_bool(var: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    var(key)
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}
