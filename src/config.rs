//! Application-level configuration loading: vote windows, trending tuning and the admin token.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "VENUESCOPE_CONFIG_PATH";
/// Environment variable that overrides the admin token from the file.
const ADMIN_TOKEN_ENV: &str = "VENUESCOPE_ADMIN_TOKEN";

const DEFAULT_VOTE_WINDOW_HOURS: u64 = 24;
const DEFAULT_MATCH_DURATION_MINUTES: u64 = 120;
const DEFAULT_TRENDING_HALF_LIFE_HOURS: f64 = 24.0;
const DEFAULT_RECENT_POSTS_LIMIT: usize = 100;
const DEFAULT_TRENDING_LIMIT: usize = 10;
const DEFAULT_MAX_TRENDING_LIMIT: usize = 50;
const DEFAULT_VOTE_POINTS: i32 = 5;

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// How long a module stays open after kickoff.
    pub vote_window: Duration,
    /// Length of a match, used to classify fixtures as live.
    pub match_duration: Duration,
    /// Age at which a post's trending weight halves.
    pub trending_half_life_hours: f64,
    /// Number of recent posts fetched before ranking.
    pub recent_posts_limit: usize,
    pub default_trending_limit: usize,
    pub max_trending_limit: usize,
    /// Points credited to a user for a recorded vote.
    pub vote_points: i32,
    /// Shared secret expected in `X-Admin-Token`; admin routes are closed when unset.
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_admin_token_override(env::var(ADMIN_TOKEN_ENV).ok())
    }

    /// Replace the admin token when `token` is a non-empty value.
    fn with_admin_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|value| !value.trim().is_empty()) {
            self.admin_token = Some(token);
        }
        if self.admin_token.is_none() {
            warn!("no admin token configured; admin and cron routes are disabled");
        }
        self
    }

    /// Clamp a requested trending page size to `[1, max_trending_limit]`.
    pub fn trending_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_trending_limit)
            .clamp(1, self.max_trending_limit.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    vote_window_hours: Option<u64>,
    match_duration_minutes: Option<u64>,
    trending_half_life_hours: Option<f64>,
    recent_posts_limit: Option<usize>,
    default_trending_limit: Option<usize>,
    max_trending_limit: Option<usize>,
    vote_points: Option<i32>,
    admin_token: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let half_life = value
            .trending_half_life_hours
            .filter(|hours| hours.is_finite() && *hours > 0.0)
            .unwrap_or(DEFAULT_TRENDING_HALF_LIFE_HOURS);

        Self {
            vote_window: scaled_duration(
                "vote_window_hours",
                value.vote_window_hours,
                DEFAULT_VOTE_WINDOW_HOURS,
                3600,
            ),
            match_duration: scaled_duration(
                "match_duration_minutes",
                value.match_duration_minutes,
                DEFAULT_MATCH_DURATION_MINUTES,
                60,
            ),
            trending_half_life_hours: half_life,
            recent_posts_limit: value
                .recent_posts_limit
                .unwrap_or(DEFAULT_RECENT_POSTS_LIMIT),
            default_trending_limit: value
                .default_trending_limit
                .unwrap_or(DEFAULT_TRENDING_LIMIT),
            max_trending_limit: value
                .max_trending_limit
                .unwrap_or(DEFAULT_MAX_TRENDING_LIMIT),
            vote_points: value.vote_points.unwrap_or(DEFAULT_VOTE_POINTS),
            admin_token: value.admin_token.filter(|token| !token.trim().is_empty()),
        }
    }
}

/// `amount` units of `unit_secs` seconds; an overflowing product falls back to `default`.
fn scaled_duration(key: &str, amount: Option<u64>, default: u64, unit_secs: u64) -> Duration {
    let amount = amount.unwrap_or(default);
    match amount.checked_mul(unit_secs) {
        Some(secs) => Duration::from_secs(secs),
        None => {
            warn!(key, amount, "configured duration overflows; falling back to default");
            Duration::from_secs(default * unit_secs)
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.vote_window, Duration::from_secs(24 * 3600));
        assert_eq!(config.match_duration, Duration::from_secs(120 * 60));
        assert_eq!(config.admin_token, None);
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"vote_window_hours": 2, "admin_token": "s3cret"}"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.vote_window, Duration::from_secs(7200));
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.recent_posts_limit, DEFAULT_RECENT_POSTS_LIMIT);
    }

    #[test]
    fn non_positive_half_life_falls_back() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"trending_half_life_hours": 0.0}"#).unwrap();
        assert_eq!(
            AppConfig::from(raw).trending_half_life_hours,
            DEFAULT_TRENDING_HALF_LIFE_HOURS
        );
    }

    #[test]
    fn overflowing_durations_fall_back_to_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "vote_window_hours": 18446744073709551615,
                "match_duration_minutes": 18446744073709551615
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.vote_window, Duration::from_secs(DEFAULT_VOTE_WINDOW_HOURS * 3600));
        assert_eq!(
            config.match_duration,
            Duration::from_secs(DEFAULT_MATCH_DURATION_MINUTES * 60)
        );
    }

    #[test]
    fn env_token_wins_unless_blank() {
        let config = AppConfig {
            admin_token: Some("file".into()),
            ..AppConfig::default()
        };

        let overridden = config.clone().with_admin_token_override(Some("env".into()));
        assert_eq!(overridden.admin_token.as_deref(), Some("env"));

        let kept = config.with_admin_token_override(Some("  ".into()));
        assert_eq!(kept.admin_token.as_deref(), Some("file"));
    }

    #[test]
    fn trending_limit_is_clamped() {
        let config = AppConfig::default();
        assert_eq!(config.trending_limit(None), DEFAULT_TRENDING_LIMIT);
        assert_eq!(config.trending_limit(Some(0)), 1);
        assert_eq!(config.trending_limit(Some(500)), DEFAULT_MAX_TRENDING_LIMIT);
        assert_eq!(config.trending_limit(Some(7)), 7);
    }
}
