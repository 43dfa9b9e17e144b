pub mod cache;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod llm;
pub mod report;
pub mod session;
pub mod source;
pub mod time;
pub mod view_model;

pub mod config {
    use crate::cache::StalePolicy;
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_DAILY_TTL_SECS: u64 = 3600;
    const DEFAULT_MACRO_TTL_SECS: u64 = 86_400;
    const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
    const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 90;
    const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub yahoo_base_url: Option<String>,
        pub fred_base_url: Option<String>,
        pub daily_ttl: Duration,
        pub macro_ttl: Duration,
        pub fetch_timeout: Duration,
        pub report_timeout: Duration,
        pub stale_policy: StalePolicy,
        pub utc_offset_hours: i32,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                anthropic_api_key: None,
                sentry_dsn: None,
                yahoo_base_url: None,
                fred_base_url: None,
                daily_ttl: Duration::from_secs(DEFAULT_DAILY_TTL_SECS),
                macro_ttl: Duration::from_secs(DEFAULT_MACRO_TTL_SECS),
                fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
                report_timeout: Duration::from_secs(DEFAULT_REPORT_TIMEOUT_SECS),
                stale_policy: StalePolicy::ServeStale,
                utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();
            Ok(Self {
                anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                yahoo_base_url: non_empty_var("YAHOO_BASE_URL"),
                fred_base_url: non_empty_var("FRED_BASE_URL"),
                daily_ttl: secs_var("RADAR_DAILY_TTL_SECS")?.unwrap_or(defaults.daily_ttl),
                macro_ttl: secs_var("RADAR_MACRO_TTL_SECS")?.unwrap_or(defaults.macro_ttl),
                fetch_timeout: secs_var("RADAR_FETCH_TIMEOUT_SECS")?
                    .unwrap_or(defaults.fetch_timeout),
                report_timeout: secs_var("RADAR_REPORT_TIMEOUT_SECS")?
                    .unwrap_or(defaults.report_timeout),
                stale_policy: match non_empty_var("RADAR_STALE_FALLBACK") {
                    Some(v) => parse_stale_policy(&v)?,
                    None => defaults.stale_policy,
                },
                utc_offset_hours: match non_empty_var("RADAR_UTC_OFFSET_HOURS") {
                    Some(v) => v
                        .parse::<i32>()
                        .with_context(|| format!("RADAR_UTC_OFFSET_HOURS is not an integer: {v}"))?,
                    None => defaults.utc_offset_hours,
                },
            })
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }
    }

    fn non_empty_var(name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn secs_var(name: &str) -> anyhow::Result<Option<Duration>> {
        let Some(raw) = non_empty_var(name) else {
            return Ok(None);
        };
        let secs = raw
            .parse::<u64>()
            .with_context(|| format!("{name} must be a whole number of seconds (got {raw})"))?;
        Ok(Some(Duration::from_secs(secs)))
    }

    fn parse_stale_policy(raw: &str) -> anyhow::Result<StalePolicy> {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(StalePolicy::ServeStale),
            "0" | "false" | "no" | "off" => Ok(StalePolicy::Propagate),
            other => anyhow::bail!("RADAR_STALE_FALLBACK must be a boolean (got {other})"),
        }
    }

}
