use anyhow::{Context, Result, bail, ensure};
use chrono::FixedOffset;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use super::instrument::{Instrument, default_basket};
use super::resilience::{Backoff, RetryPolicy};

/// Upper bound for every configured timeout and retry delay.
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;
/// Upper bound for the half-width of the first historical lookup window.
pub const MAX_NARROW_WINDOW_HOURS: i64 = 7 * 24;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub coingecko: Option<CoinGeckoProviderConfig>,
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coingecko: Some(CoinGeckoProviderConfig {
                base_url: "https://api.coingecko.com".to_string(),
            }),
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn coingecko_base_url(&self) -> &str {
        self.coingecko
            .as_ref()
            .map_or("https://api.coingecko.com", |p| &p.base_url)
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }
}

/// Retry, timeout and concurrency budget for one aggregation cycle.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub attempts: u32,
    pub retry_delay_ms: u64,
    /// Added to the delay on every further retry; zero keeps it fixed.
    pub retry_delay_step_ms: u64,
    pub call_timeout_secs: u64,
    pub total_timeout_secs: u64,
    pub concurrency: usize,
    /// Half-width of the first historical lookup window.
    pub narrow_window_hours: i64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            attempts: 3,
            retry_delay_ms: 1000,
            retry_delay_step_ms: 0,
            call_timeout_secs: 10,
            total_timeout_secs: 120,
            concurrency: 4,
            narrow_window_hours: 12,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.retry_delay_ms);
        let backoff = if self.retry_delay_step_ms == 0 {
            Backoff::Fixed { delay }
        } else {
            Backoff::Linear {
                base: delay,
                step: Duration::from_millis(self.retry_delay_step_ms),
            }
        };
        RetryPolicy {
            attempts: self.attempts,
            backoff,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }

    /// Capped at [`MAX_TIMEOUT_SECS`] so a deadline derived from it never overflows.
    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs.min(MAX_TIMEOUT_SECS))
    }

    pub fn narrow_window(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_hours(self.narrow_window_hours).with_context(|| {
            format!(
                "fetch.narrow_window_hours out of range: {}",
                self.narrow_window_hours
            )
        })
    }
}

fn default_quote_currency() -> String {
    "zar".to_string()
}

fn default_report_offset() -> i32 {
    120
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_basket")]
    pub instruments: Vec<Instrument>,
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
    /// Offset from UTC used when printing the report timestamp.
    #[serde(default = "default_report_offset")]
    pub report_utc_offset_minutes: i32,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            instruments: default_basket(),
            quote_currency: default_quote_currency(),
            report_utc_offset_minutes: default_report_offset(),
            providers: ProvidersConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config file at the default location, falling back to the
    /// built-in basket when there is none.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in basket",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "marketsnap", "marketsnap")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.instruments.is_empty(), "No instruments configured");

        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if !seen.insert(instrument.symbol.as_str()) {
                bail!("Duplicate instrument symbol: {}", instrument.symbol);
            }
        }

        ensure!(self.fetch.attempts > 0, "fetch.attempts must be at least 1");
        ensure!(
            self.fetch.concurrency > 0,
            "fetch.concurrency must be at least 1"
        );
        ensure!(
            self.fetch.call_timeout_secs > 0 && self.fetch.total_timeout_secs > 0,
            "fetch timeouts must be positive"
        );
        ensure!(
            self.fetch.call_timeout_secs <= MAX_TIMEOUT_SECS
                && self.fetch.total_timeout_secs <= MAX_TIMEOUT_SECS,
            "fetch timeouts must not exceed {MAX_TIMEOUT_SECS} seconds"
        );
        ensure!(
            self.fetch.retry_delay_ms <= MAX_TIMEOUT_SECS * 1000
                && self.fetch.retry_delay_step_ms <= MAX_TIMEOUT_SECS * 1000,
            "fetch retry delays must not exceed {MAX_TIMEOUT_SECS} seconds"
        );
        ensure!(
            (1..=MAX_NARROW_WINDOW_HOURS).contains(&self.fetch.narrow_window_hours),
            "fetch.narrow_window_hours must be between 1 and {MAX_NARROW_WINDOW_HOURS}"
        );
        self.report_offset()?;
        Ok(())
    }

    pub fn report_offset(&self) -> Result<FixedOffset> {
        self.report_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| {
                format!(
                    "Invalid report UTC offset: {} minutes",
                    self.report_utc_offset_minutes
                )
            })
    }
}
