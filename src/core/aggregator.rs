//! Drives one aggregation cycle across the whole basket.
//!
//! The batch of current prices is the only fatal step. After it, every
//! instrument resolves its baselines in its own task; a task that errors,
//! panics or misses the cycle deadline only affects its own entry.

use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset, Utc};
use futures::{FutureExt, StreamExt, stream};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

use super::config::AppConfig;
use super::instrument::Instrument;
use super::price::QuoteProvider;
use super::resilience::ResilientProvider;
use super::resolver;
use super::snapshot::{FetchStatus, InstrumentMetrics, MarketSnapshot};

pub const TIMEOUT_REASON: &str = "timeout";

/// Why a cycle produced no snapshot at all.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to fetch current prices: {0:#}")]
    CurrentPrices(anyhow::Error),
    #[error("current prices not available within {0:?}")]
    Deadline(Duration),
}

type ProgressFn = dyn Fn(&str) + Send + Sync;

pub struct Aggregator<P: QuoteProvider> {
    provider: ResilientProvider<P>,
    config: Arc<AppConfig>,
    report_offset: FixedOffset,
    progress: Option<Box<ProgressFn>>,
}

impl<P: QuoteProvider> Aggregator<P> {
    /// Every upstream call made by the aggregator goes through the retry
    /// policy described by `config.fetch`.
    pub fn new(provider: P, config: Arc<AppConfig>) -> Result<Self> {
        config.validate()?;
        let report_offset = config.report_offset()?;
        let policy = config.fetch.retry_policy();
        Ok(Aggregator {
            provider: ResilientProvider::new(provider, policy),
            config,
            report_offset,
            progress: None,
        })
    }

    /// Calls `progress` with the symbol of each instrument once it settles.
    pub fn with_progress(mut self, progress: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn basket(&self) -> &[Instrument] {
        &self.config.instruments
    }

    pub async fn produce_snapshot(&self) -> Result<MarketSnapshot, SnapshotError> {
        self.produce_snapshot_at(Utc::now()).await
    }

    /// Runs a cycle as if the current time were `now`.
    #[instrument(name = "Snapshot", skip(self), fields(instruments = self.basket().len()))]
    pub async fn produce_snapshot_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<MarketSnapshot, SnapshotError> {
        let budget = self.config.fetch.total_timeout();
        let deadline = Instant::now() + budget;
        let basket = self.basket();
        let timestamp = now
            .with_timezone(&self.report_offset)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        info!(%timestamp, ?budget, "Producing market snapshot");

        let current = match timeout_at(deadline, self.provider.current_prices(basket)).await {
            Ok(Ok(prices)) => prices,
            Ok(Err(e)) => {
                warn!(error = %e, "Current price batch failed, aborting cycle");
                return Err(SnapshotError::CurrentPrices(e));
            }
            Err(_) => {
                warn!("Current price batch missed the cycle deadline");
                return Err(SnapshotError::Deadline(budget));
            }
        };
        debug!(prices = current.len(), "Received current prices");

        // Pre-filled so instruments still pending at the deadline keep a timeout entry.
        let mut metrics: BTreeMap<String, InstrumentMetrics> = basket
            .iter()
            .map(|i| (i.symbol.clone(), InstrumentMetrics::zeroed()))
            .collect();
        let mut statuses: BTreeMap<String, FetchStatus> = basket
            .iter()
            .map(|i| (i.symbol.clone(), FetchStatus::failure(TIMEOUT_REASON)))
            .collect();

        let tasks = stream::iter(basket)
            .map(|instrument| {
                let today = current.get(&instrument.id).copied().flatten();
                AssertUnwindSafe(self.instrument_metrics(instrument, today, now))
                    .catch_unwind()
                    .map(move |outcome| (instrument, outcome))
            })
            .buffer_unordered(self.config.fetch.concurrency.max(1));
        let mut tasks = pin!(tasks);

        let settle_all = async {
            while let Some((instrument, outcome)) = tasks.next().await {
                let (entry, status) = match outcome {
                    Ok(Ok(entry)) => (entry, FetchStatus::Success),
                    Ok(Err(e)) => {
                        warn!(symbol = %instrument.symbol, error = %e, "Instrument failed");
                        (InstrumentMetrics::zeroed(), FetchStatus::failure(format!("{e:#}")))
                    }
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        warn!(symbol = %instrument.symbol, %message, "Instrument task panicked");
                        (
                            InstrumentMetrics::zeroed(),
                            FetchStatus::failure(format!("panicked: {message}")),
                        )
                    }
                };
                metrics.insert(instrument.symbol.clone(), entry);
                statuses.insert(instrument.symbol.clone(), status);
                if let Some(progress) = &self.progress {
                    progress(&instrument.symbol);
                }
            }
        };
        if timeout_at(deadline, settle_all).await.is_err() {
            warn!(?budget, "Deadline reached, abandoning pending instruments");
        }

        let failed = statuses.values().filter(|s| !s.is_success()).count();
        info!(
            succeeded = statuses.len() - failed,
            failed, "Market snapshot complete"
        );

        Ok(MarketSnapshot {
            timestamp,
            generated_at: now,
            metrics,
            statuses,
        })
    }

    async fn instrument_metrics(
        &self,
        instrument: &Instrument,
        today: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<InstrumentMetrics> {
        let Some(today) = today else {
            bail!("current price unavailable");
        };
        debug!(
            symbol = %instrument.symbol,
            asset_class = %instrument.asset_class,
            today,
            "Resolving baselines"
        );

        let narrow = self.config.fetch.narrow_window()?;
        let (day_ago, month_ago, year_start) = futures::try_join!(
            resolver::historical_price(&self.provider, instrument, now, 1, narrow),
            resolver::historical_price(&self.provider, instrument, now, 30, narrow),
            resolver::ytd_price(&self.provider, instrument, now),
        )?;

        for (horizon, baseline) in [("1D", day_ago), ("1M", month_ago), ("YTD", year_start)] {
            if baseline.is_none() {
                warn!(symbol = %instrument.symbol, horizon, "No historical price, reporting 0%");
            }
        }

        Ok(InstrumentMetrics::from_baselines(
            today, day_ago, month_ago, year_start,
        ))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
