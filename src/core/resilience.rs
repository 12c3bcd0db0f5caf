//! Retry and timeout policy applied around upstream calls.

use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::instrument::Instrument;
use super::price::{CurrentPrices, PriceSeries, QuoteProvider};

/// Delay between consecutive attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed { delay: Duration },
    /// `base + step * retry`, where `retry` is 0 for the first retry.
    Linear { base: Duration, step: Duration },
}

impl Backoff {
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Backoff::Fixed { delay } => delay,
            Backoff::Linear { base, step } => base.saturating_add(step.saturating_mul(retry)),
        }
    }
}

/// A single attempt ran past its budget.
#[derive(Debug, thiserror::Error)]
#[error("call timed out after {0:?}")]
pub struct CallTimeout(pub Duration);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total runs, including the first one.
    pub attempts: u32,
    pub backoff: Backoff,
    /// Budget for each attempt, independent of how many attempts remain.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            backoff: Backoff::Fixed {
                delay: Duration::from_secs(1),
            },
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Upper bound on the wall-clock time a single [`RetryPolicy::call`] can take.
    pub fn worst_case_latency(&self) -> Duration {
        (0..self.attempts.max(1)).fold(Duration::ZERO, |total, retry| {
            total
                .saturating_add(self.call_timeout)
                .saturating_add(self.backoff.delay(retry))
        })
    }

    /// Runs `operation` until it succeeds or the attempts run out, bounding
    /// every attempt with `call_timeout`.
    ///
    /// When all attempts fail the last error is returned as is. A timed out
    /// attempt surfaces as [`CallTimeout`].
    pub async fn call<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(Error::new(CallTimeout(self.call_timeout))),
            };

            match outcome {
                Ok(val) => return Ok(val),
                Err(err) if attempt >= attempts => {
                    debug!(label, attempts, error = %err, "Giving up");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.backoff.delay(attempt - 1);
                    debug!(label, attempt, attempts, error = %err, ?delay, "Retrying");
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Wraps every call of an inner [`QuoteProvider`] with a [`RetryPolicy`].
pub struct ResilientProvider<P: QuoteProvider> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: QuoteProvider> ResilientProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: QuoteProvider> QuoteProvider for ResilientProvider<P> {
    async fn current_prices(&self, instruments: &[Instrument]) -> Result<CurrentPrices> {
        self.policy
            .call("current prices", || self.inner.current_prices(instruments))
            .await
    }

    async fn price_series(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        self.policy
            .call(&instrument.symbol, || {
                self.inner.price_series(instrument, start, end)
            })
            .await
    }
}
