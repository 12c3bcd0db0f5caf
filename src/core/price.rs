//! Pricing abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::instrument::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        PricePoint { timestamp, price }
    }
}

/// Prices returned by a provider for one time window, in the order the
/// provider reported them. Never modified after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Builds a series, discarding points whose price is not a finite number.
    pub fn new(points: impl IntoIterator<Item = PricePoint>) -> Self {
        PriceSeries {
            points: points
                .into_iter()
                .filter(|p| p.price.is_finite())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Point with the smallest absolute distance to `target`. The earliest
    /// encountered point wins a tie.
    pub fn nearest_to(&self, target: DateTime<Utc>) -> Option<&PricePoint> {
        self.points.iter().reduce(|best, candidate| {
            let best_gap = (best.timestamp - target).abs();
            let gap = (candidate.timestamp - target).abs();
            if gap < best_gap { candidate } else { best }
        })
    }

    /// First point, in encounter order, dated on or after `date`.
    pub fn first_on_or_after(&self, date: NaiveDate) -> Option<&PricePoint> {
        self.points
            .iter()
            .find(|p| p.timestamp.date_naive() >= date)
    }
}

/// Latest price per instrument id; `None` when the provider had nothing for it.
pub type CurrentPrices = HashMap<String, Option<f64>>;

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// One round trip for the whole batch, keyed by `Instrument::id`.
    async fn current_prices(&self, instruments: &[Instrument]) -> Result<CurrentPrices>;

    /// Prices observed between `start` and `end`. An empty series is not an error.
    async fn price_series(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries>;
}
