use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::util::{get_json, http_client, utc_from_secs};
use crate::core::{CurrentPrices, Instrument, PricePoint, PriceSeries, QuoteProvider};

/// Equity, FX, commodity and index quotes from the Yahoo Finance chart API.
///
/// Yahoo quotes in the listing currency, so instruments should be picked so
/// that it matches the basket's quote currency (`USDZAR=X`, `^J203.JO`, ...).
pub struct YahooFinanceProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client()?,
        })
    }

    async fn chart(&self, symbol: &str, params: &str) -> Result<PriceChartItem> {
        let url = format!("{}/v8/finance/chart/{}?{}", self.base_url, symbol, params);
        let data: YahooPriceResponse = get_json(&self.client, &url, symbol).await?;
        data.chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No price data found for symbol: {}", symbol))
    }
}

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: PriceChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct PriceChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

impl PriceChartItem {
    fn into_points(self) -> Vec<PricePoint> {
        let closes = self
            .indicators
            .and_then(|inds| inds.quote.into_iter().next())
            .and_then(|q| q.close)
            .unwrap_or_default();
        self.timestamp
            .unwrap_or_default()
            .into_iter()
            .zip(closes)
            .filter_map(|(ts, close)| Some(PricePoint::new(utc_from_secs(ts)?, close?)))
            .collect()
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    /// Yahoo has no keyless multi-symbol quote endpoint, so the batch fans
    /// out one chart request per symbol and joins them.
    #[instrument(name = "YahooPrices", skip_all, fields(count = instruments.len()))]
    async fn current_prices(&self, instruments: &[Instrument]) -> Result<CurrentPrices> {
        if instruments.is_empty() {
            return Ok(CurrentPrices::new());
        }
        let requests = instruments.iter().map(|instrument| async move {
            let price = match self.chart(&instrument.id, "range=1d&interval=1d").await {
                Ok(item) => item.meta.regular_market_price.filter(|p| p.is_finite()),
                Err(e) => {
                    warn!(symbol = %instrument.id, error = %e, "No current quote");
                    None
                }
            };
            (instrument.id.clone(), price)
        });
        let prices: CurrentPrices = join_all(requests).await.into_iter().collect();

        if prices.values().all(Option::is_none) {
            let ids: Vec<&str> = instruments.iter().map(|i| i.id.as_str()).collect();
            bail!("No price data found for symbols: {}", ids.join(","));
        }
        Ok(prices)
    }

    #[instrument(name = "YahooSeries", skip(self, instrument), fields(symbol = %instrument.id))]
    async fn price_series(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        let params = format!(
            "period1={}&period2={}&interval=1h",
            start.timestamp(),
            end.timestamp()
        );
        let item = self.chart(&instrument.id, &params).await?;
        let points = item.into_points();
        debug!(points = points.len(), "Received chart");
        Ok(PriceSeries::new(points))
    }
}
