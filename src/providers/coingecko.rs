use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

use super::util::{get_json, http_client, utc_from_millis};
use crate::core::{CurrentPrices, Instrument, PricePoint, PriceSeries, QuoteProvider};

/// Crypto prices from the CoinGecko public API, quoted in `vs_currency`.
pub struct CoinGeckoProvider {
    base_url: String,
    vs_currency: String,
    client: reqwest::Client,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, vs_currency: &str) -> Result<Self> {
        Ok(CoinGeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            vs_currency: vs_currency.to_lowercase(),
            client: http_client()?,
        })
    }
}

/// `{"bitcoin": {"zar": 1234.5}, ...}`
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

#[derive(Deserialize, Debug)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(f64, Option<f64>)>,
}

#[async_trait]
impl QuoteProvider for CoinGeckoProvider {
    #[instrument(name = "CoinGeckoPrices", skip_all, fields(count = instruments.len()))]
    async fn current_prices(&self, instruments: &[Instrument]) -> Result<CurrentPrices> {
        if instruments.is_empty() {
            return Ok(CurrentPrices::new());
        }
        let ids: Vec<&str> = instruments.iter().map(|i| i.id.as_str()).collect();
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies={}",
            self.base_url,
            ids.join(","),
            self.vs_currency
        );

        let data: SimplePriceResponse = get_json(&self.client, &url, "CoinGecko prices").await?;

        let prices: CurrentPrices = ids
            .iter()
            .map(|id| {
                let price = data
                    .get(*id)
                    .and_then(|quotes| quotes.get(&self.vs_currency).copied().flatten())
                    .filter(|p| p.is_finite());
                (id.to_string(), price)
            })
            .collect();

        if prices.values().all(Option::is_none) {
            bail!("No price data found for ids: {}", ids.join(","));
        }
        Ok(prices)
    }

    #[instrument(name = "CoinGeckoSeries", skip(self, instrument), fields(id = %instrument.id))]
    async fn price_series(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        let url = format!(
            "{}/api/v3/coins/{}/market_chart/range?vs_currency={}&from={}&to={}",
            self.base_url,
            instrument.id,
            self.vs_currency,
            start.timestamp(),
            end.timestamp()
        );
        let what = format!("CoinGecko history of {}", instrument.id);

        let data: MarketChartResponse = get_json(&self.client, &url, &what).await?;
        debug!(points = data.prices.len(), "Received market chart");

        Ok(PriceSeries::new(data.prices.into_iter().filter_map(
            |(millis, price)| {
                let timestamp = utc_from_millis(millis as i64)?;
                Some(PricePoint::new(timestamp, price?))
            },
        )))
    }
}
