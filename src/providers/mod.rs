pub mod coingecko;
pub mod routing;
pub mod util;
pub mod yahoo_finance;

use anyhow::Result;

use crate::core::QuoteSource;
use crate::core::config::AppConfig;
use coingecko::CoinGeckoProvider;
use routing::RoutingProvider;
use yahoo_finance::YahooFinanceProvider;

/// Provider covering every source the basket uses, pointed at the configured endpoints.
pub fn from_config(config: &AppConfig) -> Result<RoutingProvider> {
    let coingecko =
        CoinGeckoProvider::new(config.providers.coingecko_base_url(), &config.quote_currency)?;
    let yahoo = YahooFinanceProvider::new(config.providers.yahoo_base_url())?;
    Ok(RoutingProvider::new()
        .with_source(QuoteSource::CoinGecko, coingecko)
        .with_source(QuoteSource::Yahoo, yahoo))
}
