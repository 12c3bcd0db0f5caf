//! Instruments tracked in a market snapshot

use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Crypto,
    Equity,
    Fx,
    Commodity,
    Index,
}

impl AssetClass {
    /// Upstream source used when an instrument does not name one explicitly.
    pub fn default_source(&self) -> QuoteSource {
        match self {
            AssetClass::Crypto => QuoteSource::CoinGecko,
            AssetClass::Equity | AssetClass::Fx | AssetClass::Commodity | AssetClass::Index => {
                QuoteSource::Yahoo
            }
        }
    }
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetClass::Crypto => "crypto",
                AssetClass::Equity => "equity",
                AssetClass::Fx => "fx",
                AssetClass::Commodity => "commodity",
                AssetClass::Index => "index",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    CoinGecko,
    Yahoo,
}

/// A tradable asset in the basket.
///
/// `id` is what the upstream provider understands (`bitcoin`, `USDZAR=X`),
/// `symbol` is the key the instrument is reported under (`BTCZAR`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub symbol: String,
    pub asset_class: AssetClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<QuoteSource>,
}

impl Instrument {
    pub fn new(id: &str, symbol: &str, asset_class: AssetClass) -> Self {
        Instrument {
            id: id.to_string(),
            symbol: symbol.to_string(),
            asset_class,
            source: None,
        }
    }

    pub fn quote_source(&self) -> QuoteSource {
        self.source
            .unwrap_or_else(|| self.asset_class.default_source())
    }
}

/// Top-10 cryptocurrencies, reported against the rand.
pub fn default_basket() -> Vec<Instrument> {
    [
        ("bitcoin", "BTCZAR"),
        ("ethereum", "ETHZAR"),
        ("binancecoin", "BNBZAR"),
        ("ripple", "XRPZAR"),
        ("cardano", "ADAZAR"),
        ("solana", "SOLZAR"),
        ("dogecoin", "DOGEZAR"),
        ("polkadot", "DOTZAR"),
        ("tron", "TRXZAR"),
        ("litecoin", "LTCZAR"),
    ]
    .into_iter()
    .map(|(id, symbol)| Instrument::new(id, symbol, AssetClass::Crypto))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defaults_from_asset_class() {
        let btc = Instrument::new("bitcoin", "BTCZAR", AssetClass::Crypto);
        assert_eq!(btc.quote_source(), QuoteSource::CoinGecko);

        let usd = Instrument::new("USDZAR=X", "USDZAR", AssetClass::Fx);
        assert_eq!(usd.quote_source(), QuoteSource::Yahoo);

        let overridden = Instrument {
            source: Some(QuoteSource::CoinGecko),
            ..Instrument::new("pax-gold", "PAXG", AssetClass::Commodity)
        };
        assert_eq!(overridden.quote_source(), QuoteSource::CoinGecko);
    }

    #[test]
    fn test_default_basket_has_unique_symbols() {
        let basket = default_basket();
        assert_eq!(basket.len(), 10);
        let mut symbols: Vec<_> = basket.iter().map(|i| i.symbol.as_str()).collect();
        symbols.sort();
        symbols.dedup();
        assert_eq!(symbols.len(), 10);
        assert!(basket.iter().all(|i| i.asset_class == AssetClass::Crypto));
    }
}
