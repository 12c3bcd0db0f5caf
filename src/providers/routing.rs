use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use tracing::warn;

use crate::core::{CurrentPrices, Instrument, PriceSeries, QuoteProvider, QuoteSource};

/// Presents several upstream sources as one [`QuoteProvider`], sending each
/// instrument to the source it is quoted on.
#[derive(Default)]
pub struct RoutingProvider {
    sources: HashMap<QuoteSource, Box<dyn QuoteProvider>>,
}

impl RoutingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(
        mut self,
        source: QuoteSource,
        provider: impl QuoteProvider + 'static,
    ) -> Self {
        self.sources.insert(source, Box::new(provider));
        self
    }

    fn source_for(&self, instrument: &Instrument) -> Result<&dyn QuoteProvider> {
        let source = instrument.quote_source();
        self.sources
            .get(&source)
            .map(|p| &**p)
            .ok_or_else(|| anyhow!("No provider configured for {:?} ({})", source, instrument.id))
    }
}

#[async_trait]
impl QuoteProvider for RoutingProvider {
    /// Queries every source concurrently. A failing source only blanks its
    /// own instruments; the batch fails when no source succeeds.
    async fn current_prices(&self, instruments: &[Instrument]) -> Result<CurrentPrices> {
        let mut groups: HashMap<QuoteSource, Vec<Instrument>> = HashMap::new();
        for instrument in instruments {
            groups
                .entry(instrument.quote_source())
                .or_default()
                .push(instrument.clone());
        }

        let batches = groups.iter().map(|(source, group)| async move {
            let result = match self.sources.get(source) {
                Some(provider) => provider.current_prices(group).await,
                None => Err(anyhow!("No provider configured for {:?}", source)),
            };
            (*source, group, result)
        });

        let mut prices = CurrentPrices::new();
        let mut last_error = None;
        let mut any_succeeded = false;
        for (source, group, result) in join_all(batches).await {
            match result {
                Ok(batch) => {
                    any_succeeded = true;
                    prices.extend(batch);
                }
                Err(e) => {
                    warn!(?source, error = %e, "Source batch failed");
                    last_error = Some(e);
                }
            }
            for instrument in group {
                prices.entry(instrument.id.clone()).or_insert(None);
            }
        }

        match last_error {
            Some(e) if !any_succeeded => Err(e),
            _ => Ok(prices),
        }
    }

    async fn price_series(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        self.source_for(instrument)?
            .price_series(instrument, start, end)
            .await
    }
}
