use anyhow::Result;
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::{Aggregator, MarketSnapshot, QuoteProvider};

/// Produces one snapshot and prints it in the renderer-facing JSON shape.
pub async fn run<P: QuoteProvider>(provider: P, config: Arc<AppConfig>) -> Result<()> {
    let aggregator = Aggregator::new(provider, config)?;
    let snapshot = aggregator.produce_snapshot().await?;
    snapshot.ensure_complete(aggregator.basket())?;
    println!("{}", render_json(&snapshot)?);
    Ok(())
}

pub fn render_json(snapshot: &MarketSnapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(&snapshot.to_report())?)
}
