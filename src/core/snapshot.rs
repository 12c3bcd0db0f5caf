//! The consolidated result of one aggregation cycle.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Display;

use super::change::percent_change;
use super::instrument::Instrument;

/// Latest price and its change over each horizon, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMetrics {
    #[serde(rename = "Today")]
    pub today: f64,
    #[serde(rename = "Change")]
    pub change: f64,
    #[serde(rename = "Monthly")]
    pub monthly: f64,
    #[serde(rename = "YTD")]
    pub ytd: f64,
}

impl InstrumentMetrics {
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn from_baselines(
        today: f64,
        day_ago: Option<f64>,
        month_ago: Option<f64>,
        year_start: Option<f64>,
    ) -> Self {
        InstrumentMetrics {
            today,
            change: percent_change(day_ago, Some(today)),
            monthly: percent_change(month_ago, Some(today)),
            ytd: percent_change(year_start, Some(today)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Failure(String),
}

impl FetchStatus {
    pub fn failure(reason: impl Into<String>) -> Self {
        FetchStatus::Failure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchStatus::Success)
    }
}

impl Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStatus::Success => write!(f, "ok"),
            FetchStatus::Failure(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Generation time rendered in the report timezone, `YYYY-MM-DD HH:MM`.
    pub timestamp: String,
    pub generated_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, InstrumentMetrics>,
    pub statuses: BTreeMap<String, FetchStatus>,
}

impl MarketSnapshot {
    pub fn get(&self, symbol: &str) -> Option<(&InstrumentMetrics, &FetchStatus)> {
        Some((self.metrics.get(symbol)?, self.statuses.get(symbol)?))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.statuses.iter().filter_map(|(symbol, status)| match status {
            FetchStatus::Failure(reason) => Some((symbol.as_str(), reason.as_str())),
            FetchStatus::Success => None,
        })
    }

    /// Fails with the list of basket symbols absent from either map.
    pub fn ensure_complete(&self, basket: &[Instrument]) -> Result<()> {
        let missing: Vec<&str> = basket
            .iter()
            .map(|i| i.symbol.as_str())
            .filter(|s| !self.metrics.contains_key(*s) || !self.statuses.contains_key(*s))
            .collect();
        if !missing.is_empty() {
            bail!("Missing data keys: {}", missing.join(", "));
        }
        Ok(())
    }

    /// Flat structure consumed by report renderers:
    /// `{"timestamp": "...", "<symbol>": {"Today", "Change", "Monthly", "YTD", "Status"}}`.
    pub fn to_report(&self) -> Value {
        let mut report = Map::new();
        report.insert("timestamp".to_string(), Value::from(self.timestamp.clone()));
        for (symbol, metrics) in &self.metrics {
            let mut entry = Map::new();
            entry.insert("Today".to_string(), Value::from(metrics.today));
            entry.insert("Change".to_string(), Value::from(metrics.change));
            entry.insert("Monthly".to_string(), Value::from(metrics.monthly));
            entry.insert("YTD".to_string(), Value::from(metrics.ytd));
            if let Some(status) = self.statuses.get(symbol) {
                entry.insert("Status".to_string(), Value::from(status.to_string()));
            }
            report.insert(symbol.clone(), Value::Object(entry));
        }
        Value::Object(report)
    }
}
