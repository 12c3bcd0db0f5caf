use std::fs;
use std::sync::Arc;
use tracing::info;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use marketsnap::core::config::{AppConfig, FetchConfig};
use marketsnap::core::{Aggregator, AssetClass, FetchStatus, Instrument, SnapshotError};

mod test_utils {
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use marketsnap::core::{CurrentPrices, Instrument, PricePoint, PriceSeries, QuoteProvider};
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_coingecko_mock_server(prices: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .respond_with(ResponseTemplate::new(200).set_body_string(prices))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn mount_chart(mock_server: &MockServer, coin: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v3/coins/{coin}/market_chart/range")))
            .respond_with(response)
            .mount(mock_server)
            .await;
    }

    pub fn write_config(mock_server: &MockServer) -> tempfile::NamedTempFile {
        let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        let config_content = format!(
            r#"
instruments:
  - id: bitcoin
    symbol: BTCZAR
    asset_class: crypto
  - id: ethereum
    symbol: ETHZAR
    asset_class: crypto
providers:
  coingecko:
    base_url: {}
fetch:
  attempts: 1
  retry_delay_ms: 10
  call_timeout_secs: 5
  total_timeout_secs: 30
"#,
            mock_server.uri()
        );
        std::fs::write(config_file.path(), config_content).expect("Failed to write config file");
        config_file
    }

    /// In-memory provider: fixed current prices, and per instrument a list of
    /// (days before now, price) history points.
    pub struct StubProvider {
        pub now: DateTime<Utc>,
        pub current: CurrentPrices,
        pub history: HashMap<String, Vec<(i64, f64)>>,
        pub broken: Vec<String>,
    }

    #[async_trait]
    impl QuoteProvider for StubProvider {
        async fn current_prices(&self, _instruments: &[Instrument]) -> Result<CurrentPrices> {
            Ok(self.current.clone())
        }

        async fn price_series(
            &self,
            instrument: &Instrument,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<PriceSeries> {
            if self.broken.contains(&instrument.id) {
                return Err(anyhow!("connection refused"));
            }
            let points = self
                .history
                .get(&instrument.id)
                .into_iter()
                .flatten()
                .map(|(days, price)| PricePoint::new(self.now - chrono::Duration::days(*days), *price))
                .filter(|p| p.timestamp >= start && p.timestamp <= end);
            Ok(PriceSeries::new(points))
        }
    }
}

fn basket_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        instruments: vec![
            Instrument::new("bitcoin", "BTC", AssetClass::Crypto),
            Instrument::new("ethereum", "ETH", AssetClass::Crypto),
        ],
        fetch: FetchConfig {
            attempts: 2,
            retry_delay_ms: 10,
            ..FetchConfig::default()
        },
        ..AppConfig::default()
    })
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_partial_history() {
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    let provider = test_utils::StubProvider {
        now,
        current: HashMap::from([
            ("bitcoin".to_string(), Some(100_000.0)),
            ("ethereum".to_string(), Some(5000.0)),
        ]),
        history: HashMap::from([
            ("bitcoin".to_string(), vec![]),
            ("ethereum".to_string(), vec![(1, 4900.0)]),
        ]),
        broken: vec![],
    };

    let aggregator = Aggregator::new(provider, basket_config()).unwrap();
    let snapshot = aggregator.produce_snapshot_at(now).await.unwrap();
    info!(?snapshot, "Produced snapshot");

    let (btc, btc_status) = snapshot.get("BTC").unwrap();
    assert_eq!(btc.today, 100_000.0);
    assert_eq!(btc.change, 0.0);
    assert_eq!(*btc_status, FetchStatus::Success);

    let (eth, eth_status) = snapshot.get("ETH").unwrap();
    assert!((eth.change - 2.04).abs() < 0.01);
    // only the 1D baseline existed
    assert_eq!(eth.monthly, 0.0);
    assert_eq!(eth.ytd, 0.0);
    assert_eq!(*eth_status, FetchStatus::Success);
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_fault_isolation() {
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    let provider = test_utils::StubProvider {
        now,
        current: HashMap::from([
            ("bitcoin".to_string(), Some(100_000.0)),
            ("ethereum".to_string(), Some(5000.0)),
        ]),
        history: HashMap::from([("ethereum".to_string(), vec![(1, 4000.0), (30, 2500.0)])]),
        broken: vec!["bitcoin".to_string()],
    };

    let aggregator = Aggregator::new(provider, basket_config()).unwrap();
    let snapshot = aggregator.produce_snapshot_at(now).await.unwrap();

    let (btc, btc_status) = snapshot.get("BTC").unwrap();
    assert_eq!(btc.today, 0.0);
    assert_eq!(*btc_status, FetchStatus::failure("connection refused"));

    let (eth, eth_status) = snapshot.get("ETH").unwrap();
    assert_eq!(eth.change, 25.0);
    assert_eq!(eth.monthly, 100.0);
    assert!(eth_status.is_success());
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_coingecko_mock() {
    let mock_server = test_utils::create_coingecko_mock_server(
        r#"{"bitcoin": {"zar": 100000.0}, "ethereum": {"zar": 5000.0}}"#,
    )
    .await;
    let now_ms = chrono::Utc::now().timestamp_millis();
    test_utils::mount_chart(
        &mock_server,
        "bitcoin",
        ResponseTemplate::new(200).set_body_string(format!(r#"{{"prices": [[{now_ms}, 80000.0]]}}"#)),
    )
    .await;
    test_utils::mount_chart(&mock_server, "ethereum", ResponseTemplate::new(500)).await;

    let config_file = test_utils::write_config(&mock_server);

    let result = marketsnap::run_command(
        marketsnap::AppCommand::Snapshot,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Snapshot command failed with: {:?}",
        result.err()
    );

    let result = marketsnap::run_command(
        marketsnap::AppCommand::Report,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Report command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_snapshot_through_http_providers() {
    let mock_server = test_utils::create_coingecko_mock_server(
        r#"{"bitcoin": {"zar": 100000.0}, "ethereum": {"zar": 5000.0}}"#,
    )
    .await;
    let now_ms = chrono::Utc::now().timestamp_millis();
    test_utils::mount_chart(
        &mock_server,
        "bitcoin",
        ResponseTemplate::new(200).set_body_string(format!(r#"{{"prices": [[{now_ms}, 80000.0]]}}"#)),
    )
    .await;
    // empty every time: 1D and 1M each widen once, YTD asks once
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/ethereum/market_chart/range"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"prices": []}"#))
        .expect(5)
        .mount(&mock_server)
        .await;

    let config_file = test_utils::write_config(&mock_server);
    let config = Arc::new(AppConfig::load_from_path(config_file.path()).unwrap());
    let provider = marketsnap::providers::from_config(&config).unwrap();
    let aggregator = Aggregator::new(provider, Arc::clone(&config)).unwrap();

    let snapshot = aggregator.produce_snapshot().await.unwrap();
    snapshot.ensure_complete(&config.instruments).unwrap();

    let (btc, _) = snapshot.get("BTCZAR").unwrap();
    assert_eq!(btc.today, 100_000.0);
    assert_eq!(btc.change, 25.0);
    assert_eq!(btc.monthly, 25.0);
    assert_eq!(btc.ytd, 25.0);

    let (eth, eth_status) = snapshot.get("ETHZAR").unwrap();
    assert_eq!(eth.today, 5000.0);
    assert_eq!(eth.change, 0.0);
    assert!(eth_status.is_success());

    let report = snapshot.to_report();
    assert_eq!(report["BTCZAR"]["Change"], 25.0);
    assert!(report["timestamp"].is_string());
}

#[test_log::test(tokio::test)]
async fn test_current_price_failure_aborts_cycle() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/simple/price"))
        .respond_with(ResponseTemplate::new(500))
        // two attempts from the aggregator below, one from the config file's single attempt
        .expect(3)
        .mount(&mock_server)
        .await;

    let config_file = test_utils::write_config(&mock_server);
    let mut config = AppConfig::load_from_path(config_file.path()).unwrap();
    config.fetch.attempts = 2;
    let config = Arc::new(config);
    let provider = marketsnap::providers::from_config(&config).unwrap();
    let aggregator = Aggregator::new(provider, config).unwrap();

    let result = aggregator.produce_snapshot().await;
    match result {
        Err(SnapshotError::CurrentPrices(e)) => {
            assert!(format!("{e:#}").contains("HTTP error: 500"));
        }
        other => panic!("expected an aborted cycle, got {other:?}"),
    }

    let result = marketsnap::run_command(
        marketsnap::AppCommand::Snapshot,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_err());
}

#[test_log::test(tokio::test)]
async fn test_invalid_config_is_rejected() {
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    fs::write(config_file.path(), "fetch:\n  concurrency: 0\n").unwrap();

    let result = marketsnap::run_command(
        marketsnap::AppCommand::Snapshot,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("fetch.concurrency must be at least 1"));
}

