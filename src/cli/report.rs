use super::ui;
use crate::core::config::AppConfig;
use crate::core::{Aggregator, FetchStatus, Instrument, MarketSnapshot, QuoteProvider};
use anyhow::Result;
use comfy_table::Cell;
use std::sync::Arc;

pub async fn run<P: QuoteProvider>(provider: P, config: Arc<AppConfig>) -> Result<()> {
    let pb = ui::new_progress_bar(config.instruments.len() as u64, true);
    let progress = pb.clone();
    let aggregator = Aggregator::new(provider, config)?.with_progress(move |symbol| {
        progress.set_message(symbol.to_string());
        progress.inc(1);
    });

    let result = aggregator.produce_snapshot().await;
    pb.finish_and_clear();
    let snapshot = result?;
    snapshot.ensure_complete(aggregator.basket())?;

    println!(
        "\n{}",
        ui::style_text(
            &format!("Market Report {}", snapshot.timestamp),
            ui::StyleType::Title
        )
    );
    println!("{}", display_as_table(&snapshot, aggregator.basket()));

    let failed = snapshot.failures().count();
    if failed > 0 {
        println!(
            "{}",
            ui::style_text(
                &format!("{failed} of {} instruments could not be fetched", snapshot.statuses.len()),
                ui::StyleType::Error
            )
        );
    }
    Ok(())
}

/// Renders one row per basket instrument, in basket order.
pub fn display_as_table(snapshot: &MarketSnapshot, basket: &[Instrument]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Metric"),
        ui::header_cell("Today"),
        ui::header_cell("1D%"),
        ui::header_cell("1M%"),
        ui::header_cell("YTD%"),
        ui::header_cell("Status"),
    ]);

    for instrument in basket {
        let Some((metrics, status)) = snapshot.get(&instrument.symbol) else {
            continue;
        };
        let mut row = vec![Cell::new(&instrument.symbol)];
        match status {
            FetchStatus::Success => {
                row.push(Cell::new(ui::format_price(metrics.today)));
                row.push(ui::change_cell(metrics.change));
                row.push(ui::change_cell(metrics.monthly));
                row.push(ui::change_cell(metrics.ytd));
                row.push(Cell::new(ui::style_text("ok", ui::StyleType::Subtle)));
            }
            FetchStatus::Failure(reason) => {
                for _ in 0..4 {
                    row.push(ui::na_cell(true));
                }
                row.push(Cell::new(ui::style_text(reason, ui::StyleType::Error)));
            }
        }
        table.add_row(row);
    }

    table.to_string()
}
