//! Baseline prices for the comparison horizons.
//!
//! A horizon with no data is `Ok(None)`; only provider failures are errors.

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;

use super::instrument::Instrument;
use super::price::QuoteProvider;

/// Days requested from Jan 1 onwards, to absorb provider timezone slack.
const YTD_WINDOW_DAYS: i64 = 2;

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Finds the price closest to `now - offset_days`.
///
/// Asks for `target ± narrow_window` first. Only when that is empty does it
/// widen to the whole calendar day either side of the target date, so the
/// provider is queried at most twice.
pub async fn historical_price(
    provider: &dyn QuoteProvider,
    instrument: &Instrument,
    now: DateTime<Utc>,
    offset_days: i64,
    narrow_window: Duration,
) -> Result<Option<f64>> {
    let target = now - Duration::days(offset_days);

    let series = provider
        .price_series(instrument, target - narrow_window, target + narrow_window)
        .await?;
    if let Some(point) = series.nearest_to(target) {
        return Ok(Some(point.price));
    }

    let day = midnight_utc(target.date_naive());
    let (start, end) = (day - Duration::days(1), day + Duration::days(2));
    debug!(
        symbol = %instrument.symbol,
        offset_days,
        %start,
        %end,
        "Narrow window empty, widening"
    );
    let series = provider.price_series(instrument, start, end).await?;
    Ok(series.nearest_to(target).map(|p| p.price))
}

/// Earliest price of the year `now` falls in.
pub async fn ytd_price(
    provider: &dyn QuoteProvider,
    instrument: &Instrument,
    now: DateTime<Utc>,
) -> Result<Option<f64>> {
    let Some(jan1) = NaiveDate::from_ymd_opt(now.year(), 1, 1) else {
        return Ok(None);
    };
    let anchor = midnight_utc(jan1);
    let series = provider
        .price_series(instrument, anchor, anchor + Duration::days(YTD_WINDOW_DAYS))
        .await?;
    Ok(series.first_on_or_after(jan1).map(|p| p.price))
}
