//! Derived columns: mortality rate, day-over-day growth and its rolling mean.
//!
//! Each derivation is a SQL expression evaluated over the rows of a
//! [`TimeSeries`] ordered by date.

use crate::error::Result;
use crate::table::DATE_COLUMN;
use crate::timeseries::{TimeSeries, quote};

/// Window of the smoothed growth column, in rows (days).
pub const SMA_WINDOW: usize = 7;

/// Fractional change from the previous row.
///
/// The first row is undefined, as is any row where either value is
/// undefined or the previous value is zero. An undefined value is not
/// padded from the row before it, so a gap also leaves the following
/// row's growth undefined.
pub fn growth_expr(column: &str) -> String {
    let value = format!("CAST({} AS DOUBLE)", quote(column));
    let prev = format!("LAG({value}) OVER (ORDER BY {})", quote(DATE_COLUMN));
    format!("CASE WHEN {prev} = 0 THEN NULL ELSE ({value} - {prev}) / {prev} END")
}

/// Mean of the trailing `window` rows; undefined unless all of them are
/// defined.
pub fn rolling_mean_expr(column: &str, window: usize) -> String {
    let over = format!(
        "OVER (ORDER BY {} ROWS BETWEEN {} PRECEDING AND CURRENT ROW)",
        quote(DATE_COLUMN),
        window.saturating_sub(1)
    );
    let column = quote(column);
    format!("CASE WHEN COUNT({column}) {over} = {window} THEN AVG({column}) {over} END")
}

/// Deceased over cumulative intake.
///
/// Undefined when intake is zero. A rate of exactly zero is also reported
/// as undefined: downstream charts treat both as "no data".
pub fn mortality_rate_expr(deceased: &str, intake_cumulative: &str) -> String {
    let deceased = quote(deceased);
    let intake = quote(intake_cumulative);
    format!(
        "CASE WHEN {intake} > 0 AND {deceased} <> 0 \
         THEN CAST({deceased} AS DOUBLE) / CAST({intake} AS DOUBLE) END"
    )
}

/// Add `growth_<column>` and `sma7_growth_<column>`.
pub async fn derive_growth(series: &mut TimeSeries, column: &str) -> Result<()> {
    series.require(column)?;
    let growth = format!("growth_{column}");
    series.add_column(&growth, &growth_expr(column)).await?;
    series
        .add_column(
            &format!("sma{SMA_WINDOW}_growth_{column}"),
            &rolling_mean_expr(&growth, SMA_WINDOW),
        )
        .await
}

/// Add `mortality_rate` from `cumulative_deceased` and `intakeCumulative`.
pub async fn derive_mortality_rate(series: &mut TimeSeries) -> Result<()> {
    series.require("cumulative_deceased")?;
    series.require("intakeCumulative")?;
    series
        .add_column(
            "mortality_rate",
            &mortality_rate_expr("cumulative_deceased", "intakeCumulative"),
        )
        .await
}
