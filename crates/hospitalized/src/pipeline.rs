//! The fetch → select → join → derive → write run.

use crate::config::{Sources, TableSource};
use crate::derive::{derive_growth, derive_mortality_rate};
use crate::error::{Error, Result};
use crate::export::write_csv;
use crate::fetch::Fetch;
use crate::source::{IndexKind, RawTable};
use crate::table::{relabel_index, rename_columns, require_int, select_columns, sort_by_index};
use crate::timeseries::TimeSeries;
use arrow::record_batch::RecordBatch;
use diagnostics::*;
use std::path::{Path, PathBuf};

pub const HOSPITALIZED_CSV: &str = "hospitalized.csv";
pub const DEMOGRAPHICS_CSV: &str = "hospital_demographics.csv";
pub const TREATMENT_DURATIONS_CSV: &str = "hospital_treatment_durations.csv";

/// Columns filled with 0 where missing, then cast to integers.
const ZERO_FILLED: [&str; 3] = ["cumulative_deceased", "cumulative_recovered", "intakeCumulative"];

/// Download `source`, restrict it to its selected columns and apply renames.
pub async fn fetch_and_select(
    fetcher: &dyn Fetch,
    source: &TableSource,
    index: IndexKind,
) -> Result<RecordBatch> {
    let bytes = fetcher
        .fetch(&source.url, &source.headers, &source.cookies)
        .await?;
    let raw = RawTable::decode(&bytes, source.format, &source.url)?;
    let mut batch = raw.into_batch(&source.url, index, source.date_format.as_deref())?;

    if !source.columns.is_empty() {
        batch = select_columns(&batch, &source.columns, &source.url)?;
    }
    batch = rename_columns(&batch, &source.rename)?;

    let schema = batch.schema();
    let columns: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    debug!(
        "{url}: {rows} rows, columns [{columns}]",
        url: source.url.clone(),
        rows: batch.num_rows(),
        columns: columns.join(","),
    );
    Ok(batch)
}

/// Owns everything one fetcher run needs; dropped when the run ends.
pub struct FetchContext {
    fetcher: Box<dyn Fetch>,
    sources: Sources,
    output_dir: PathBuf,
}

/// Paths written by [`FetchContext::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    pub hospitalized: PathBuf,
    pub demographics: PathBuf,
    pub treatment_durations: PathBuf,
}

impl FetchContext {
    pub fn new(fetcher: Box<dyn Fetch>, sources: Sources, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            sources,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn fetch(&self, source: &TableSource, index: IndexKind) -> Result<RecordBatch> {
        fetch_and_select(self.fetcher.as_ref(), source, index).await
    }

    /// Build the joined, derived hospitalization time series.
    pub async fn hospitalized_table(&self) -> Result<RecordBatch> {
        let intake = self.fetch(&self.sources.intake_count, IndexKind::Date).await?;
        let intake = require_int(&intake, "intakeCount", &self.sources.intake_count.url)?;
        let died = self.fetch(&self.sources.died_and_survivors, IndexKind::Date).await?;
        let cumulative = self.fetch(&self.sources.intake_cumulative, IndexKind::Date).await?;
        let beds = self.fetch(&self.sources.lcps, IndexKind::Date).await?;
        let beds = sort_by_index(&beds)?;

        let mut table = TimeSeries::new("hospitalized", intake)?;
        table.outer_join(died).await?;
        table.outer_join(cumulative).await?;
        table.fill_int(&ZERO_FILLED).await?;

        derive_mortality_rate(&mut table).await?;
        derive_growth(&mut table, "intakeCount").await?;
        table.outer_join(beds).await?;

        let batch = table.collect().await?;
        info!(
            "{table} table has {rows} days",
            table: table.name().to_string(),
            rows: batch.num_rows(),
        );
        Ok(batch)
    }

    /// Fetch a table that is written as-is under a new index label. Rows
    /// with repeated labels are all kept.
    pub async fn passthrough_table(&self, source: &TableSource, label: &str) -> Result<RecordBatch> {
        let batch = self.fetch(source, IndexKind::Label).await?;
        relabel_index(&batch, label)
    }

    /// Fetch everything, then write the three CSV files.
    ///
    /// Nothing is written until every table has been fetched and derived.
    pub async fn run(&self) -> Result<Outputs> {
        let hospitalized = self.hospitalized_table().await?;
        let demographics = self
            .passthrough_table(&self.sources.age_distribution, "age_group")
            .await?;
        let durations = self
            .passthrough_table(&self.sources.treatment_durations, "days_of_treatment")
            .await?;

        std::fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let outputs = Outputs {
            hospitalized: self.output_dir.join(HOSPITALIZED_CSV),
            demographics: self.output_dir.join(DEMOGRAPHICS_CSV),
            treatment_durations: self.output_dir.join(TREATMENT_DURATIONS_CSV),
        };
        write_csv(&hospitalized, &outputs.hospitalized)?;
        write_csv(&demographics, &outputs.demographics)?;
        write_csv(&durations, &outputs.treatment_durations)?;
        Ok(outputs)
    }
}
