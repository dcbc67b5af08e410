//! Dutch COVID-19 hospitalization data, fetched, joined and derived.
//!
//! Produces three CSV files in the output directory:
//!
//! - `hospitalized.csv`: daily intake, cumulative outcomes, mortality rate,
//!   growth and LCPS bed occupancy, indexed by `date`
//! - `hospital_demographics.csv`: indexed by `age_group`
//! - `hospital_treatment_durations.csv`: indexed by `days_of_treatment`

pub mod config;
pub mod derive;
mod error;
pub mod export;
pub mod fetch;
pub mod pipeline;
pub mod source;
pub mod table;
pub mod timeseries;

pub use config::{Sources, TableSource, load_sources};
pub use error::{Error, Result};
pub use fetch::{Fetch, HttpFetcher};
pub use pipeline::{FetchContext, Outputs};
pub use source::IndexKind;
pub use timeseries::TimeSeries;
