//! Remote data sources.
//!
//! The defaults are the published Dutch datasets; a YAML file of the same
//! shape can replace them (mirrors, local test servers).
//!
//! ```yaml
//! intake_count:
//!   url: "https://example.org/intake-count.xlsx"
//!   columns: ["value"]
//!   rename: { value: intakeCount }
//! lcps:
//!   url: "http://lcps.nu/wp-content/uploads/covid-19.csv"
//!   format: csv
//!   date_format: "%d-%m-%Y"
//!   columns: ["Kliniek_Bedden"]
//!   rename: { Kliniek_Bedden: lcps_beds }
//!   headers: { Referer: "https://lcps.nu/datafeed/" }
//!   cookies: { rm_scroll_pos: "1168" }
//! # ... one entry per table, see `Sources`
//! ```

use crate::error::{Error, Result};
use crate::source::SourceFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const DUTCHCOVID: &str =
    "https://github.com/Sikerdebaard/dutchcovid19data/raw/master/data/hospitalized";

const LCPS_URL: &str = "http://lcps.nu/wp-content/uploads/covid-19.csv";

/// The LCPS feed rejects requests that don't look like a browser.
const LCPS_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (X11; Fedora; Linux x86_64; rv:87.0) Gecko/20100101 Firefox/87.0",
    ),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Referer", "https://lcps.nu/datafeed/"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
    ("TE", "Trailers"),
];

const LCPS_COOKIES: &[(&str, &str)] = &[("rm_scroll_pos", "1168")];

/// One remote table and how to cut it down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSource {
    pub url: String,
    #[serde(default)]
    pub format: SourceFormat,
    /// Columns to keep (besides the index); empty keeps everything
    #[serde(default)]
    pub columns: Vec<String>,
    /// Column renames applied after selection
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    /// chrono format of the index column, when it is not ISO
    #[serde(default)]
    pub date_format: Option<String>,
    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Cookies sent with the request
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

impl TableSource {
    fn xlsx(name: &str) -> Self {
        Self {
            url: format!("{DUTCHCOVID}/{name}.xlsx"),
            format: SourceFormat::Xlsx,
            columns: Vec::new(),
            rename: BTreeMap::new(),
            date_format: None,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
        }
    }

    fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn with_rename(mut self, from: &str, to: &str) -> Self {
        self.rename.insert(from.to_string(), to.to_string());
        self
    }
}

/// Every table the fetcher downloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sources {
    pub intake_count: TableSource,
    pub died_and_survivors: TableSource,
    pub intake_cumulative: TableSource,
    pub lcps: TableSource,
    pub age_distribution: TableSource,
    pub treatment_durations: TableSource,
}

impl Default for Sources {
    fn default() -> Self {
        let lcps = TableSource {
            url: LCPS_URL.to_string(),
            format: SourceFormat::Csv,
            columns: vec!["Kliniek_Bedden".to_string()],
            rename: BTreeMap::from([("Kliniek_Bedden".to_string(), "lcps_beds".to_string())]),
            date_format: Some("%d-%m-%Y".to_string()),
            headers: LCPS_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            cookies: LCPS_COOKIES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        Self {
            intake_count: TableSource::xlsx("intake-count")
                .with_columns(&["value"])
                .with_rename("value", "intakeCount"),
            died_and_survivors: TableSource::xlsx("died-and-survivors-cumulative")
                .with_columns(&["cumulative_deceased", "cumulative_recovered"]),
            intake_cumulative: TableSource::xlsx("intake-cumulative")
                .with_columns(&["value"])
                .with_rename("value", "intakeCumulative"),
            lcps,
            age_distribution: TableSource::xlsx("age-distribution-status"),
            treatment_durations: TableSource::xlsx("behandelduur-distribution"),
        }
    }
}

impl Sources {
    fn entries(&self) -> [(&'static str, &TableSource); 6] {
        [
            ("intake_count", &self.intake_count),
            ("died_and_survivors", &self.died_and_survivors),
            ("intake_cumulative", &self.intake_cumulative),
            ("lcps", &self.lcps),
            ("age_distribution", &self.age_distribution),
            ("treatment_durations", &self.treatment_durations),
        ]
    }
}

/// Load sources from a YAML file
pub fn load_sources<P: AsRef<Path>>(path: P) -> Result<Sources> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let sources: Sources = serde_yaml_ng::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    validate_sources(&sources)?;
    Ok(sources)
}

/// Check sources before anything is fetched
pub fn validate_sources(sources: &Sources) -> Result<()> {
    for (name, source) in sources.entries() {
        if source.url.trim().is_empty() {
            return Err(Error::Config(format!("{name}: url cannot be empty")));
        }
        if !source.columns.is_empty() {
            for from in source.rename.keys() {
                if !source.columns.contains(from) {
                    return Err(Error::Config(format!(
                        "{name}: renamed column '{from}' is not selected"
                    )));
                }
            }
        }
    }
    Ok(())
}
