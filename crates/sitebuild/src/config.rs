// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Page configuration, parsed from `data/charts.yml`.
//!
//! ```yaml
//! chart_config:
//!   colors: ["#1f77b4", "#ff7f0e"]
//!
//! pages:
//!   hospital:
//!     file: "index.html"
//!     title: "Hospital admissions"
//!     charts:
//!       - { id: intake, csv: hospitalized.csv, column: intakeCount }
//!     cards:
//!       - { title: "Mortality", text: "Deceased over **cumulative** intake" }
//! ```
//!
//! Pages keep document order. Fields other than `file`, `charts` and
//! `cards` are passed to the template untouched as part of `data`.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// Whole configuration for one build.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    /// Chart settings shared by every page
    pub chart_config: Value,
    pub pages: Vec<Page>,
}

/// One configured page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Key of the page in the `pages` mapping
    pub id: String,
    /// The page's full record
    pub data: Value,
    /// Output path, relative to the output directory
    pub file: PathBuf,
    pub charts: Option<Vec<Value>>,
    pub cards: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawSiteConfig {
    #[serde(default = "empty_object")]
    chart_config: Value,
    #[serde(default)]
    pages: Option<serde_yaml_ng::Mapping>,
}

#[derive(Debug, Deserialize)]
struct PageFields {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    charts: Option<Vec<Value>>,
    #[serde(default)]
    cards: Option<Vec<Value>>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Load and validate the page configuration file.
pub fn load_site_config<P: AsRef<Path>>(path: P) -> Result<SiteConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_site_config(&content)
}

pub fn parse_site_config(yaml: &str) -> Result<SiteConfig> {
    let raw: RawSiteConfig =
        serde_yaml_ng::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
    let mapping = raw
        .pages
        .ok_or_else(|| Error::Config("missing 'pages' mapping".to_string()))?;

    let mut pages = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let id = key
            .as_str()
            .ok_or_else(|| Error::Config(format!("page key {key:?} is not a string")))?
            .to_string();
        pages.push(parse_page(id, &value)?);
    }

    Ok(SiteConfig {
        chart_config: raw.chart_config,
        pages,
    })
}

fn parse_page(id: String, value: &serde_yaml_ng::Value) -> Result<Page> {
    let data = match serde_json::to_value(value)
        .map_err(|e| Error::Config(format!("page '{id}': {e}")))?
    {
        Value::Null => empty_object(),
        data @ Value::Object(_) => data,
        _ => return Err(Error::Config(format!("page '{id}' is not a mapping"))),
    };

    let fields: PageFields = serde_json::from_value(data.clone())
        .map_err(|e| Error::Config(format!("page '{id}': {e}")))?;
    let file = match fields.file {
        Some(file) => validate_output_file(&id, &file)?,
        None => PathBuf::from(format!("{id}.html")),
    };

    Ok(Page {
        id,
        data,
        file,
        charts: fields.charts,
        cards: fields.cards,
    })
}

/// The page file must stay inside the output directory.
fn validate_output_file(id: &str, file: &str) -> Result<PathBuf> {
    let path = PathBuf::from(file);
    let inside = !file.trim().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !inside {
        return Err(Error::Config(format!(
            "page '{id}': file '{file}' is not a relative path inside the output directory"
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pages_in_document_order() {
        let yaml = r#"
chart_config:
  height: 300
pages:
  zeta:
    file: "zeta.html"
    title: "Last alphabetically"
    charts: [a, b, c]
  alpha:
    file: "sub/alpha.html"
"#;
        let config = parse_site_config(yaml).expect("parse config");
        assert_eq!(config.chart_config["height"], 300);
        assert_eq!(config.pages.len(), 2);
        assert_eq!(config.pages[0].id, "zeta");
        assert_eq!(config.pages[0].data["title"], "Last alphabetically");
        assert_eq!(config.pages[0].charts.as_ref().map(Vec::len), Some(3));
        assert_eq!(config.pages[0].cards, None);
        assert_eq!(config.pages[1].file, PathBuf::from("sub/alpha.html"));
    }

    #[test]
    fn missing_file_defaults_to_page_id() {
        let config = parse_site_config("pages:\n  overview:\n    title: x\n").expect("parse");
        assert_eq!(config.pages[0].file, PathBuf::from("overview.html"));
        assert!(config.chart_config.is_object());
    }

    #[test]
    fn missing_pages_is_config_error() {
        let err = parse_site_config("chart_config: {}\n").expect_err("no pages");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn escaping_file_rejected() {
        for file in ["../outside.html", "/etc/passwd", ""] {
            let yaml = format!("pages:\n  p:\n    file: \"{file}\"\n");
            assert!(
                matches!(parse_site_config(&yaml), Err(Error::Config(_))),
                "{file} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        assert!(matches!(
            parse_site_config("pages: [unclosed"),
            Err(Error::Config(_))
        ));
    }
}
