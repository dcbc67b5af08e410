// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! # Sitebuild: static pages for the hospitalization dashboard
//!
//! Renders every page named in `data/charts.yml` through tera templates,
//! plus any Markdown content pages, and records the build time in
//! `timestamp.json`.
//!
//! ## Usage
//!
//! ```bash
//! build --config data/charts.yml --templates templates --output-dir html
//! ```

pub mod config;
mod error;
pub mod layout;
pub mod markdown;
pub mod render;

pub use config::{Page, SiteConfig, load_site_config, parse_site_config};
pub use error::{Error, Result};
pub use render::{BuildContext, BuildSummary};
