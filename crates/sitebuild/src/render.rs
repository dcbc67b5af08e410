// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Page rendering.
//!
//! A [`BuildContext`] is created per build and owns everything rendering
//! needs: the tera environment (with the `markdown`/`stylize` filters), the
//! page configuration, the output directory and the build time.
//!
//! Templates, looked up by name in the templates directory:
//!
//! - `page.html.tera`: the shared layout
//! - `stats.html.tera`: configured chart pages, extends the layout
//! - `markdown.html.tera`: static content pages, extends the layout

use crate::config::{Page, SiteConfig};
use crate::error::{Error, Result};
use crate::layout::pair_up;
use crate::markdown::{markdown_to_html, render_document};
use chrono::{DateTime, Local, SecondsFormat};
use diagnostics::*;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

pub const STATS_TEMPLATE: &str = "stats.html.tera";
pub const MARKDOWN_TEMPLATE: &str = "markdown.html.tera";
pub const TIMESTAMP_FILE: &str = "timestamp.json";

/// Layout version baked into generated pages (asset cache busting).
const VERSION: &str = env!("CARGO_PKG_VERSION");

const LAST_UPDATE_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Tera filter turning Markdown into sanitized HTML. Its output is safe.
struct MarkdownFilter;

impl tera::Filter for MarkdownFilter {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let text = match value {
            Value::Null => return Ok(Value::String(String::new())),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(Value::String(markdown_to_html(&text)))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// Paths written by [`BuildContext::build`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    pub timestamp: PathBuf,
    pub pages: Vec<PathBuf>,
    pub markdown_pages: Vec<PathBuf>,
}

/// Everything one build needs.
pub struct BuildContext {
    tera: Tera,
    config: SiteConfig,
    output_dir: PathBuf,
    built_at: DateTime<Local>,
}

impl BuildContext {
    /// Load every `*.tera` template under `templates_dir`.
    pub fn new(
        templates_dir: &Path,
        config: SiteConfig,
        output_dir: impl Into<PathBuf>,
        built_at: DateTime<Local>,
    ) -> Result<Self> {
        let glob = format!("{}/**/*.tera", templates_dir.display());
        let tera = Tera::new(&glob)?;
        debug!(
            "Loaded {names} templates from {glob}",
            names: tera.get_template_names().count(),
            glob: glob.clone(),
        );
        Ok(Self::from_tera(tera, config, output_dir, built_at))
    }

    /// Wrap an already populated tera environment.
    pub fn from_tera(
        mut tera: Tera,
        config: SiteConfig,
        output_dir: impl Into<PathBuf>,
        built_at: DateTime<Local>,
    ) -> Self {
        tera.autoescape_on(vec![".html", ".html.tera", ".tera"]);
        tera.register_filter("markdown", MarkdownFilter);
        tera.register_filter("stylize", MarkdownFilter);
        Self {
            tera,
            config,
            output_dir: output_dir.into(),
            built_at,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Build time for display, `DD-MM-YYYY HH:MM`.
    pub fn last_update(&self) -> String {
        self.built_at.format(LAST_UPDATE_FORMAT).to_string()
    }

    fn base_context(&self, template: &str) -> Context {
        let mut ctx = Context::new();
        ctx.insert("last_update", &self.last_update());
        ctx.insert("template", template);
        ctx.insert("version", VERSION);
        ctx
    }

    /// Render one configured page.
    pub fn render_page(&self, page: &Page) -> Result<String> {
        let mut ctx = self.base_context(STATS_TEMPLATE);
        ctx.insert("page", &page.id);
        ctx.insert("data", &page.data);
        ctx.insert("chart_config", &self.config.chart_config);
        ctx.insert("charts", &pair_up(page.charts.as_deref()));
        ctx.insert("cards", &pair_up(page.cards.as_deref()));
        Ok(self.tera.render(STATS_TEMPLATE, &ctx)?)
    }

    /// Render a configured page to `<output>/<file>`.
    pub fn write_page(&self, page: &Page) -> Result<PathBuf> {
        let html = self.render_page(page)?;
        let path = self.output_dir.join(&page.file);
        write_file(&path, &html)?;
        info!(
            "Rendered page {id} to {file}",
            id: page.id.as_str(),
            file: path.display().to_string(),
        );
        Ok(path)
    }

    /// Render a Markdown file through the page layout.
    ///
    /// The Markdown is converted here; the template gets finished HTML as
    /// `content` (plus `toc`, `meta` and `title`).
    pub fn render_markdown_page(&self, source: &Path) -> Result<String> {
        let text = std::fs::read_to_string(source).map_err(|e| Error::io(source, e))?;
        let doc = render_document(&text)?;

        let title = doc
            .meta
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| doc.headings.first().map(|h| h.text.clone()))
            .unwrap_or_default();

        let mut ctx = self.base_context(MARKDOWN_TEMPLATE);
        ctx.insert("content", &doc.html);
        ctx.insert("toc", &doc.toc);
        ctx.insert("meta", &doc.meta);
        ctx.insert("title", &title);
        Ok(self.tera.render(MARKDOWN_TEMPLATE, &ctx)?)
    }

    /// Render a Markdown file to `<output>/<basename>.html`.
    pub fn write_markdown_page(&self, source: &Path) -> Result<PathBuf> {
        let stem = source
            .file_stem()
            .ok_or_else(|| Error::Config(format!("no file name in {}", source.display())))?;
        let html = self.render_markdown_page(source)?;
        let mut name = stem.to_os_string();
        name.push(".html");
        let path = self.output_dir.join(name);
        write_file(&path, &html)?;
        info!("Rendered markdown page {file}", file: path.display().to_string());
        Ok(path)
    }

    /// Record the build time, ISO-8601 with the local offset, as a JSON string.
    pub fn write_timestamp(&self) -> Result<PathBuf> {
        let stamp = self.built_at.to_rfc3339_opts(SecondsFormat::Micros, false);
        let path = self.output_dir.join(TIMESTAMP_FILE);
        write_file(&path, &serde_json::to_string(&stamp)?)?;
        Ok(path)
    }

    /// Write the timestamp, every configured page, then every Markdown page.
    pub fn build(&self, markdown_pages: &[PathBuf]) -> Result<BuildSummary> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let mut summary = BuildSummary {
            timestamp: self.write_timestamp()?,
            ..BuildSummary::default()
        };
        for page in &self.config.pages {
            summary.pages.push(self.write_page(page)?);
        }
        for source in markdown_pages {
            summary.markdown_pages.push(self.write_markdown_page(source)?);
        }

        info!(
            "Build complete: {pages} pages, {markdown} markdown pages",
            pages: summary.pages.len(),
            markdown: summary.markdown_pages.len(),
        );
        Ok(summary)
    }
}

/// Overwrite `path`, creating parent directories.
fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(path, contents.as_bytes()).map_err(|e| Error::io(path, e))
}
