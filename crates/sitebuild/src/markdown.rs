// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Markdown → sanitized HTML.
//!
//! Conversion happens before templating: templates receive finished HTML
//! and only ever mark it `safe`. Markdown here comes from configuration and
//! content files, so it is treated as untrusted:
//!
//! - raw HTML blocks and inline tags are escaped and shown as text
//! - `javascript:`, `vbscript:` and `data:` link and image targets are
//!   replaced by `#`
//!
//! Headings get `id` anchors, and a paragraph holding only `[TOC]` is
//! replaced by a nested table of contents.

use crate::error::{Error, Result};
use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html::push_html};
use serde_json::{Map, Value};
use std::collections::HashMap;

const TOC_MARKER: &str = "[TOC]";
const TOC_PLACEHOLDER: &str = "<!-- HOSPSTATS_TOC -->";

/// A heading found while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub slug: String,
}

/// A rendered Markdown document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMarkdown {
    pub html: String,
    /// Table of contents, empty when the document has no headings
    pub toc: String,
    /// Front matter fields
    pub meta: Map<String, Value>,
    pub headings: Vec<Heading>,
}

/// Render a Markdown fragment (card text, captions) to sanitized HTML.
pub fn markdown_to_html(content: &str) -> String {
    render_body(content).0
}

/// Render a full document: optional YAML front matter, then Markdown.
pub fn render_document(source: &str) -> Result<RenderedMarkdown> {
    let (front, body) = split_frontmatter(source);
    let meta = if front.is_empty() {
        Map::new()
    } else {
        match serde_yaml_ng::from_str::<Value>(&front)
            .map_err(|e| Error::Config(format!("bad front matter: {e}")))?
        {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(Error::Config("front matter is not a mapping".to_string())),
        }
    };

    let (html, headings) = render_body(&body);
    Ok(RenderedMarkdown {
        html,
        toc: render_toc(&headings),
        meta,
        headings,
    })
}

fn render_body(content: &str) -> (String, Vec<Heading>) {
    let options =
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS | Options::ENABLE_TABLES;
    let parser = Parser::new_ext(content, options);

    let events: Vec<Event<'_>> = parser.map(sanitize).collect();
    let events = mark_toc(events);
    let (events, headings) = inject_heading_anchors(events);

    let mut html = String::with_capacity(content.len() * 2);
    push_html(&mut html, events.into_iter());

    if html.contains(TOC_PLACEHOLDER) {
        html = html.replace(TOC_PLACEHOLDER, &render_toc(&headings));
    }
    (html, headings)
}

fn is_unsafe_url(url: &str) -> bool {
    let url = url.trim_start().to_ascii_lowercase();
    ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

/// Escape raw HTML and neutralize script URLs.
fn sanitize(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if is_unsafe_url(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) if is_unsafe_url(&dest_url) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        other => other,
    }
}

/// Replace paragraphs consisting only of `[TOC]` with a placeholder.
fn mark_toc(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut pending: Option<Vec<Event<'_>>> = None;

    for event in events {
        match pending.take() {
            None if matches!(event, Event::Start(Tag::Paragraph)) => {
                pending = Some(vec![event]);
            }
            None => out.push(event),
            Some(mut buffer) if matches!(event, Event::End(TagEnd::Paragraph)) => {
                if is_toc_paragraph(&buffer) {
                    out.push(Event::Html(CowStr::Borrowed(TOC_PLACEHOLDER)));
                } else {
                    out.append(&mut buffer);
                    out.push(event);
                }
            }
            Some(mut buffer) => {
                buffer.push(event);
                pending = Some(buffer);
            }
        }
    }
    if let Some(mut buffer) = pending {
        out.append(&mut buffer);
    }
    out
}

/// `buffer` starts with the paragraph's opening event.
fn is_toc_paragraph(buffer: &[Event<'_>]) -> bool {
    let mut text = String::new();
    for event in buffer.iter().skip(1) {
        match event {
            Event::Text(t) => text.push_str(t),
            _ => return false,
        }
    }
    text.trim() == TOC_MARKER
}

/// Slugify text for use as an HTML id attribute.
///
/// Lowercases, replaces non-alphanumeric runs with hyphens, strips
/// leading/trailing hyphens.
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_hyphen = true; // suppress leading hyphen
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn level_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Give every heading a unique `id` and collect them for the TOC.
///
/// Repeated slugs get `_1`, `_2`, ... suffixes. h2 and deeper also get a
/// clickable `#` anchor.
fn inject_heading_anchors(events: Vec<Event<'_>>) -> (Vec<Event<'_>>, Vec<Heading>) {
    let mut out: Vec<Event<'_>> = Vec::with_capacity(events.len());
    let mut headings = Vec::new();
    let mut used: HashMap<String, usize> = HashMap::new();

    let mut in_heading: Option<HeadingLevel> = None;
    let mut heading_text = String::new();
    let mut heading_events: Vec<Event<'_>> = Vec::new();

    for event in events {
        match &event {
            Event::Start(Tag::Heading { level, .. }) => {
                in_heading = Some(*level);
                heading_text.clear();
                heading_events.clear();
            }
            Event::End(TagEnd::Heading(level)) if in_heading == Some(*level) => {
                let n = level_number(*level);
                let base = slugify(&heading_text);
                let base = if base.is_empty() { "section".to_string() } else { base };
                let count = used.entry(base.clone()).or_insert(0);
                let slug = if *count == 0 {
                    base.clone()
                } else {
                    format!("{base}_{count}")
                };
                *count += 1;

                out.push(Event::Html(format!("<h{n} id=\"{slug}\">").into()));
                out.append(&mut heading_events);
                if n >= 2 {
                    out.push(Event::Html(
                        format!(" <a class=\"anchor\" href=\"#{slug}\" aria-hidden=\"true\">#</a>")
                            .into(),
                    ));
                }
                out.push(Event::Html(format!("</h{n}>\n").into()));

                headings.push(Heading {
                    level: n,
                    text: heading_text.trim().to_string(),
                    slug,
                });
                in_heading = None;
            }
            Event::Text(text) | Event::Code(text) if in_heading.is_some() => {
                heading_text.push_str(text);
                heading_events.push(event);
            }
            _ if in_heading.is_some() => heading_events.push(event),
            _ => out.push(event),
        }
    }

    (out, headings)
}

/// Nested `<ul>` lists mirroring the heading hierarchy.
pub fn render_toc(headings: &[Heading]) -> String {
    if headings.is_empty() {
        return String::new();
    }

    // One entry per open <ul>, each with an open <li>
    let mut stack: Vec<u8> = Vec::new();
    let mut html = String::from("<div class=\"toc\">\n");

    for heading in headings {
        match stack.last().copied() {
            None => {
                html.push_str("<ul>\n");
                stack.push(heading.level);
            }
            Some(top) if heading.level > top => {
                html.push_str("<ul>\n");
                stack.push(heading.level);
            }
            Some(_) => {
                html.push_str("</li>\n");
                while stack.len() > 1 && stack.last().is_some_and(|&top| heading.level < top) {
                    stack.pop();
                    html.push_str("</ul>\n");
                    if stack.last().is_some_and(|&parent| heading.level > parent) {
                        html.push_str("<ul>\n");
                        stack.push(heading.level);
                        break;
                    }
                    html.push_str("</li>\n");
                }
            }
        }
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            heading.slug,
            tera::escape_html(&heading.text)
        ));
    }

    while stack.pop().is_some() {
        html.push_str("</li>\n</ul>\n");
    }
    html.push_str("</div>\n");
    html
}

/// Split `---` delimited YAML front matter from the body.
fn split_frontmatter(content: &str) -> (String, String) {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("---") {
        return (String::new(), content.to_string());
    }
    let after = &trimmed[3..];
    if let Some(end) = after.find("\n---") {
        (after[..end].trim().to_string(), after[end + 4..].to_string())
    } else {
        (String::new(), content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markdown_basic() {
        let html = markdown_to_html("Some **bold** text and a [link](hospitalized.csv).");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<a href=\"hospitalized.csv\">link</a>"));
    }

    #[test]
    fn test_tables_enabled() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = markdown_to_html("<script>alert(1)</script>\n\nInline <b>tag</b>.");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_script_links_neutralized() {
        let html = markdown_to_html("[x](javascript:alert) and [y](JavaScript:void)");
        assert!(!html.to_lowercase().contains("javascript:"));
        assert!(html.contains("href=\"#\""));
    }

    #[test]
    fn test_data_urls_neutralized() {
        let html = markdown_to_html("[x](data:text/html;base64,PHNjcmlwdD4=) ![y](DATA:image/png;base64,iVBOR)");
        assert!(!html.to_lowercase().contains("data:"));
        assert_eq!(html.matches("=\"#\"").count(), 2);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Leading & trailing!  "), "leading-trailing");
        assert_eq!(slugify("Ziekenhuisopnames (IC)"), "ziekenhuisopnames-ic");
    }

    #[test]
    fn test_heading_anchors_unique() {
        let html = markdown_to_html("## Data\n\n## Data\n\n# Title");
        assert!(html.contains("<h2 id=\"data\">"));
        assert!(html.contains("<h2 id=\"data_1\">"));
        assert!(html.contains("href=\"#data\""));
        // h1 gets an id but no anchor link
        assert!(html.contains("<h1 id=\"title\">Title</h1>"));
    }

    #[test]
    fn test_toc_marker_replaced() {
        let html = markdown_to_html("[TOC]\n\n# Intro\n\n## Sources\n\n## Method\n\n# End");
        assert!(!html.contains("[TOC]"));
        assert!(!html.contains(TOC_PLACEHOLDER));
        let toc_start = html.find("<div class=\"toc\">").expect("toc present");
        let intro = html.find("<h1 id=\"intro\">").expect("heading present");
        assert!(toc_start < intro);
        assert!(html.contains("<li><a href=\"#sources\">Sources</a>"));
    }

    #[test]
    fn test_toc_text_escaped() {
        let toc = render_toc(&[Heading {
            level: 1,
            text: "Bedden & <IC>".to_string(),
            slug: "bedden-ic".to_string(),
        }]);
        assert!(toc.contains("<a href=\"#bedden-ic\">Bedden &amp; &lt;IC&gt;</a>"));
    }

    #[test]
    fn test_toc_nesting() {
        let headings: Vec<Heading> = [(1, "a"), (3, "b"), (2, "c"), (1, "d")]
            .iter()
            .map(|&(level, text)| Heading {
                level,
                text: text.to_string(),
                slug: text.to_string(),
            })
            .collect();
        let toc = render_toc(&headings);
        let compact: String = toc.split_whitespace().collect();
        assert_eq!(
            compact,
            "<divclass=\"toc\"><ul><li><ahref=\"#a\">a</a><ul><li><ahref=\"#b\">b</a></li></ul>\
             <ul><li><ahref=\"#c\">c</a></li></ul></li><li><ahref=\"#d\">d</a></li></ul></div>"
        );
    }

    #[test]
    fn test_document_front_matter() {
        let doc = render_document("---\ntitle: Uitleg\n---\n\n# Explanation\n\nBody.")
            .expect("render");
        assert_eq!(doc.meta.get("title"), Some(&Value::from("Uitleg")));
        assert_eq!(doc.headings.len(), 1);
        assert!(doc.toc.contains("#explanation"));
        assert!(doc.html.contains("<p>Body.</p>"));
    }

    #[test]
    fn test_document_without_front_matter() {
        let doc = render_document("# Just markdown").expect("render");
        assert!(doc.meta.is_empty());
        assert!(doc.html.contains("Just markdown"));
    }

    #[test]
    fn test_bad_front_matter_is_config_error() {
        let err = render_document("---\n: [\n---\nbody").expect_err("bad yaml");
        assert!(matches!(err, Error::Config(_)));
    }
}
