use chrono::{DateTime, Local, TimeZone};
use sitebuild::{BuildContext, Error, load_site_config, parse_site_config};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const LAYOUT: &str = r#"<!DOCTYPE html>
<html><head><title>{% if title is defined %}{{ title }}{% elif data.title is defined %}{{ data.title }}{% endif %}</title>
<link rel="stylesheet" href="style.css?v={{ version }}"></head>
<body>{% block body %}{% endblock body %}
<footer>Laatst bijgewerkt: {{ last_update }}</footer></body></html>
"#;

const STATS: &str = r#"{% extends "page.html.tera" %}
{% block body %}
{% if data.title is defined %}<h1>{{ data.title }}</h1>{% endif %}
{% for row in charts %}<div class="row">{% for chart in row %}<canvas id="{{ chart.id | default(value="") }}"></canvas>{% endfor %}</div>
{% endfor %}
{% for row in cards %}<div class="row">{% for card in row %}<div class="card">{{ card.text | markdown }}</div>{% endfor %}</div>
{% endfor %}
{% endblock body %}
"#;

const MARKDOWN: &str = r#"{% extends "page.html.tera" %}
{% block body %}{{ toc | safe }}{{ content | safe }}{% endblock body %}
"#;

const CHARTS: &str = r#"
chart_config:
  aspect_ratio: 2
pages:
  hospital:
    file: index.html
    title: Ziekenhuisopnames
    charts:
      - {id: intake}
      - {id: growth}
      - {id: mortality}
    cards:
      - {text: "Opnames per **dag**"}
  ic:
    title: IC
"#;

fn setup(root: &Path) {
    let templates = root.join("templates");
    std::fs::create_dir_all(&templates).expect("mkdir");
    std::fs::write(templates.join("page.html.tera"), LAYOUT).expect("write");
    std::fs::write(templates.join("stats.html.tera"), STATS).expect("write");
    std::fs::write(templates.join("markdown.html.tera"), MARKDOWN).expect("write");
    std::fs::write(
        templates.join("explanation.md"),
        "---\ntitle: Uitleg\n---\n\n[TOC]\n\n# Bronnen\n\n## NICE\n\nData van [NICE](https://nice.nl).\n",
    )
    .expect("write");
    std::fs::write(root.join("charts.yml"), CHARTS).expect("write");
}

fn built_at() -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2021, 2, 3, 9, 5, 0)
        .single()
        .expect("unambiguous time")
}

#[test]
fn test_full_build() {
    let dir = tempdir().expect("tempdir");
    setup(dir.path());
    let out = dir.path().join("html");

    let config = load_site_config(dir.path().join("charts.yml")).expect("config");
    let context = BuildContext::new(&dir.path().join("templates"), config, &out, built_at())
        .expect("templates");
    let summary = context
        .build(&[dir.path().join("templates").join("explanation.md")])
        .expect("build");

    assert_eq!(summary.timestamp, out.join("timestamp.json"));
    assert_eq!(summary.pages, vec![out.join("index.html"), out.join("ic.html")]);
    assert_eq!(summary.markdown_pages, vec![out.join("explanation.html")]);

    let stamp: String =
        serde_json::from_str(&std::fs::read_to_string(&summary.timestamp).expect("read"))
            .expect("json string");
    assert!(DateTime::parse_from_rfc3339(&stamp).is_ok());

    let index = std::fs::read_to_string(out.join("index.html")).expect("read");
    assert!(index.contains("<title>Ziekenhuisopnames</title>"));
    assert!(index.contains("Laatst bijgewerkt: 03-02-2021 09:05"));
    assert_eq!(index.matches("<div class=\"row\">").count(), 3);
    assert!(index.contains("<strong>dag</strong>"));

    let ic = std::fs::read_to_string(out.join("ic.html")).expect("read");
    assert!(ic.contains("<h1>IC</h1>"));
    assert!(!ic.contains("class=\"card\""));

    let explanation = std::fs::read_to_string(out.join("explanation.html")).expect("read");
    assert!(explanation.contains("<title>Uitleg</title>"));
    assert!(explanation.contains("<a href=\"#nice\">NICE</a>"));
    assert!(explanation.contains("<h2 id=\"nice\">"));
}

#[test]
fn test_missing_template_fails_build() {
    let dir = tempdir().expect("tempdir");
    setup(dir.path());
    std::fs::remove_file(dir.path().join("templates").join("stats.html.tera")).expect("rm");

    let config = load_site_config(dir.path().join("charts.yml")).expect("config");
    let context = BuildContext::new(
        &dir.path().join("templates"),
        config,
        dir.path().join("html"),
        built_at(),
    )
    .expect("remaining templates load");
    let err = context.build(&[]).expect_err("no stats template");
    assert!(matches!(err, Error::Template(_)));
}

#[test]
fn test_missing_config_is_io_error() {
    let dir = tempdir().expect("tempdir");
    let err = load_site_config(dir.path().join("absent.yml")).expect_err("missing");
    assert!(matches!(err, Error::Io { .. }));
}

/// Repository root holding `templates/` and `data/`.
fn site_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

#[test]
fn test_site_templates_build() {
    let root = site_root();
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("html");

    let config = load_site_config(root.join("data").join("charts.yml")).expect("config");
    let context =
        BuildContext::new(&root.join("templates"), config, &out, built_at()).expect("templates");
    let summary = context
        .build(&[root.join("templates").join("explanation.md")])
        .expect("build");

    assert_eq!(
        summary.pages,
        vec![
            out.join("index.html"),
            out.join("mortality.html"),
            out.join("demographics.html"),
        ]
    );
    let index = std::fs::read_to_string(out.join("index.html")).expect("read");
    assert!(index.contains("<title>Ziekenhuisopnames</title>"));
    assert!(index.contains("data-csv=\"hospitalized.csv\""));
    assert!(index.contains("<strong>nieuwe opnames</strong>"));

    let explanation = std::fs::read_to_string(out.join("explanation.html")).expect("read");
    assert!(explanation.contains("<title>Uitleg</title>"));
    assert!(explanation.contains("<div class=\"toc\">"));
}

#[test]
fn test_site_templates_accept_minimal_page() {
    let root = site_root();
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("html");

    let config = parse_site_config("pages:\n  bare:\n    charts: [{id: a}]\n").expect("config");
    let context =
        BuildContext::new(&root.join("templates"), config, &out, built_at()).expect("templates");
    let summary = context.build(&[]).expect("build");

    assert_eq!(summary.pages, vec![out.join("bare.html")]);
    let bare = std::fs::read_to_string(out.join("bare.html")).expect("read");
    assert!(bare.contains("<canvas id=\"a\" data-csv=\"\""));
    assert!(bare.contains("<title>COVID-19 ziekenhuisopnames</title>"));
    assert!(!bare.contains("<h1>"));
}
