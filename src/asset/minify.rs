//! Minification for inlined CSS and whole HTML documents.
//!
//! Uses lightningcss for CSS and minify-html for HTML.

use std::sync::LazyLock;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// Minify CSS source code.
pub fn minify_css(source: &str) -> Option<String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}

/// Strip comments and collapse whitespace runs. Used when CSS does not parse.
pub fn collapse_css(source: &str) -> String {
    let stripped = COMMENT.replace_all(source, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Minify a full HTML document.
///
/// Closing tags and the `<html>`/`<head>` open tags are kept so that a later
/// run still finds `</head>` and `</body>`. Inline scripts are left alone.
pub fn minify_html(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = false;
    cfg.remove_processing_instructions = true;
    minify_html::minify(html, &cfg)
}
