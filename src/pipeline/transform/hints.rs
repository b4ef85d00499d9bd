//! Resource hints and non-blocking first-party stylesheets.
//!
//! - Inserts `preconnect`, `dns-prefetch` and `preload` links before `</head>`,
//!   each only when the page has no link with the same `rel` and `href`
//! - Rewrites stylesheets under a deferred prefix into a `preload` that swaps
//!   itself to a stylesheet on load, with a `<noscript>` fallback

use std::collections::HashSet;

use super::{StageError, Transform, insert_before_head_end, rel_has, rewrite_tags};
use crate::config::{HintsConfig, PreconnectHint, PreloadHint};
use crate::utils::html::{element_ranges, escape_attr, find_tags, within};

/// Marks a stylesheet rewritten by this stage.
const DEFERRED_MARK: &str = r#"data-pageopt="style""#;

pub struct ResourceHints {
    preconnect: Vec<PreconnectHint>,
    dns_prefetch: Vec<String>,
    preload: Vec<PreloadHint>,
    defer_prefixes: Vec<String>,
}

impl ResourceHints {
    pub fn new(config: &HintsConfig) -> Self {
        Self {
            preconnect: config.preconnect.clone(),
            dns_prefetch: config.dns_prefetch.clone(),
            preload: config.preload.clone(),
            defer_prefixes: config.defer_styles.clone(),
        }
    }

    fn is_deferred(&self, href: &str) -> bool {
        let href = href.trim_start_matches("./").trim_start_matches('/');
        self.defer_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && href.starts_with(prefix.trim_start_matches('/')))
    }

    fn defer_styles(&self, html: &str) -> String {
        if self.defer_prefixes.is_empty() {
            return html.to_string();
        }
        let noscript = element_ranges(html, "noscript");
        let links = find_tags(html, "link");

        rewrite_tags(html, &links, |tag| {
            if within(&noscript, tag.start)
                || tag.has("data-pageopt")
                || !rel_has(tag, "stylesheet")
            {
                return None;
            }
            let href = tag.get("href").filter(|href| self.is_deferred(href))?;
            let href = escape_attr(href);
            Some(format!(
                "<link rel=\"preload\" href=\"{href}\" as=\"style\" onload=\"this.onload=null;this.rel='stylesheet'\" {DEFERRED_MARK}>\n\
                 <noscript><link rel=\"stylesheet\" href=\"{href}\"></noscript>"
            ))
        })
    }

    fn missing_hints(&self, html: &str) -> String {
        let existing = existing_links(html);
        let present = |rel: &str, href: &str| existing.contains(&(rel.to_string(), normalize(href)));
        let mut snippet = String::new();

        for hint in &self.preconnect {
            if !present("preconnect", &hint.href) {
                let crossorigin = if hint.crossorigin { " crossorigin" } else { "" };
                snippet.push_str(&format!(
                    "<link rel=\"preconnect\" href=\"{}\"{crossorigin}>\n",
                    escape_attr(&hint.href)
                ));
            }
        }
        for origin in &self.dns_prefetch {
            if !present("dns-prefetch", origin) {
                snippet.push_str(&format!(
                    "<link rel=\"dns-prefetch\" href=\"{}\">\n",
                    escape_attr(origin)
                ));
            }
        }
        for hint in &self.preload {
            if !present("preload", &hint.href) {
                let crossorigin = if hint.crossorigin { " crossorigin" } else { "" };
                snippet.push_str(&format!(
                    "<link rel=\"preload\" href=\"{}\" as=\"{}\"{crossorigin}>\n",
                    escape_attr(&hint.href),
                    escape_attr(&hint.kind)
                ));
            }
        }
        snippet
    }
}

impl Transform for ResourceHints {
    fn name(&self) -> &'static str {
        "hints"
    }

    fn apply(&self, html: &str) -> Result<String, StageError> {
        let html = self.defer_styles(html);
        let snippet = self.missing_hints(&html);
        if snippet.is_empty() {
            return Ok(html);
        }
        Ok(insert_before_head_end(&html, &snippet).unwrap_or(html))
    }
}

/// `(rel token, href)` pairs of every `<link>` on the page.
fn existing_links(html: &str) -> HashSet<(String, String)> {
    find_tags(html, "link")
        .iter()
        .filter_map(|tag| Some((tag.get("rel")?, tag.get("href")?)))
        .flat_map(|(rel, href)| {
            rel.split_ascii_whitespace()
                .map(|token| (token.to_ascii_lowercase(), normalize(href)))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn normalize(href: &str) -> String {
    href.trim().trim_end_matches('/').to_string()
}
