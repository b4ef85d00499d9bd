//! Async loading for web-font stylesheets.
//!
//! A blocking `<link rel="stylesheet">` to the font host becomes a `preload`,
//! a `media="print"` stylesheet that switches to `all` once loaded, and a
//! `<noscript>` fallback. Rewritten links carry `data-pageopt="font"`.

use url::Url;

use super::{StageError, Transform, rel_has, rewrite_tags};
use crate::config::FontsConfig;
use crate::utils::html::{Tag, element_ranges, escape_attr, find_tags, within};

const FONT_MARK: &str = r#"data-pageopt="font""#;

pub struct FontLoader {
    host: String,
    files_host: String,
}

impl FontLoader {
    pub fn new(config: &FontsConfig) -> Self {
        Self {
            host: config.host.to_ascii_lowercase(),
            files_host: config.files_host.to_ascii_lowercase(),
        }
    }

    fn is_font_stylesheet(&self, tag: &Tag<'_>) -> bool {
        rel_has(tag, "stylesheet")
            && !tag.has("data-pageopt")
            && tag.get("href").is_some_and(|href| self.is_font_host(href))
    }

    fn is_font_host(&self, href: &str) -> bool {
        let href = href.trim();
        let absolute = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };
        Url::parse(&absolute)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.eq_ignore_ascii_case(&self.host)))
            .unwrap_or(false)
    }

    /// Preconnect links for the font hosts that the page does not have yet.
    fn missing_preconnects(&self, html: &str) -> String {
        let existing: Vec<String> = find_tags(html, "link")
            .iter()
            .filter(|tag| rel_has(tag, "preconnect"))
            .filter_map(|tag| tag.get("href"))
            .map(|href| href.trim().trim_end_matches('/').to_ascii_lowercase())
            .collect();

        let mut snippet = String::new();
        for (host, crossorigin) in [(&self.host, ""), (&self.files_host, " crossorigin")] {
            if host.is_empty() {
                continue;
            }
            let origin = format!("https://{host}");
            if !existing.contains(&origin) {
                snippet.push_str(&format!(
                    "<link rel=\"preconnect\" href=\"{origin}\"{crossorigin}>\n"
                ));
            }
        }
        snippet
    }
}

impl Transform for FontLoader {
    fn name(&self) -> &'static str {
        "fonts"
    }

    fn apply(&self, html: &str) -> Result<String, StageError> {
        let noscript = element_ranges(html, "noscript");
        let links: Vec<_> = find_tags(html, "link")
            .into_iter()
            .filter(|tag| !within(&noscript, tag.start) && self.is_font_stylesheet(tag))
            .collect();
        if links.is_empty() {
            return Ok(html.to_string());
        }

        let mut preconnects = Some(self.missing_preconnects(html));
        Ok(rewrite_tags(html, &links, |tag| {
            let href = escape_attr(tag.get("href").unwrap_or_default());
            let prefix = preconnects.take().unwrap_or_default();
            Some(format!(
                "{prefix}<link rel=\"preload\" as=\"style\" href=\"{href}\" {FONT_MARK}>\n\
                 <link rel=\"stylesheet\" href=\"{href}\" media=\"print\" onload=\"this.media='all'\" {FONT_MARK}>\n\
                 <noscript><link rel=\"stylesheet\" href=\"{href}\"></noscript>"
            ))
        }))
    }
}
