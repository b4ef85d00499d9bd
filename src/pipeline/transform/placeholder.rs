//! Placeholder lazy loading: the real image URL waits in `data-src` until the
//! performance script swaps it in.

use std::sync::LazyLock;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use super::{ExemptPolicy, StageError, Transform, rewrite_tags};
use crate::config::ImagesConfig;
use crate::utils::html::{Tag, element_ranges, escape_attr, find_tags, within};

/// Characters that may not appear raw in an SVG data URI.
const DATA_URI: &AsciiSet = &CONTROLS.add(b'<').add(b'>').add(b'"').add(b'#').add(b'%');

/// A 1x1 transparent SVG.
static PLACEHOLDER: LazyLock<String> = LazyLock::new(|| {
    let svg = "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 1 1'></svg>";
    format!("data:image/svg+xml,{}", utf8_percent_encode(svg, DATA_URI))
});

pub struct LazyPlaceholder {
    policy: ExemptPolicy,
}

impl LazyPlaceholder {
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            policy: ExemptPolicy::new(&config.exempt),
        }
    }

    fn rewrite(&self, tag: &Tag<'_>) -> Option<String> {
        if tag.has("data-src") || self.policy.is_exempt(tag) {
            return None;
        }
        let src_index = tag.attrs.iter().position(|a| a.name.eq_ignore_ascii_case("src"))?;
        let src = tag.attrs[src_index].value.as_deref()?.trim();
        if src.is_empty() || src.to_ascii_lowercase().starts_with("data:") {
            return None;
        }

        let mut edits = vec![(
            src_index,
            format!(
                "src=\"{}\" data-src=\"{}\"",
                PLACEHOLDER.as_str(),
                escape_attr(src)
            ),
        )];
        if let Some(i) = tag.attrs.iter().position(|a| a.name.eq_ignore_ascii_case("srcset")) {
            let srcset = tag.attrs[i].value.as_deref().unwrap_or_default();
            edits.push((i, format!("data-srcset=\"{}\"", escape_attr(srcset))));
        }
        Some(tag.with_replaced(edits))
    }
}

impl Transform for LazyPlaceholder {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn apply(&self, html: &str) -> Result<String, StageError> {
        let images = find_tags(html, "img");
        if images.is_empty() {
            return Ok(html.to_string());
        }
        // Markup inside <noscript> only renders when scripts are off
        let noscript = element_ranges(html, "noscript");
        Ok(rewrite_tags(html, &images, |tag| {
            if within(&noscript, tag.start) {
                None
            } else {
                self.rewrite(tag)
            }
        }))
    }
}
