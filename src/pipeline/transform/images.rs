//! Lazy-loading and sizing attributes for `<img>`.
//!
//! Images that already declare `loading` or `data-src` are left alone, as are
//! exempt images (above-the-fold content the visitor sees first).

use super::{StageError, Transform, rewrite_tags};
use crate::config::ImagesConfig;
use crate::utils::html::{Tag, element_ranges, escape_attr, find_tags, within};

/// Attributes searched for exempt markers.
const MARKED_ATTRS: &[&str] = &["class", "id", "alt", "src", "data-src"];

/// Extensions that get a `@2x` srcset candidate.
const RASTER_EXTS: &[&str] = &["png", "jpg", "jpeg", "webp", "avif"];

/// Decides which images must load eagerly.
#[derive(Debug, Clone)]
pub struct ExemptPolicy {
    markers: Vec<String>,
}

impl ExemptPolicy {
    pub fn new(markers: &[String]) -> Self {
        Self {
            markers: markers
                .iter()
                .filter(|m| !m.is_empty())
                .map(|m| m.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Eager by explicit request, or because a marker names it as page chrome.
    pub fn is_exempt(&self, tag: &Tag<'_>) -> bool {
        let eager = tag
            .get("loading")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("eager"));
        let high = tag
            .get("fetchpriority")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("high"));
        if eager || high {
            return true;
        }

        MARKED_ATTRS
            .iter()
            .filter_map(|name| tag.get(name))
            .any(|value| {
                let value = value.to_ascii_lowercase();
                self.markers.iter().any(|m| value.contains(m.as_str()))
            })
    }
}

pub struct ImageAttrs {
    policy: ExemptPolicy,
    width: u32,
    height: u32,
    srcset: bool,
}

impl ImageAttrs {
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            policy: ExemptPolicy::new(&config.exempt),
            width: config.default_width,
            height: config.default_height,
            srcset: config.srcset,
        }
    }

    fn rewrite(&self, tag: &Tag<'_>) -> Option<String> {
        if tag.has("loading") || tag.has("data-src") || self.policy.is_exempt(tag) {
            return None;
        }

        let mut extra = String::from(r#" loading="lazy""#);
        if !tag.has("decoding") {
            extra.push_str(r#" decoding="async""#);
        }
        if !tag.has("fetchpriority") {
            extra.push_str(r#" fetchpriority="low""#);
        }
        if !tag.has("width") {
            extra.push_str(&format!(r#" width="{}""#, self.width));
        }
        if !tag.has("height") {
            extra.push_str(&format!(r#" height="{}""#, self.height));
        }
        if self.srcset
            && !tag.has("srcset")
            && !tag.has("data-srcset")
            && let Some(srcset) = tag.get("src").and_then(density_srcset)
        {
            extra.push_str(&format!(r#" srcset="{}""#, escape_attr(&srcset)));
        }

        Some(tag.with_appended(&extra))
    }
}

impl Transform for ImageAttrs {
    fn name(&self) -> &'static str {
        "images"
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

/// `a/b.png?v=1` -> `a/b.png?v=1 1x, a/b@2x.png?v=1 2x`
///
/// Only for first-party raster images; `None` for remote, inline, or vector
/// sources and for names that already carry a density suffix.
fn density_srcset(src: &str) -> Option<String> {
    let src = src.trim();
    let lower = src.to_ascii_lowercase();
    if src.is_empty()
        || ["http://", "https://", "//", "data:", "blob:"]
            .iter()
            .any(|p| lower.starts_with(p))
    {
        return None;
    }

    let path_end = src.find(['?', '#']).unwrap_or(src.len());
    let (path, suffix) = src.split_at(path_end);
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let dot = path[name_start..].rfind('.').map(|i| name_start + i)?;
    let (stem, ext) = (&path[..dot], &path[dot + 1..]);

    if stem.len() == name_start
        || stem.ends_with("@2x")
        || !RASTER_EXTS.iter().any(|e| ext.eq_ignore_ascii_case(e))
    {
        return None;
    }
    Some(format!("{src} 1x, {stem}@2x.{ext}{suffix} 2x"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> ImageAttrs {
        ImageAttrs::new(&ImagesConfig::default())
    }

    #[test]
    fn test_adds_attributes() {
        let out = stage().apply(r#"<img src="a.png">"#).unwrap();
        assert_eq!(
            out,
            r#"<img src="a.png" loading="lazy" decoding="async" fetchpriority="low" width="800" height="600" srcset="a.png 1x, a@2x.png 2x">"#
        );
    }

    #[test]
    fn test_keeps_existing_dimensions() {
        let out = stage()
            .apply(r#"<img src="https://cdn.example.com/a.png" width="10" height="20" />"#)
            .unwrap();
        assert_eq!(
            out,
            r#"<img src="https://cdn.example.com/a.png" width="10" height="20" loading="lazy" decoding="async" fetchpriority="low"/>"#
        );
    }

    #[test]
    fn test_exempt_images_untouched() {
        for html in [
            r#"<img class="site-logo" src="a.png">"#,
            r#"<img src="img/header-bg.jpg">"#,
            r#"<img id="Hero" src="a.png">"#,
            r#"<img alt="above-the-fold banner" src="a.png">"#,
            r#"<img src="a.png" loading="eager">"#,
            r#"<img src="a.png" fetchpriority="high">"#,
        ] {
            assert_eq!(stage().apply(html).unwrap(), html);
        }
    }

    #[test]
    fn test_attribute_detection_is_name_anchored() {
        let out = stage().apply(r#"<img data-loading="x" src="a.gif">"#).unwrap();
        assert!(out.contains(r#" loading="lazy""#));
        assert!(!out.contains("srcset"));
    }

    #[test]
    fn test_noscript_images_untouched() {
        let html = r#"<noscript><img src="pixel.gif"></noscript>"#;
        assert_eq!(stage().apply(html).unwrap(), html);
    }

    #[test]
    fn test_image_after_script_with_markup_string() {
        let html = r#"<script>if (s.indexOf("<img ") >= 0) {}</script><p>don't</p><img src="a.png">"#;
        let out = stage().apply(html).unwrap();
        assert!(out.contains(r#"<img src="a.png" loading="lazy""#));
        assert!(out.starts_with(r#"<script>if (s.indexOf("<img ") >= 0) {}</script>"#));
    }

    #[test]
    fn test_idempotent() {
        let html = r#"<p><img src="a.png"><img src="logo.svg"></p>"#;
        let once = stage().apply(html).unwrap();
        assert_eq!(stage().apply(&once).unwrap(), once);
    }

    #[test]
    fn test_density_srcset() {
        assert_eq!(
            density_srcset("img/a.b.jpg?v=2").as_deref(),
            Some("img/a.b.jpg?v=2 1x, img/a.b@2x.jpg?v=2 2x")
        );
        assert_eq!(density_srcset("icon.svg"), None);
        assert_eq!(density_srcset("//cdn/a.png"), None);
        assert_eq!(density_srcset("data:image/png;base64,xyz"), None);
        assert_eq!(density_srcset("a@2x.png"), None);
        assert_eq!(density_srcset("dir.v1/noext"), None);
        assert_eq!(density_srcset("img/.png"), None);
    }
}
