//! Lightweight HTML tag scanning.
//!
//! Stages rewrite markup as text. This module finds tags and their attributes
//! with byte offsets so a stage can splice new text in without touching the
//! bytes around it:
//! - `find_tags()` - start tags by name, skipping comments, `<script>` and `<style>` bodies
//! - `element_ranges()` - spans of `<name>...</name>` elements (e.g. `<noscript>`)
//! - `find_ci()` / `rfind_ci()` - ASCII case-insensitive marker search
//! - `escape_attr()` - attribute value escaping

use std::borrow::Cow;
use std::ops::Range;

// =============================================================================
// Escaping
// =============================================================================

/// Escape characters that would end or corrupt a double-quoted attribute value.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
#[inline]
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    if !s.contains(['"', '<', '>']) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '"' => result.push_str("&quot;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

// =============================================================================
// Marker Search
// =============================================================================

/// Find the first ASCII case-insensitive occurrence of `needle`.
pub fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    find_ci_from(haystack, needle, 0)
}

/// Find the first ASCII case-insensitive occurrence of `needle` at or after `from`.
pub fn find_ci_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || from > hay.len() || pat.len() > hay.len() - from {
        return None;
    }
    (from..=hay.len() - pat.len()).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

/// Find the last ASCII case-insensitive occurrence of `needle`.
pub fn rfind_ci(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || pat.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - pat.len())
        .rev()
        .find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

/// Insert `snippet` at byte offset `at`.
pub fn splice(html: &str, at: usize, snippet: &str) -> String {
    let mut out = String::with_capacity(html.len() + snippet.len());
    out.push_str(&html[..at]);
    out.push_str(snippet);
    out.push_str(&html[at..]);
    out
}

// =============================================================================
// Tags
// =============================================================================

/// A single attribute inside a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Attribute name as written.
    pub name: String,
    /// Raw value (entities are left as written). `None` for boolean attributes.
    pub value: Option<String>,
    /// Byte span of the whole `name="value"` text, relative to the tag start.
    pub span: Range<usize>,
}

/// A start tag located in a document.
#[derive(Debug, Clone)]
pub struct Tag<'a> {
    /// Byte offset of `<`.
    pub start: usize,
    /// Byte offset just past `>`.
    pub end: usize,
    /// The full tag text, `<img ... >`.
    pub raw: &'a str,
    pub attrs: Vec<Attr>,
    /// Offset (relative to `start`) of the closing `>` or `/>`.
    pub close_at: usize,
}

impl<'a> Tag<'a> {
    /// Look up an attribute by name (ASCII case-insensitive, whole name only).
    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attr(name).map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// The tag with `extra` inserted right before its closing `>` or `/>`.
    ///
    /// `extra` is expected to start with a space.
    pub fn with_appended(&self, extra: &str) -> String {
        let head = self.raw[..self.close_at].trim_end();
        format!("{}{}{}", head, extra, &self.raw[self.close_at..])
    }

    /// The tag with some attribute spans replaced.
    ///
    /// Each edit is `(attribute index, replacement text)`.
    pub fn with_replaced(&self, mut edits: Vec<(usize, String)>) -> String {
        edits.sort_by_key(|(i, _)| std::cmp::Reverse(self.attrs[*i].span.start));
        let mut out = self.raw.to_string();
        for (i, text) in edits {
            out.replace_range(self.attrs[i].span.clone(), &text);
        }
        out
    }
}

/// Find all start tags named `name` (ASCII case-insensitive).
///
/// Comments and `<script>`/`<style>` bodies are stepped over, never scanned.
/// Scanning stops at the first unterminated tag, so malformed tails are left
/// alone.
pub fn find_tags<'a>(html: &'a str, name: &str) -> Vec<Tag<'a>> {
    scan_tags(html, name, &opaque_ranges(html))
}

/// Scan for start tags, jumping over any `opaque` range a `<` falls in.
fn scan_tags<'a>(html: &'a str, name: &str, opaque: &[Range<usize>]) -> Vec<Tag<'a>> {
    let bytes = html.as_bytes();
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let start = pos + offset;
        if let Some(range) = opaque.iter().find(|r| r.contains(&start)) {
            pos = range.end;
            continue;
        }
        pos = start + 1;

        let Some(name_end) = tag_name_end(bytes, start, name) else {
            continue;
        };
        let Some(end) = tag_end(bytes, name_end) else {
            break;
        };
        let raw = &html[start..end];
        let close_at = if raw.ends_with("/>") {
            raw.len() - 2
        } else {
            raw.len() - 1
        };
        let attrs = parse_attributes(raw, name_end - start, close_at);
        tags.push(Tag {
            start,
            end,
            raw,
            attrs,
            close_at,
        });
        pos = end;
    }

    tags
}

/// Offset just past `<name` when a start tag named `name` opens at `start`.
///
/// `<img` must not match `<imgx`.
fn tag_name_end(bytes: &[u8], start: usize, name: &str) -> Option<usize> {
    let name_end = start + 1 + name.len();
    if bytes.get(start) != Some(&b'<')
        || name_end > bytes.len()
        || !bytes[start + 1..name_end].eq_ignore_ascii_case(name.as_bytes())
    {
        return None;
    }
    match bytes.get(name_end) {
        Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => Some(name_end),
        _ => None,
    }
}

/// Offset just past the `>` that closes a tag, honoring quoted values.
fn tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i + 1),
            None if b == b'<' => return None,
            None => {}
        }
    }
    None
}

/// Offset just past `</name ...>` at or after `from`, or the end of input.
fn close_tag_end(html: &str, name: &str, from: usize) -> usize {
    find_ci_from(html, &format!("</{name}"), from)
        .map(|i| html[i..].find('>').map_or(html.len(), |gt| i + gt + 1))
        .unwrap_or(html.len())
}

/// Parse attributes in `raw[from..to]`, recording spans relative to `raw`.
///
/// Input: `src="a.png" alt='x' width=10 hidden`
fn parse_attributes(raw: &str, from: usize, to: usize) -> Vec<Attr> {
    let bytes = raw.as_bytes();
    let mut attrs = Vec::new();
    let mut i = from;

    while i < to {
        if bytes[i].is_ascii_whitespace() || bytes[i] == b'/' {
            i += 1;
            continue;
        }

        let name_start = i;
        while i < to && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' && bytes[i] != b'/' {
            i += 1;
        }
        let name = raw[name_start..i].to_string();

        let mut j = i;
        while j < to && bytes[j].is_ascii_whitespace() {
            j += 1;
        }

        if j < to && bytes[j] == b'=' {
            j += 1;
            while j < to && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let (value, value_end) = if j < to && (bytes[j] == b'"' || bytes[j] == b'\'') {
                let quote = bytes[j];
                let value_start = j + 1;
                let mut k = value_start;
                while k < to && bytes[k] != quote {
                    k += 1;
                }
                (raw[value_start..k].to_string(), (k + 1).min(to))
            } else {
                let value_start = j;
                let mut k = j;
                while k < to && !bytes[k].is_ascii_whitespace() {
                    k += 1;
                }
                (raw[value_start..k].to_string(), k)
            };
            attrs.push(Attr {
                name,
                value: Some(value),
                span: name_start..value_end,
            });
            i = value_end;
        } else {
            attrs.push(Attr {
                name,
                value: None,
                span: name_start..i,
            });
        }
    }

    attrs
}

// =============================================================================
// Element Ranges
// =============================================================================

/// Byte ranges of `<name ...>...</name>` elements, open tag through close tag.
///
/// Nesting is not tracked. An element with no closing tag extends to the end.
pub fn element_ranges(html: &str, name: &str) -> Vec<Range<usize>> {
    scan_tags(html, name, &opaque_ranges(html))
        .into_iter()
        .map(|tag| tag.start..close_tag_end(html, name, tag.end))
        .fold(Vec::new(), |mut ranges: Vec<Range<usize>>, range| {
            // Drop tags found inside a previous range
            if ranges.last().is_none_or(|last| range.start >= last.end) {
                ranges.push(range);
            }
            ranges
        })
}

/// Regions whose contents are never markup: comments, scripts, and styles.
///
/// One forward pass, so a quote or `<` inside one region cannot leak into the
/// markup after it. Ranges come out in document order.
fn opaque_ranges(html: &str) -> Vec<Range<usize>> {
    let bytes = html.as_bytes();
    let mut ranges = Vec::new();
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let start = pos + offset;
        if html[start..].starts_with("<!--") {
            let end = html[start + 4..]
                .find("-->")
                .map_or(html.len(), |i| start + 4 + i + 3);
            ranges.push(start..end);
            pos = end;
            continue;
        }
        pos = start + 1;

        for name in ["script", "style"] {
            if let Some(name_end) = tag_name_end(bytes, start, name) {
                let open_end = tag_end(bytes, name_end).unwrap_or(html.len());
                let end = close_tag_end(html, name, open_end);
                // The element's own open tag stays visible
                ranges.push(start + 1..end);
                pos = end;
                break;
            }
        }
    }

    ranges
}

/// Whether `pos` falls inside any of `ranges`.
pub fn within(ranges: &[Range<usize>], pos: usize) -> bool {
    ranges.iter().any(|r| r.contains(&pos))
}

// =============================================================================
// Tests
// =============================================================================
