//! Utility modules.

pub mod date;
pub mod exec;
pub mod html;

use std::path::Path;

/// `1 file`, `3 files`
pub fn plural_count(count: usize, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {noun}{suffix}")
}

/// Path shown relative to `root` when possible, for log lines.
pub fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
