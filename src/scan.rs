//! Page discovery under the root directory.
//!
//! The walk is sorted, so discovery order (and with it commit order, log order
//! and report order) is the same on every run.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use crate::config::WalkConfig;

#[derive(Debug, Default)]
pub struct Discovery {
    /// Pages in discovery order.
    pub files: Vec<PathBuf>,
    /// Directories or entries that could not be read.
    pub failures: Vec<String>,
}

/// Collect every page under `root`.
///
/// Hidden entries and configured directory names are neither yielded nor
/// descended into. An unreadable directory contributes no files and a failure.
pub fn discover(root: &Path, config: &WalkConfig) -> Discovery {
    let skip_dirs = config.skip_dirs.clone();
    let walker = WalkDir::new(root)
        .sort(true)
        .skip_hidden(true)
        .process_read_dir(move |_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().map_or(true, |e| {
                    !(e.file_type().is_dir()
                        && e.file_name()
                            .to_str()
                            .is_some_and(|name| skip_dirs.iter().any(|d| d == name)))
                })
            });
        });

    let mut discovery = Discovery::default();
    for entry in walker {
        match entry {
            Ok(e) if e.file_type().is_file() => {
                let name = e.file_name().to_string_lossy();
                if is_page(&name, config) {
                    discovery.files.push(e.path());
                }
            }
            Ok(_) => {}
            Err(e) => discovery.failures.push(e.to_string()),
        }
    }
    discovery
}

/// Whether a file name has a page extension and no excluded suffix.
pub fn is_page(name: &str, config: &WalkConfig) -> bool {
    let lower = name.to_ascii_lowercase();
    let has_ext = config.extensions.iter().any(|ext| {
        lower
            .strip_suffix(ext.to_ascii_lowercase().as_str())
            .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
    });
    has_ext
        && !config
            .skip_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<p></p>").unwrap();
    }

    #[test]
    fn test_is_page() {
        let config = WalkConfig::default();
        assert!(is_page("index.html", &config));
        assert!(is_page("INDEX.HTM", &config));
        assert!(!is_page("app.min.html", &config));
        assert!(!is_page("index.html.bak", &config));
        assert!(!is_page("style.css", &config));
        assert!(!is_page(".html", &config));
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for rel in [
            "b.html",
            "a.html",
            "docs/z.htm",
            "docs/a.min.html",
            "node_modules/pkg/index.html",
            "assets/vendor/demo.html",
            ".git/description.html",
            "notes.txt",
        ] {
            touch(root, rel);
        }

        let found: Vec<_> = discover(root, &WalkConfig::default())
            .files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(found, ["a.html", "b.html", "docs/z.htm"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_recorded() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "a.html");
        touch(root, "private/b.html");
        let locked = root.join("private");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Root ignores directory permissions
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let discovery = discover(root, &WalkConfig::default());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(discovery.files, vec![root.join("a.html")]);
        assert_eq!(discovery.failures.len(), 1);
    }

    #[test]
    fn test_discover_empty_root() {
        let dir = TempDir::new().unwrap();
        let discovery = discover(dir.path(), &WalkConfig::default());
        assert!(discovery.files.is_empty());
        assert!(discovery.failures.is_empty());
    }
}
