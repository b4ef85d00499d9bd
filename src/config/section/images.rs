//! `[images]` section.
//!
//! ```toml
//! [images]
//! lazy = "native"        # native: loading="lazy" only | placeholder: also swap src for data-src
//! exempt = ["header", "logo", "hero", "above-the-fold"]
//! default_width = 800
//! default_height = 600
//! srcset = true          # add a `@2x` candidate to first-party raster images
//! ```

use serde::{Deserialize, Serialize};

/// Lazy-loading contract applied to `<img>` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LazyMode {
    /// Browser-native `loading="lazy"`.
    #[default]
    Native,
    /// `loading="lazy"` plus an inert placeholder `src` with the real URL in
    /// `data-src`, swapped in by the performance script.
    Placeholder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub lazy: LazyMode,
    /// Markers that exempt an image when found in its class, id, alt or src.
    pub exempt: Vec<String>,
    pub default_width: u32,
    pub default_height: u32,
    pub srcset: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            lazy: LazyMode::Native,
            exempt: ["header", "logo", "hero", "above-the-fold"]
                .map(String::from)
                .to_vec(),
            default_width: 800,
            default_height: 600,
            srcset: true,
        }
    }
}
