//! Configuration section definitions.

mod assets;
mod fonts;
mod hints;
mod images;
mod minify;
mod run;
mod walk;

pub use assets::AssetsConfig;
pub use fonts::FontsConfig;
pub use hints::{HintsConfig, PreconnectHint, PreloadHint};
pub use images::{ImagesConfig, LazyMode};
pub use minify::MinifyConfig;
pub use run::{ReportConfig, RunConfig};
pub use walk::WalkConfig;
