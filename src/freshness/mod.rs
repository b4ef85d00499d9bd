//! Change detection: blake3 over content + mtime, cached per run.

mod cache;
mod hash;
mod mtime;

pub use cache::ChangeDetector;
pub use hash::{CacheKey, cache_key};
pub use mtime::mtime_millis;
