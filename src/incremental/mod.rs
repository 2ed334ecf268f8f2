//! Incremental compilation
//!
//! Source registry, parse cache, invalidation and the compiler that keeps
//! the model graph validated across edits.

pub mod cache;
pub mod compiler;
pub mod invalidation;
pub mod platform;
pub mod source;

pub use cache::{CacheKey, CacheStats, ParseCache};
pub use compiler::{CompileReport, IncrementalCompiler};
pub use platform::PLATFORM_SOURCE_ID;
pub use source::{ContentHash, PendingChange, Source, SourceRegistry, SourceState};
