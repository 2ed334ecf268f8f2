//! Incremental compiler core for the Pure modelling language
//!
//! Keeps a typed, cross-referenced graph of model declarations validated
//! while sources are created, modified and deleted. Each compile either
//! succeeds as a whole or leaves the graph exactly as it was.
//!
//! ```no_run
//! use pure_core::{CompilerConfig, IncrementalCompiler};
//!
//! let mut compiler = IncrementalCompiler::new(CompilerConfig::default())?;
//! compiler.create_in_memory_and_compile(&[("/model/a.pure", "Class model::A { name: String[1]; }")])?;
//! assert!(compiler.get_element("model::A").is_some());
//! # Ok::<(), pure_core::PureError>(())
//! ```

pub mod analysis;
pub mod core;
pub mod errors;
pub mod frontend;
pub mod incremental;
pub mod infrastructure;
pub mod model;
pub mod visibility;

pub use analysis::{TypeSystem, Variance};
pub use core::{ElementId, GenericType, Multiplicity, Span};
pub use errors::{CompilationError, ErrorKind, ParserError, PureError, SourceLocation};
pub use frontend::{CompilerConfig, ParserRegistry, RepositoryConfig, SectionParser};
pub use incremental::{CompileReport, IncrementalCompiler, SourceState};
pub use model::{ElementKind, ModelGraph, PackageableElement};
pub use visibility::{AccessLevel, RepositorySet, VisibilityEngine};
