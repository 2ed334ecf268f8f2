//! Access levels and repository visibility

pub mod access;
pub mod engine;
pub mod repository;

pub use access::AccessLevel;
pub use engine::VisibilityEngine;
pub use repository::{CodeRepository, RepositorySet};
