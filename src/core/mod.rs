//! Core value types
//!
//! Spans, multiplicities and the resolved / unresolved type representations
//! shared by the parser layer, the model graph and the type system.

pub mod multiplicity;
pub mod span;
pub mod types;

pub use multiplicity::Multiplicity;
pub use span::{LineIndex, Span};
pub use types::{ElementId, FunctionType, GenericType, RawType, SlotId, TypeExpr};
