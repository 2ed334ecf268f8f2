//! Model graph
//!
//! Bound elements, the package tree, the reverse reference index and the
//! generalization multigraph.

pub mod element;
pub mod expr;
pub mod generalization;
pub mod graph;
pub mod serialize;
pub mod usage;
pub mod well_known;

pub use element::{
    qualify, split_path, Annotations, AssociationDecl, ClassDecl, ElementKind, EnumValueDecl, EnumerationDecl,
    ExtensionDecl, ExtensionRef, FunctionDecl, PackageDecl, PackageableElement, ParameterDecl, PrimitiveDecl,
    ProfileDecl, PropertyDecl, ReferenceSlot, SlotKind, StereotypeUse, TaggedValue, ROOT_PACKAGE,
};
pub use expr::{Assignment, Expr, Literal, Statement};
pub use generalization::GeneralizationGraph;
pub use graph::{ModelGraph, Unbound};
pub use usage::{ReferenceUsage, UsageIndex};
