//! Function body syntax tree
//!
//! Calls, instance creations and enumeration references point at reference
//! slots of the owning function, so they take part in the usage index like
//! any other reference.

use serde::{Deserialize, Serialize};

use crate::core::{SlotId, Span, TypeExpr};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal {
        value: Literal,
        span: Span,
    },
    Collection {
        items: Vec<Expr>,
        span: Span,
    },
    Variable {
        name: String,
        span: Span,
    },
    Property {
        receiver: Box<Expr>,
        name: String,
        span: Span,
    },
    /// `f(args)` or `$x->f(args)`; the arrow form passes the receiver first.
    Call {
        slot: SlotId,
        args: Vec<Expr>,
        span: Span,
    },
    New {
        ty: TypeExpr,
        assignments: Vec<Assignment>,
        span: Span,
    },
    EnumValue {
        slot: SlotId,
        value: String,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Self::Literal { span, .. }
            | Self::Collection { span, .. }
            | Self::Variable { span, .. }
            | Self::Property { span, .. }
            | Self::Call { span, .. }
            | Self::New { span, .. }
            | Self::EnumValue { span, .. } => *span,
        }
    }
}

/// `path = value` inside `^Class(...)`. A path with more than one segment is
/// a chained assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub path: Vec<String>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Let { name: String, value: Expr, span: Span },
    Expr(Expr),
}
