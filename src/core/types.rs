use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::multiplicity::Multiplicity;
use super::span::Span;

/// Arena index of an element in the model graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a reference slot within its owning element.
pub type SlotId = usize;

/// A type as written in a declaration, before resolution.
///
/// Named references point at a reference slot of the owning element; the
/// slot carries the text and, once bound, the resolved target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    Named {
        slot: SlotId,
        args: Vec<TypeExpr>,
        span: Span,
    },
    Param {
        name: String,
        span: Span,
    },
    Function {
        params: Vec<(TypeExpr, Multiplicity)>,
        ret: Box<(TypeExpr, Multiplicity)>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            Self::Named { span, .. } | Self::Param { span, .. } | Self::Function { span, .. } => *span,
        }
    }

    /// Slot of the raw type, if it is a named reference.
    pub fn slot(&self) -> Option<SlotId> {
        match self {
            Self::Named { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawType {
    Element(ElementId),
    Param(String),
    Function(Box<FunctionType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<(GenericType, Multiplicity)>,
    pub ret: (GenericType, Multiplicity),
}

/// A resolved type: raw type plus ordered type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericType {
    pub raw: RawType,
    pub args: Vec<GenericType>,
}

impl GenericType {
    pub fn element(id: ElementId) -> Self {
        Self { raw: RawType::Element(id), args: Vec::new() }
    }

    pub fn with_args(id: ElementId, args: Vec<GenericType>) -> Self {
        Self { raw: RawType::Element(id), args }
    }

    pub fn param(name: impl Into<String>) -> Self {
        Self { raw: RawType::Param(name.into()), args: Vec::new() }
    }

    pub fn function(params: Vec<(GenericType, Multiplicity)>, ret: (GenericType, Multiplicity)) -> Self {
        Self {
            raw: RawType::Function(Box::new(FunctionType { params, ret })),
            args: Vec::new(),
        }
    }

    pub fn element_id(&self) -> Option<ElementId> {
        match self.raw {
            RawType::Element(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_param(&self) -> bool {
        matches!(self.raw, RawType::Param(_))
    }

    /// Replace type parameters by their bindings. Unbound parameters are kept.
    pub fn substitute(&self, bindings: &HashMap<String, GenericType>) -> GenericType {
        match &self.raw {
            RawType::Param(name) => match bindings.get(name) {
                Some(bound) => bound.clone(),
                None => self.clone(),
            },
            RawType::Element(id) => GenericType {
                raw: RawType::Element(*id),
                args: self.args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            RawType::Function(f) => GenericType::function(
                f.params.iter().map(|(t, m)| (t.substitute(bindings), *m)).collect(),
                (f.ret.0.substitute(bindings), f.ret.1),
            ),
        }
    }

    /// Visit every element referenced by this type, raw type included.
    pub fn visit_elements(&self, visit: &mut impl FnMut(ElementId)) {
        match &self.raw {
            RawType::Element(id) => visit(*id),
            RawType::Param(_) => {}
            RawType::Function(f) => {
                for (t, _) in &f.params {
                    t.visit_elements(visit);
                }
                f.ret.0.visit_elements(visit);
            }
        }
        for arg in &self.args {
            arg.visit_elements(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_nested() {
        let list = ElementId(7);
        let string = ElementId(1);
        let ty = GenericType::with_args(list, vec![GenericType::param("T")]);
        let mut bindings = HashMap::new();
        bindings.insert("T".to_string(), GenericType::element(string));
        let bound = ty.substitute(&bindings);
        assert_eq!(bound, GenericType::with_args(list, vec![GenericType::element(string)]));
    }

    #[test]
    fn test_visit_elements_includes_function_types() {
        let f = GenericType::function(
            vec![(GenericType::element(ElementId(2)), Multiplicity::PURE_ONE)],
            (GenericType::element(ElementId(3)), Multiplicity::PURE_ONE),
        );
        let mut seen = Vec::new();
        f.visit_elements(&mut |id| seen.push(id));
        assert_eq!(seen, vec![ElementId(2), ElementId(3)]);
    }
}
