//! Subtyping
//!
//! Element types walk the candidate's linearized hierarchy and compare the
//! type arguments found at the target by equality. Function types compare
//! structurally: parameters contravariantly, the return covariantly, each
//! checked on its own.

use crate::core::{FunctionType, GenericType, Multiplicity, RawType, Span};
use crate::errors::{CompilationError, ErrorKind};

use super::variance::Variance;
use super::TypeSystem;

impl<'g> TypeSystem<'g> {
    pub fn is_subtype_of(&self, candidate: &GenericType, target: &GenericType) -> bool {
        self.related(candidate, target, Variance::Covariant)
    }

    /// Whether `candidate` may stand where `target` is expected in a
    /// position of the given variance.
    pub fn related(&self, candidate: &GenericType, target: &GenericType, variance: Variance) -> bool {
        match variance {
            Variance::Invariant => candidate == target,
            Variance::Contravariant => self.subtype(target, candidate),
            Variance::Covariant => self.subtype(candidate, target),
        }
    }

    fn subtype(&self, candidate: &GenericType, target: &GenericType) -> bool {
        if candidate == target || self.is_any(target) || self.is_nil(candidate) {
            return true;
        }

        match (&candidate.raw, &target.raw) {
            (RawType::Function(sub), RawType::Function(sup)) => self.function_subtype(sub, sup, Variance::Covariant),
            (RawType::Element(_), RawType::Element(target_id)) => {
                let Ok(Some(ancestor)) = self.as_ancestor(candidate, *target_id) else { return false };
                target.args.is_empty()
                    || (ancestor.args.len() == target.args.len()
                        && ancestor
                            .args
                            .iter()
                            .zip(&target.args)
                            .all(|(a, t)| self.related(a, t, Variance::Covariant.of_type_argument())))
            }
            _ => false,
        }
    }

    fn function_subtype(&self, sub: &FunctionType, sup: &FunctionType, variance: Variance) -> bool {
        if sub.params.len() != sup.params.len() {
            return false;
        }
        let params = variance.of_parameter();
        let params_ok = sub.params.iter().zip(&sup.params).all(|((st, sm), (pt, pm))| {
            self.related(st, pt, params) && multiplicity_related(sm, pm, params)
        });
        params_ok && self.related(&sub.ret.0, &sup.ret.0, variance) && multiplicity_related(&sub.ret.1, &sup.ret.1, variance)
    }

    /// `Type Error: X not a subtype of Y` unless `candidate <: target`.
    pub fn require_subtype(&self, candidate: &GenericType, target: &GenericType, source: &str, span: Span) -> Result<(), CompilationError> {
        if self.is_subtype_of(candidate, target) {
            return Ok(());
        }
        Err(CompilationError::at(
            ErrorKind::TypeMismatch { found: self.render(candidate), expected: self.render(target) },
            source,
            span,
        ))
    }
}

fn multiplicity_related(candidate: &Multiplicity, target: &Multiplicity, variance: Variance) -> bool {
    match variance {
        Variance::Invariant => candidate == target,
        Variance::Contravariant => target.is_compatible_with(candidate),
        Variance::Covariant => candidate.is_compatible_with(target),
    }
}
