//! Function body checking
//!
//! Types every statement of a concrete function, resolves call sites by
//! overload resolution and checks the last statement against the declared
//! return type. Call resolutions are returned to the compiler, which applies
//! them once the whole validation pass has succeeded.

use std::collections::{HashMap, HashSet};

use crate::core::{ElementId, GenericType, Multiplicity, RawType, SlotId, Span};
use crate::errors::{CompilationError, ErrorKind};
use crate::model::{ElementKind, Expr, FunctionDecl, Literal, PackageableElement, Statement};
use crate::visibility::VisibilityEngine;

use super::TypeSystem;

/// Type and multiplicity of an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Typed {
    pub ty: GenericType,
    pub multiplicity: Multiplicity,
    pub span: Span,
}

/// A call site bound to the function overload it denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallResolution {
    pub owner: ElementId,
    pub slot: SlotId,
    pub target: ElementId,
}

pub struct FunctionBodyChecker<'a, 'g> {
    types: &'a TypeSystem<'g>,
    visibility: &'a VisibilityEngine<'a>,
    owner_id: ElementId,
    owner: &'g PackageableElement,
    locals: HashMap<String, Typed>,
    calls: Vec<CallResolution>,
}

impl<'a, 'g> FunctionBodyChecker<'a, 'g> {
    pub fn new(types: &'a TypeSystem<'g>, visibility: &'a VisibilityEngine<'a>, owner_id: ElementId) -> Option<Self> {
        let owner = types.element(owner_id)?;
        Some(Self { types, visibility, owner_id, owner, locals: HashMap::new(), calls: Vec::new() })
    }

    pub fn check(mut self) -> Result<Vec<CallResolution>, CompilationError> {
        let Some(decl) = self.owner.kind.function() else { return Ok(Vec::new()) };

        for parameter in &decl.parameters {
            let ty = self.types.resolve_generic_type(self.owner, &parameter.ty)?;
            self.locals.insert(
                parameter.name.clone(),
                Typed { ty, multiplicity: parameter.multiplicity, span: parameter.span },
            );
        }
        let return_type = self.types.resolve_generic_type(self.owner, &decl.return_type)?;

        if !matches!(self.owner.kind, ElementKind::ConcreteFunction(_)) {
            return Ok(self.calls);
        }

        let mut last = None;
        for statement in &decl.body {
            let typed = match statement {
                Statement::Let { name, value, .. } => {
                    let typed = self.expr(value)?;
                    self.locals.insert(name.clone(), typed.clone());
                    typed
                }
                Statement::Expr(expr) => self.expr(expr)?,
            };
            last = Some(typed);
        }

        if let Some(last) = last {
            self.check_return(decl, &return_type, &last)?;
        }
        Ok(self.calls)
    }

    fn check_return(&self, decl: &FunctionDecl, expected: &GenericType, found: &Typed) -> Result<(), CompilationError> {
        if !self.types.is_subtype_of(&found.ty, expected) {
            return Err(self.error(
                ErrorKind::ReturnType {
                    function: decl.function_name.clone(),
                    found: self.types.render(&found.ty),
                    expected: self.types.render(expected),
                },
                found.span,
            ));
        }
        if !found.multiplicity.is_compatible_with(&decl.return_multiplicity) {
            return Err(self.error(
                ErrorKind::ReturnMultiplicity {
                    function: decl.function_name.clone(),
                    found: found.multiplicity.to_string(),
                    expected: decl.return_multiplicity.to_string(),
                },
                found.span,
            ));
        }
        Ok(())
    }

    fn error(&self, kind: ErrorKind, span: Span) -> CompilationError {
        CompilationError::at(kind, &self.owner.source, span)
    }

    fn one(&self, id: Option<ElementId>, span: Span) -> Typed {
        let ty = id.map_or_else(|| self.types.any_type(), GenericType::element);
        Typed { ty, multiplicity: Multiplicity::PURE_ONE, span }
    }

    fn expr(&mut self, expr: &Expr) -> Result<Typed, CompilationError> {
        let known = *self.types.well_known();
        match expr {
            Expr::Literal { value, span } => Ok(match value {
                Literal::String(_) => self.one(known.string, *span),
                Literal::Integer(_) => self.one(known.integer, *span),
                Literal::Float(_) => self.one(known.float, *span),
                Literal::Boolean(_) => self.one(known.boolean, *span),
            }),
            Expr::Collection { items, span } => self.collection(items, *span),
            Expr::Variable { name, span } => match self.locals.get(name) {
                Some(typed) => Ok(Typed { span: *span, ..typed.clone() }),
                None => Err(self.error(ErrorKind::ReferenceNotFound { name: format!("${}", name) }, *span)),
            },
            Expr::Property { receiver, name, span } => {
                let receiver = self.expr(receiver)?;
                let Some(property) = self.types.find_property(&receiver.ty, name)? else {
                    return Err(self.error(
                        ErrorKind::PropertyNotFound { property: name.clone(), owner: self.types.render(&receiver.ty) },
                        *span,
                    ));
                };
                Ok(Typed {
                    ty: property.ty,
                    multiplicity: receiver.multiplicity.product(&property.multiplicity),
                    span: *span,
                })
            }
            Expr::Call { slot, args, span } => {
                let args = args.iter().map(|a| self.expr(a)).collect::<Result<Vec<_>, _>>()?;
                self.call(*slot, &args, *span)
            }
            Expr::New { ty, assignments, span } => {
                let class_type = self.types.resolve_generic_type(self.owner, ty)?;
                let is_class = class_type
                    .element_id()
                    .and_then(|id| self.types.element(id))
                    .map_or(false, |e| matches!(e.kind, ElementKind::Class(_)));
                if !is_class {
                    return Err(self.error(
                        ErrorKind::Type {
                            message: format!("{} is not a Class and cannot be instantiated", self.types.render(&class_type)),
                        },
                        ty.span(),
                    ));
                }

                let mut supplied = HashSet::new();
                for assignment in assignments {
                    let value = self.expr(&assignment.value)?;
                    self.types.check_property_assignment(
                        &class_type,
                        &assignment.path,
                        &value,
                        &self.owner.source,
                        assignment.span,
                    )?;
                    supplied.insert(assignment.path[0].as_str());
                }
                self.types.check_required_properties(&class_type, &supplied, &self.owner.source, *span)?;
                Ok(Typed { ty: class_type, multiplicity: Multiplicity::PURE_ONE, span: *span })
            }
            Expr::EnumValue { slot, value, span } => {
                let target = self.owner.slot(*slot).and_then(|s| s.resolved);
                let enumeration = target.and_then(|t| self.types.element(t));
                match enumeration.map(|e| &e.kind) {
                    Some(ElementKind::Enumeration(decl)) if decl.values.iter().any(|v| &v.name == value) => {
                        Ok(self.one(target, *span))
                    }
                    Some(ElementKind::Enumeration(_)) => Err(self.error(
                        ErrorKind::Type {
                            message: format!(
                                "The enum value '{}' can't be found in the enumeration {}",
                                value,
                                enumeration.map_or("?", |e| e.path.as_str())
                            ),
                        },
                        *span,
                    )),
                    _ => Err(self.error(
                        ErrorKind::Type {
                            message: format!(
                                "{} is not an Enumeration",
                                self.owner.slot(*slot).map_or("?", |s| s.text.as_str())
                            ),
                        },
                        *span,
                    )),
                }
            }
        }
    }

    fn collection(&mut self, items: &[Expr], span: Span) -> Result<Typed, CompilationError> {
        let mut typed = Vec::with_capacity(items.len());
        for item in items {
            typed.push(self.expr(item)?);
        }
        let Some(first) = typed.first() else {
            return Ok(Typed { ty: self.types.nil_type(), multiplicity: Multiplicity::ZERO, span });
        };

        let mut common = first.ty.clone();
        for item in &typed[1..] {
            common = self.common_supertype(&common, &item.ty)?;
        }
        let multiplicity = typed.iter().fold(Multiplicity::ZERO, |m, t| m.sum(&t.multiplicity));
        Ok(Typed { ty: common, multiplicity, span })
    }

    /// Nearest ancestor of `a`, in generalization order, that `b` also
    /// conforms to.
    fn common_supertype(&self, a: &GenericType, b: &GenericType) -> Result<GenericType, CompilationError> {
        if self.types.is_subtype_of(b, a) {
            return Ok(a.clone());
        }
        if self.types.is_subtype_of(a, b) {
            return Ok(b.clone());
        }
        if let Some(id) = a.element_id() {
            let bindings = self.types.bindings_for(id, a);
            for ancestor in self.types.linearize(id)?.iter() {
                let candidate = ancestor.binding.substitute(&bindings);
                if self.types.is_subtype_of(b, &candidate) {
                    return Ok(candidate);
                }
            }
        }
        Ok(self.types.any_type())
    }

    fn call(&mut self, slot: SlotId, args: &[Typed], span: Span) -> Result<Typed, CompilationError> {
        let owner = self.owner;
        let Some(reference) = owner.slot(slot) else {
            return Err(self.error(ErrorKind::NoMatchingFunction { call: "?".to_string() }, span));
        };

        for candidate in self.types.function_candidates(self.owner, &reference.text) {
            let Some(target) = self.types.element(candidate) else { continue };
            let Some(decl) = target.kind.function() else { continue };
            if decl.parameters.len() != args.len() {
                continue;
            }
            let Some((ty, multiplicity)) = self.match_call(target, decl, args)? else { continue };

            self.visibility.check_reference(owner, reference.span, candidate)?;
            self.calls.push(CallResolution { owner: self.owner_id, slot, target: candidate });
            return Ok(Typed { ty, multiplicity, span });
        }

        let rendered: Vec<String> = args
            .iter()
            .map(|a| format!("{}{}", self.types.render(&a.ty), a.multiplicity))
            .collect();
        Err(self.error(
            ErrorKind::NoMatchingFunction { call: format!("{}({})", reference.text, rendered.join(", ")) },
            reference.span,
        ))
    }

    /// Bind the candidate's type parameters against the arguments; the
    /// instantiated return type when every argument fits.
    fn match_call(
        &self,
        target: &PackageableElement,
        decl: &FunctionDecl,
        args: &[Typed],
    ) -> Result<Option<(GenericType, Multiplicity)>, CompilationError> {
        let mut bindings = HashMap::new();
        for (parameter, arg) in decl.parameters.iter().zip(args) {
            if !arg.multiplicity.is_compatible_with(&parameter.multiplicity) {
                return Ok(None);
            }
            let declared = self.types.resolve_generic_type(target, &parameter.ty)?;
            if !self.unify(&declared, &arg.ty, &decl.type_params, &mut bindings) {
                return Ok(None);
            }
        }
        let ret = self.types.resolve_generic_type(target, &decl.return_type)?.substitute(&bindings);
        Ok(Some((ret, decl.return_multiplicity)))
    }

    fn unify(&self, declared: &GenericType, actual: &GenericType, params: &[String], bindings: &mut HashMap<String, GenericType>) -> bool {
        match &declared.raw {
            RawType::Param(name) if params.contains(name) => match bindings.get(name) {
                None => {
                    bindings.insert(name.clone(), actual.clone());
                    true
                }
                Some(bound) if self.types.is_subtype_of(actual, bound) => true,
                Some(bound) if self.types.is_subtype_of(bound, actual) => {
                    bindings.insert(name.clone(), actual.clone());
                    true
                }
                Some(_) => false,
            },
            RawType::Element(target) if !declared.args.is_empty() => {
                if self.types.is_nil(actual) {
                    return true;
                }
                let Ok(Some(view)) = self.types.as_ancestor(actual, *target) else { return false };
                view.args.len() == declared.args.len()
                    && declared
                        .args
                        .iter()
                        .zip(&view.args)
                        .all(|(d, a)| self.unify_exact(d, a, params, bindings))
            }
            _ => self.types.is_subtype_of(actual, &declared.substitute(bindings)),
        }
    }

    /// Unification for type arguments, which compare by equality.
    fn unify_exact(&self, declared: &GenericType, actual: &GenericType, params: &[String], bindings: &mut HashMap<String, GenericType>) -> bool {
        match &declared.raw {
            RawType::Param(name) if params.contains(name) => match bindings.get(name) {
                None => {
                    bindings.insert(name.clone(), actual.clone());
                    true
                }
                Some(bound) => bound == actual,
            },
            RawType::Element(id) if !declared.args.is_empty() => {
                actual.element_id() == Some(*id)
                    && actual.args.len() == declared.args.len()
                    && declared
                        .args
                        .iter()
                        .zip(&actual.args)
                        .all(|(d, a)| self.unify_exact(d, a, params, bindings))
            }
            _ => declared.substitute(bindings) == *actual,
        }
    }
}
