//! Generalization order, diamond and cycle detection

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{ElementId, GenericType, Span};
use crate::errors::{CompilationError, ErrorKind};
use crate::model::{ElementKind, PackageableElement};

use super::TypeSystem;

/// One entry of a linearized hierarchy: an ancestor and its type arguments
/// expressed in the type parameters of the linearized element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    pub id: ElementId,
    pub binding: GenericType,
}

impl<'g> TypeSystem<'g> {
    /// Declared supertypes in declaration order. Types without an explicit
    /// supertype generalize `Any`.
    pub fn direct_generalizations(&self, id: ElementId) -> Result<Vec<(GenericType, Span)>, CompilationError> {
        let Some(element) = self.element(id) else { return Ok(Vec::new()) };
        let declared = match &element.kind {
            ElementKind::Class(decl) => decl
                .generalizations
                .iter()
                .map(|g| Ok((self.resolve_generic_type(element, g)?, g.span())))
                .collect::<Result<Vec<_>, CompilationError>>()?,
            ElementKind::PrimitiveType(decl) => match &decl.supertype {
                Some(supertype) => vec![(self.resolve_generic_type(element, supertype)?, supertype.span())],
                None => Vec::new(),
            },
            ElementKind::Enumeration(_) => Vec::new(),
            _ => return Ok(Vec::new()),
        };

        if declared.is_empty() && Some(id) != self.well_known.any {
            return Ok(self
                .well_known
                .any
                .map(|any| vec![(GenericType::element(any), element.name_span)])
                .unwrap_or_default());
        }
        Ok(declared)
    }

    /// Ordered ancestors of `id`: the element itself, then each direct
    /// generalization depth-first in declaration order, duplicates dropped,
    /// `Any` last.
    pub fn linearize(&self, id: ElementId) -> Result<Arc<Vec<Ancestor>>, CompilationError> {
        if let Some(cached) = self.linearizations.get(&id) {
            return Ok(cached.clone());
        }
        let Some(root) = self.element(id) else { return Ok(Arc::new(Vec::new())) };

        let mut order = Vec::new();
        let mut stack = Vec::new();
        self.visit_ancestor(root, id, self.self_type(id), &mut stack, &mut order)?;

        if let Some(any) = self.well_known.any {
            if let Some(position) = order.iter().position(|a| a.id == any) {
                let top = order.remove(position);
                order.push(top);
            }
        }

        let order = Arc::new(order);
        self.linearizations.insert(id, order.clone());
        Ok(order)
    }

    fn visit_ancestor(
        &self,
        root: &PackageableElement,
        id: ElementId,
        binding: GenericType,
        stack: &mut Vec<ElementId>,
        order: &mut Vec<Ancestor>,
    ) -> Result<(), CompilationError> {
        if stack.contains(&id) {
            let mut names: Vec<&str> = stack.iter().map(|s| self.name_of(*s)).collect();
            names.push(self.name_of(id));
            return Err(CompilationError::at(
                ErrorKind::GeneralizationCycle {
                    message: format!("Class {} has a circular generalization: {}", root.name, names.join(" -> ")),
                },
                &root.source,
                root.name_span,
            ));
        }

        if let Some(existing) = order.iter().find(|a| a.id == id) {
            let conflict = existing
                .binding
                .args
                .iter()
                .zip(&binding.args)
                .find(|(seen, new)| seen != new);
            if let Some((seen, new)) = conflict {
                return Err(CompilationError::at(
                    ErrorKind::DiamondInheritance {
                        found: self.render(seen),
                        conflicting: self.render(new),
                        class: root.name.clone(),
                        ancestor: self.render_declared(id),
                    },
                    &root.source,
                    root.name_span,
                ));
            }
            return Ok(());
        }

        order.push(Ancestor { id, binding: binding.clone() });
        stack.push(id);

        let bindings = self.bindings_for(id, &binding);
        for (general, _) in self.direct_generalizations(id)? {
            let general = general.substitute(&bindings);
            if let Some(target) = general.element_id() {
                self.visit_ancestor(root, target, general, stack, order)?;
            }
        }

        stack.pop();
        Ok(())
    }

    /// Map from the type parameters of `id` to the arguments of `ty`.
    pub fn bindings_for(&self, id: ElementId, ty: &GenericType) -> HashMap<String, GenericType> {
        let params = self.element(id).map(|e| e.kind.type_params()).unwrap_or_default();
        params.iter().cloned().zip(ty.args.iter().cloned()).collect()
    }

    /// `ty` viewed as its ancestor `target`, with arguments substituted, if
    /// `target` is in its hierarchy.
    pub fn as_ancestor(&self, ty: &GenericType, target: ElementId) -> Result<Option<GenericType>, CompilationError> {
        let Some(id) = ty.element_id() else { return Ok(None) };
        let bindings = self.bindings_for(id, ty);
        Ok(self
            .linearize(id)?
            .iter()
            .find(|a| a.id == target)
            .map(|a| a.binding.substitute(&bindings)))
    }

    /// Generalization rules checked before a class is accepted.
    pub fn check_class_generalizations(&self, id: ElementId) -> Result<(), CompilationError> {
        let Some(element) = self.element(id) else { return Ok(()) };
        let Some(decl) = element.kind.class() else { return Ok(()) };
        let subtypes = self.graph.generalizations().all_subtypes(id);

        for expr in &decl.generalizations {
            let general = self.resolve_generic_type(element, expr)?;
            let target = general.element_id().and_then(|t| self.element(t));
            if !matches!(target.map(|t| &t.kind), Some(ElementKind::Class(_))) {
                return Err(CompilationError::at(
                    ErrorKind::Type {
                        message: format!(
                            "Class {} cannot extend {} as it is not a Class",
                            element.name,
                            self.render(&GenericType { raw: general.raw.clone(), args: Vec::new() })
                        ),
                    },
                    &element.source,
                    expr.span(),
                ));
            }

            let mut referenced = Vec::new();
            for arg in &general.args {
                arg.visit_elements(&mut |e| referenced.push(e));
            }
            if referenced.contains(&id) {
                return Err(CompilationError::at(
                    ErrorKind::GeneralizationCycle {
                        message: format!(
                            "Class {} extends {} which contains a reference to {} itself",
                            element.name,
                            element.render_type(expr),
                            element.name
                        ),
                    },
                    &element.source,
                    expr.span(),
                ));
            }
            if let Some(subtype) = referenced.iter().find(|r| subtypes.contains(r)) {
                return Err(CompilationError::at(
                    ErrorKind::GeneralizationCycle {
                        message: format!(
                            "Class {} extends {} which contains a reference to {} which is a subtype of {}",
                            element.name,
                            element.render_type(expr),
                            self.name_of(*subtype),
                            element.name
                        ),
                    },
                    &element.source,
                    expr.span(),
                ));
            }
        }

        if let Some(cycle) = self.graph.generalizations().find_cycle(id) {
            let names: Vec<&str> = cycle.iter().map(|c| self.name_of(*c)).collect();
            return Err(CompilationError::at(
                ErrorKind::GeneralizationCycle {
                    message: format!("Class {} has a circular generalization: {}", element.name, names.join(" -> ")),
                },
                &element.source,
                element.name_span,
            ));
        }

        self.linearize(id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::CompilerConfig;
    use crate::incremental::IncrementalCompiler;

    fn compile(text: &str) -> Result<IncrementalCompiler, crate::errors::PureError> {
        let mut compiler = IncrementalCompiler::new(CompilerConfig::default())?;
        compiler.create_in_memory_and_compile(&[("/g.pure", text)])?;
        Ok(compiler)
    }

    #[test]
    fn test_linearization_is_depth_first_with_any_last() {
        let compiler = compile(
            "Class g::A {}\nClass g::B extends g::A {}\nClass g::C {}\nClass g::D extends g::B, g::C {}\n",
        )
        .unwrap();
        let order = compiler.generalization_order("g::D").unwrap();
        assert_eq!(order, vec!["g::D", "g::B", "g::A", "g::C", "meta::pure::metamodel::type::Any"]);
    }

    #[test]
    fn test_shared_ancestor_with_equal_arguments_is_accepted() {
        let compiler = compile(
            "Class g::A<T> { v: T[1]; }\nClass g::B extends g::A<String> {}\nClass g::C extends g::A<String> {}\nClass g::D extends g::B, g::C {}\n",
        )
        .unwrap();
        let order = compiler.generalization_order("g::D").unwrap();
        assert_eq!(order.iter().filter(|p| p.as_str() == "g::A").count(), 1);
    }

    #[test]
    fn test_primitive_hierarchy() {
        let compiler = compile("Class g::Empty {}\n").unwrap();
        let order = compiler.generalization_order("meta::pure::metamodel::type::Integer").unwrap();
        assert_eq!(
            order,
            vec![
                "meta::pure::metamodel::type::Integer",
                "meta::pure::metamodel::type::Number",
                "meta::pure::metamodel::type::Any"
            ]
        );
    }

    #[test]
    fn test_plain_cycle() {
        let error = compile("Class g::A extends g::B {}\nClass g::B extends g::A {}\n").unwrap_err();
        let error = error.as_compilation().unwrap();
        assert_eq!(error.kind.category(), "GeneralizationCycleError");
        assert!(error.message().contains("circular generalization"));
    }

    #[test]
    fn test_cannot_extend_enumeration() {
        let error = compile("Enum g::E { X }\nClass g::D extends g::E {}\n").unwrap_err();
        assert_eq!(error.as_compilation().unwrap().message(), "Class D cannot extend E as it is not a Class");
    }
}
