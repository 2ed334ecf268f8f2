//! Reference and generic type resolution

use std::collections::BTreeSet;

use crate::core::{ElementId, GenericType, SlotId, TypeExpr};
use crate::errors::{find_similar_names, CompilationError, ErrorKind};
use crate::model::{qualify, well_known, ElementKind, PackageableElement, SlotKind};

use super::TypeSystem;

impl<'g> TypeSystem<'g> {
    /// Packages searched for an unqualified name, in priority order: the
    /// owner's package, then its imports, then the implicit imports.
    pub fn search_packages<'e>(&self, owner: &'e PackageableElement) -> Vec<&'e str> {
        let mut packages = vec![owner.package.as_str()];
        packages.extend(owner.imports.iter().map(String::as_str));
        packages.extend(well_known::AUTO_IMPORTS.iter().copied());
        packages
    }

    /// Resolve one declared reference slot of `owner`. Call slots are
    /// resolved by overload resolution instead.
    pub fn resolve_slot(&self, owner: &PackageableElement, slot: SlotId) -> Result<Option<ElementId>, CompilationError> {
        let Some(reference) = owner.slot(slot) else { return Ok(None) };
        match reference.kind {
            SlotKind::Call { .. } => Ok(None),
            SlotKind::FunctionRef => self.resolve_function_ref(owner, slot).map(Some),
            kind => self.resolve_path(owner, slot, kind).map(Some),
        }
    }

    fn accepts(kind: SlotKind, element: &PackageableElement) -> bool {
        match kind {
            SlotKind::Type => element.kind.is_type(),
            SlotKind::Profile => matches!(element.kind, ElementKind::Profile(_)),
            SlotKind::Element => !matches!(element.kind, ElementKind::Package(_)),
            SlotKind::FunctionRef | SlotKind::Call { .. } => element.is_function(),
        }
    }

    fn resolve_path(&self, owner: &PackageableElement, slot: SlotId, kind: SlotKind) -> Result<ElementId, CompilationError> {
        let reference = &owner.slots[slot];
        let text = reference.text.as_str();

        if reference.is_qualified() {
            return match self.graph.lookup(text) {
                Some(id) if self.element(id).map_or(false, |e| Self::accepts(kind, e)) => Ok(id),
                _ => Err(self.not_found(owner, slot, kind)),
            };
        }

        let own = qualify(&owner.package, text);
        if let Some(id) = self.graph.lookup(&own) {
            if self.element(id).map_or(false, |e| Self::accepts(kind, e)) {
                return Ok(id);
            }
        }

        let mut found = BTreeSet::new();
        for package in self.search_packages(owner).into_iter().skip(1) {
            if let Some(id) = self.graph.lookup(&qualify(package, text)) {
                if self.element(id).map_or(false, |e| Self::accepts(kind, e)) {
                    found.insert(id);
                }
            }
        }

        self.single(owner, slot, kind, found)
    }

    fn single(&self, owner: &PackageableElement, slot: SlotId, kind: SlotKind, found: BTreeSet<ElementId>) -> Result<ElementId, CompilationError> {
        let mut iter = found.iter().copied();
        match (iter.next(), iter.next()) {
            (None, _) => Err(self.not_found(owner, slot, kind)),
            (Some(id), None) => Ok(id),
            _ => Err(self.ambiguous(owner, slot, found.into_iter())),
        }
    }

    /// A route's function: either a signature id path (`a::f_String_1__String_1_`)
    /// or an unambiguous function name.
    fn resolve_function_ref(&self, owner: &PackageableElement, slot: SlotId) -> Result<ElementId, CompilationError> {
        let reference = &owner.slots[slot];
        if let Some(id) = self.graph.lookup(&reference.text) {
            if self.element(id).map_or(false, PackageableElement::is_function) {
                return Ok(id);
            }
        }

        let found: BTreeSet<ElementId> = self.function_candidates(owner, &reference.text).into_iter().collect();
        self.single(owner, slot, SlotKind::FunctionRef, found)
    }

    /// Functions a call or function reference written as `text` may denote,
    /// ordered by path. Qualified text names the package exactly; otherwise
    /// the first package in search order holding a function of that name
    /// wins, so local functions shadow imported ones.
    pub fn function_candidates(&self, owner: &PackageableElement, text: &str) -> Vec<ElementId> {
        let (package, name) = match text.rfind("::") {
            Some(i) => (Some(&text[..i]), &text[i + 2..]),
            None => (None, text),
        };
        let named = self.graph.functions_named(name);
        let in_package = |package: &str| -> Vec<ElementId> {
            named
                .iter()
                .copied()
                .filter(|id| self.element(*id).map_or(false, |e| e.package == package))
                .collect()
        };

        if let Some(package) = package {
            return in_package(package);
        }
        for package in self.search_packages(owner) {
            let found = in_package(package);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    fn not_found(&self, owner: &PackageableElement, slot: SlotId, kind: SlotKind) -> CompilationError {
        let reference = &owner.slots[slot];
        let simple = reference.simple_name();
        let candidates: BTreeSet<&str> = self
            .graph
            .iter()
            .filter(|(_, e)| Self::accepts(kind, e))
            .map(|(_, e)| e.lookup_name())
            .collect();
        let similar: Vec<String> = find_similar_names(simple, candidates, 2)
            .into_iter()
            .take(self.max_suggestions)
            .collect();
        CompilationError::reference_not_found(&reference.text, &owner.source, reference.span, similar)
    }

    fn ambiguous(&self, owner: &PackageableElement, slot: SlotId, found: impl Iterator<Item = ElementId>) -> CompilationError {
        let reference = &owner.slots[slot];
        let mut paths: Vec<String> = found.map(|id| self.graph.path_of(id).to_string()).collect();
        paths.sort();
        CompilationError::at(
            ErrorKind::NameConflict {
                message: format!(
                    "{} has been found more than one time in the imports: [{}]",
                    reference.text,
                    paths.join(", ")
                ),
            },
            &owner.source,
            reference.span,
        )
    }

    /// Resolve a declared type against the owner's resolved slots, checking
    /// the argument count of every generic reference.
    pub fn resolve_generic_type(&self, owner: &PackageableElement, ty: &TypeExpr) -> Result<GenericType, CompilationError> {
        match ty {
            TypeExpr::Param { name, .. } => Ok(GenericType::param(name.clone())),
            TypeExpr::Function { params, ret, .. } => {
                let params = params
                    .iter()
                    .map(|(t, m)| Ok((self.resolve_generic_type(owner, t)?, *m)))
                    .collect::<Result<Vec<_>, CompilationError>>()?;
                let ret_type = self.resolve_generic_type(owner, &ret.0)?;
                Ok(GenericType::function(params, (ret_type, ret.1)))
            }
            TypeExpr::Named { slot, args, span } => {
                let Some(reference) = owner.slot(*slot) else {
                    return Err(CompilationError::at(
                        ErrorKind::ReferenceNotFound { name: owner.render_type(ty) },
                        &owner.source,
                        *span,
                    ));
                };
                let Some(target) = reference.resolved else {
                    return Err(CompilationError::reference_not_found(&reference.text, &owner.source, reference.span, Vec::new()));
                };
                let declared = self.element(target).map(|e| e.kind.type_params().len()).unwrap_or(0);
                if declared != args.len() {
                    return Err(CompilationError::at(
                        ErrorKind::TypeArgumentMismatch {
                            declared: self.render_declared(target),
                            expected: declared,
                            found: args.len(),
                            reference: owner.render_type(ty),
                        },
                        &owner.source,
                        *span,
                    ));
                }
                let args = args
                    .iter()
                    .map(|a| self.resolve_generic_type(owner, a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(GenericType::with_args(target, args))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::CompilerConfig;
    use crate::incremental::IncrementalCompiler;

    fn compile(sources: &[(&str, &str)]) -> Result<IncrementalCompiler, crate::errors::PureError> {
        let mut compiler = IncrementalCompiler::new(CompilerConfig::default())?;
        compiler.create_in_memory_and_compile(sources)?;
        Ok(compiler)
    }

    #[test]
    fn test_own_package_shadows_imports() {
        let compiler = compile(&[
            ("/a.pure", "Class a::Person {}\nClass b::Person {}\n"),
            ("/b.pure", "import a::*;\nClass b::Holder { p: Person[1]; }\n"),
        ])
        .unwrap();
        let holder = compiler.get_element("b::Holder").unwrap();
        let target = holder.slots[0].resolved.unwrap();
        assert_eq!(compiler.graph().path_of(target), "b::Person");
    }

    #[test]
    fn test_ambiguous_import() {
        let error = compile(&[
            ("/a.pure", "Class a::Person {}\nClass b::Person {}\n"),
            ("/c.pure", "import a::*;\nimport b::*;\nClass c::Holder { p: Person[1]; }\n"),
        ])
        .unwrap_err();
        let error = error.as_compilation().unwrap();
        assert_eq!(
            error.message(),
            "Person has been found more than one time in the imports: [a::Person, b::Person]"
        );
        assert_eq!(error.location.line, 3);
        assert_eq!(error.location.col, 22);
    }

    #[test]
    fn test_not_found_suggests_similar_names() {
        let error = compile(&[("/a.pure", "Class a::Person {}\nClass a::Firm { boss: Persn[1]; }\n")]).unwrap_err();
        let error = error.as_compilation().unwrap();
        assert_eq!(error.message(), "Persn has not been defined!");
        assert!(error.suggestions.contains(&"Did you mean 'Person'?".to_string()));
    }

    #[test]
    fn test_type_argument_count() {
        let error = compile(&[("/a.pure", "Class a::A<T> {}\nClass a::B { x: A[1]; }\n")]).unwrap_err();
        assert_eq!(
            error.as_compilation().unwrap().message(),
            "Type argument mismatch for A<T> (expected 1, got 0): A"
        );

        let error = compile(&[("/a.pure", "Class a::A {}\nClass a::B { x: A<String>[1]; }\n")]).unwrap_err();
        assert_eq!(
            error.as_compilation().unwrap().message(),
            "Type argument mismatch for A (expected 0, got 1): A<String>"
        );
    }
}
