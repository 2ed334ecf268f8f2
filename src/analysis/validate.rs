//! Per-element validation
//!
//! Runs every type system and visibility rule that applies to one bound
//! element. The compiler calls this for each element of a pass's worklist.

use std::collections::HashSet;

use tracing::trace;

use crate::core::{ElementId, Span};
use crate::errors::{CompilationError, ErrorKind};
use crate::frontend::extensions::route_path_params;
use crate::model::{Annotations, ElementKind, ExtensionDecl, PackageableElement, PropertyDecl};
use crate::visibility::{AccessLevel, VisibilityEngine};

use super::expressions::{CallResolution, FunctionBodyChecker};
use super::TypeSystem;

impl<'g> TypeSystem<'g> {
    /// Validate one element. Returns the call sites its body resolved, to be
    /// applied by the caller once the whole pass has succeeded.
    pub fn validate_element(&self, id: ElementId, visibility: &VisibilityEngine<'_>) -> Result<Vec<CallResolution>, CompilationError> {
        let Some(element) = self.element(id) else { return Ok(Vec::new()) };
        trace!(path = %element.path, kind = element.kind.tag(), "validating");

        visibility.check_repository_pattern(element)?;
        visibility.check_element(element)?;
        self.check_access_annotations(id)?;
        self.check_annotations(element, &element.annotations)?;

        match &element.kind {
            ElementKind::Package(_) => {}
            ElementKind::Class(decl) => {
                self.check_properties(element, &decl.properties)?;
                self.check_class_generalizations(id)?;
                self.property_set(id)?;
            }
            ElementKind::Association(decl) => {
                self.check_properties(element, &decl.properties)?;
                self.check_association(element, &decl.properties, visibility)?;
            }
            ElementKind::Enumeration(decl) => {
                let mut seen = HashSet::new();
                for value in &decl.values {
                    if !seen.insert(value.name.as_str()) {
                        return Err(name_conflict(
                            element,
                            format!("Enumeration {} has a duplicate value '{}'", element.name, value.name),
                            value.span,
                        ));
                    }
                }
            }
            ElementKind::Profile(decl) => {
                let mut seen = HashSet::new();
                for entry in decl.stereotypes.iter().chain(&decl.tags) {
                    if !seen.insert(entry.as_str()) {
                        return Err(name_conflict(
                            element,
                            format!("Profile {} declares '{}' more than once", element.name, entry),
                            element.name_span,
                        ));
                    }
                }
            }
            ElementKind::PrimitiveType(decl) => {
                if let Some(supertype) = &decl.supertype {
                    let resolved = self.resolve_generic_type(element, supertype)?;
                    if !self.is_primitive(&resolved) {
                        return Err(CompilationError::at(
                            ErrorKind::Type {
                                message: format!(
                                    "Primitive {} cannot extend {} as it is not a Primitive",
                                    element.name,
                                    self.render(&resolved)
                                ),
                            },
                            &element.source,
                            supertype.span(),
                        ));
                    }
                }
            }
            ElementKind::ConcreteFunction(_) | ElementKind::NativeFunction(_) => {
                let calls = match FunctionBodyChecker::new(self, visibility, id) {
                    Some(checker) => checker.check()?,
                    None => Vec::new(),
                };
                self.check_externalizable_function(id)?;
                return Ok(calls);
            }
            ElementKind::Extension(decl) => self.check_extension(element, decl)?,
        }
        Ok(Vec::new())
    }

    fn check_properties(&self, element: &PackageableElement, properties: &[PropertyDecl]) -> Result<(), CompilationError> {
        let mut seen = HashSet::new();
        for property in properties {
            if !seen.insert(property.name.as_str()) {
                return Err(name_conflict(
                    element,
                    format!("Property conflict on {} {}: property '{}' defined more than once", element.kind.tag(), element.name, property.name),
                    property.name_span,
                ));
            }
            self.resolve_generic_type(element, &property.ty)?;
            self.check_annotations(element, &property.annotations)?;
        }
        Ok(())
    }

    /// Stereotypes and tags must be declared by the profile they name.
    fn check_annotations(&self, element: &PackageableElement, annotations: &Annotations) -> Result<(), CompilationError> {
        let profile_of = |slot| {
            let reference = element.slot(slot)?;
            let profile = reference.resolved.and_then(|p| self.element(p))?;
            match &profile.kind {
                ElementKind::Profile(decl) => Some((reference.text.as_str(), decl)),
                _ => None,
            }
        };

        for stereotype in &annotations.stereotypes {
            if let Some((text, profile)) = profile_of(stereotype.profile) {
                if !profile.stereotypes.contains(&stereotype.value) {
                    return Err(CompilationError::at(
                        ErrorKind::ReferenceNotFound { name: format!("{}.{}", text, stereotype.value) },
                        &element.source,
                        stereotype.span,
                    ));
                }
            }
        }
        for tagged in &annotations.tagged_values {
            if let Some((text, profile)) = profile_of(tagged.profile) {
                if !profile.tags.contains(&tagged.tag) {
                    return Err(CompilationError::at(
                        ErrorKind::ReferenceNotFound { name: format!("{}.{}", text, tagged.tag) },
                        &element.source,
                        tagged.span,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Two ends, both classes, mutually visible across repositories.
    fn check_association(
        &self,
        element: &PackageableElement,
        properties: &[PropertyDecl],
        visibility: &VisibilityEngine<'_>,
    ) -> Result<(), CompilationError> {
        if properties.len() != 2 {
            return Err(CompilationError::at(
                ErrorKind::Type {
                    message: format!(
                        "Association {} must declare exactly two properties, found {}",
                        element.name,
                        properties.len()
                    ),
                },
                &element.source,
                element.name_span,
            ));
        }

        let mut ends = Vec::with_capacity(2);
        for property in properties {
            let ty = self.resolve_generic_type(element, &property.ty)?;
            let end = ty
                .element_id()
                .filter(|id| matches!(self.element(*id).map(|e| &e.kind), Some(ElementKind::Class(_))));
            let Some(end) = end else {
                return Err(CompilationError::at(
                    ErrorKind::Type {
                        message: format!(
                            "Association {} property '{}' must refer to a Class, found {}",
                            element.name,
                            property.name,
                            self.render(&ty)
                        ),
                    },
                    &element.source,
                    property.ty.span(),
                ));
            };
            ends.push(end);
        }
        visibility.check_association(element, ends[0], ends[1])
    }

    fn check_extension(&self, element: &PackageableElement, decl: &ExtensionDecl) -> Result<(), CompilationError> {
        match decl.section.as_str() {
            "Diagram" => {
                for reference in &decl.references {
                    let Some(slot) = element.slot(reference.slot) else { continue };
                    let Some(target) = slot.resolved.and_then(|t| self.element(t)) else { continue };
                    let expected = match reference.role.as_str() {
                        "class" => "Class",
                        "association" => "Association",
                        _ => "Enumeration",
                    };
                    if target.kind.tag() != expected {
                        return Err(CompilationError::at(
                            ErrorKind::Type {
                                message: format!(
                                    "Diagram {} lists {} as {} {} but it is {} {}",
                                    element.name,
                                    target.path,
                                    article(expected),
                                    reference.role,
                                    article(target.kind.tag()),
                                    target.kind.tag()
                                ),
                            },
                            &element.source,
                            slot.span,
                        ));
                    }
                }
            }
            "Route" => {
                let Some(slot) = decl.reference("function").and_then(|s| element.slot(s)) else { return Ok(()) };
                let Some(function) = slot.resolved.and_then(|t| self.element(t)) else { return Ok(()) };
                if function.access != Some(AccessLevel::Externalizable) {
                    return Err(CompilationError::at(
                        ErrorKind::AccessLevel {
                            message: format!(
                                "Route {} refers to {} which is not externalizable",
                                element.name,
                                function.signature()
                            ),
                        },
                        &element.source,
                        slot.span,
                    ));
                }
                let parameters: Vec<&str> = function
                    .kind
                    .function()
                    .map(|f| f.parameters.iter().map(|p| p.name.as_str()).collect())
                    .unwrap_or_default();
                let path = decl.attributes.get("path").map(String::as_str).unwrap_or("");
                if let Some(unknown) = route_path_params(path).into_iter().find(|p| !parameters.contains(p)) {
                    return Err(CompilationError::at(
                        ErrorKind::ParameterType {
                            message: format!(
                                "Route {} path parameter '{}' does not match a parameter of {}",
                                element.name,
                                unknown,
                                function.signature()
                            ),
                        },
                        &element.source,
                        element.name_span,
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn name_conflict(element: &PackageableElement, message: String, span: Span) -> CompilationError {
    CompilationError::at(ErrorKind::NameConflict { message }, &element.source, span)
}

fn article(word: &str) -> &'static str {
    match word.chars().next() {
        Some('A' | 'E' | 'I' | 'O' | 'U' | 'a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::CompilerConfig;
    use crate::incremental::IncrementalCompiler;

    fn message(text: &str) -> String {
        let mut compiler = IncrementalCompiler::new(CompilerConfig::default()).unwrap();
        compiler
            .create_in_memory_and_compile(&[("/v.pure", text)])
            .err()
            .and_then(|e| e.as_compilation().map(|c| c.message()))
            .unwrap_or_default()
    }

    #[test]
    fn test_unknown_stereotype() {
        assert_eq!(message("Class <<access.secret>> v::C {}\n"), "access.secret has not been defined!");
        assert_eq!(message("Class {doc.summary = 'x'} v::C {}\n"), "doc.summary has not been defined!");
    }

    #[test]
    fn test_association_needs_two_class_ends() {
        assert!(message("Class v::A {}\nAssociation v::L { a: v::A[1]; }\n").contains("exactly two properties"));
        assert!(message("Class v::A {}\nAssociation v::L { a: v::A[1]; s: String[1]; }\n")
            .contains("property 's' must refer to a Class, found String"));
    }

    #[test]
    fn test_duplicate_enum_value() {
        assert_eq!(message("Enum v::E { A, B, A }\n"), "Enumeration E has a duplicate value 'A'");
    }

    #[test]
    fn test_diagram_entry_kind() {
        let text = "Enum v::E { A }\n###Diagram\nDiagram v::D { class v::E; }\n";
        assert_eq!(message(text), "Diagram D lists v::E as a class but it is an Enumeration");
    }

    #[test]
    fn test_route_requires_externalizable_function() {
        let text = "function v::f(): String[1] { 'a' }\n###Route\nRoute v::r { function: v::f; path: '/f'; }\n";
        assert_eq!(message(text), "Route r refers to v::f():String[1] which is not externalizable");
    }

    #[test]
    fn test_route_path_parameter_must_exist() {
        let text = "function <<access.externalizable>> v::f(id: String[1]): String[1] { $id }\n###Route\nRoute v::r { function: v::f; path: '/f/{name}'; }\n";
        assert!(message(text).contains("path parameter 'name' does not match"));
    }
}
