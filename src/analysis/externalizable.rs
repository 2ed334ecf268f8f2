//! Access stereotypes and externalizable functions
//!
//! Externalizable functions are callable from outside the model, so their
//! signatures are restricted to values that cross that boundary: primitives
//! and maps, with simple multiplicities. A route may pin parameters into
//! path segments, which tightens the rule for those parameters and lets the
//! function return a routing result.

use std::collections::BTreeMap;

use crate::core::{ElementId, GenericType, Multiplicity, Span};
use crate::errors::{CompilationError, ErrorKind};
use crate::frontend::extensions::route_path_params;
use crate::model::{ElementKind, ModelGraph, PackageableElement};
use crate::visibility::AccessLevel;

use super::TypeSystem;

/// Multiplicities an externalizable parameter may declare.
const PARAMETER_MULTIPLICITIES: [Multiplicity; 3] =
    [Multiplicity::ZERO_ONE, Multiplicity::PURE_ONE, Multiplicity::ZERO_MANY];

impl<'g> TypeSystem<'g> {
    /// At most one access stereotype, only on classes and functions, and
    /// externalizable only on functions. Properties never carry one.
    pub fn check_access_annotations(&self, id: ElementId) -> Result<(), CompilationError> {
        let Some(element) = self.element(id) else { return Ok(()) };
        let access_error = |message: String, span: Span| {
            CompilationError::at(ErrorKind::AccessLevel { message }, &element.source, span)
        };

        if let Some((_, span)) = element.access_declarations.get(1) {
            return Err(access_error(
                format!("{} has multiple access level stereotypes", element.signature()),
                *span,
            ));
        }

        if let Some((level, span)) = element.access_declarations.first() {
            let is_class = matches!(element.kind, ElementKind::Class(_));
            if !is_class && !element.is_function() {
                return Err(access_error(
                    format!(
                        "Access level stereotypes are only allowed on classes and functions, found one on {} {}",
                        element.kind.tag(),
                        element.path
                    ),
                    *span,
                ));
            }
            if *level == AccessLevel::Externalizable && !element.is_function() {
                return Err(access_error("Only functions may have an access level of externalizable".to_string(), *span));
            }
        }

        let properties = match &element.kind {
            ElementKind::Class(decl) => decl.properties.as_slice(),
            ElementKind::Association(decl) => decl.properties.as_slice(),
            _ => &[],
        };
        for property in properties {
            for stereotype in &property.annotations.stereotypes {
                let profile = element.slot(stereotype.profile).and_then(|s| s.resolved);
                if profile.is_some() && profile == self.well_known.access_profile {
                    return Err(access_error(
                        format!(
                            "Access level stereotypes are not allowed on properties: {}.{}",
                            element.name, property.name
                        ),
                        stereotype.span,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Signature rules for a function whose access level is externalizable.
    pub fn check_externalizable_function(&self, id: ElementId) -> Result<(), CompilationError> {
        let Some(element) = self.element(id) else { return Ok(()) };
        let Some(decl) = element.kind.function() else { return Ok(()) };
        if element.access != Some(AccessLevel::Externalizable) {
            return Ok(());
        }

        let pinned = self.route_pinned_parameters(id);
        let routed = !self.routes_of(id).is_empty();
        let signature = element.signature();

        for parameter in &decl.parameters {
            let ty = self.resolve_generic_type(element, &parameter.ty)?;
            let parameter_error = |message: String| {
                CompilationError::at(ErrorKind::ParameterType { message }, &element.source, parameter.span)
            };

            if pinned.iter().any(|p| p == &parameter.name) {
                if parameter.multiplicity != Multiplicity::PURE_ONE || !(self.is_primitive(&ty) || self.is_enumeration(&ty)) {
                    return Err(parameter_error(format!(
                        "Parameter '{}' of {} is bound to a route path segment and must be a primitive or enumeration with multiplicity [1], found {}{}",
                        parameter.name,
                        signature,
                        self.render(&ty),
                        parameter.multiplicity
                    )));
                }
                continue;
            }

            if !self.is_primitive(&ty) && !self.is_map(&ty) {
                return Err(parameter_error(format!(
                    "Parameter '{}' of externalizable function {} must have a primitive or Map type, found {}",
                    parameter.name,
                    signature,
                    self.render(&ty)
                )));
            }
            if !PARAMETER_MULTIPLICITIES.contains(&parameter.multiplicity) {
                return Err(parameter_error(format!(
                    "Parameter '{}' of externalizable function {} must have multiplicity [0..1], [1] or [*], found {}",
                    parameter.name, signature, parameter.multiplicity
                )));
            }
        }

        let return_type = self.resolve_generic_type(element, &decl.return_type)?;
        let routed_result = routed
            && self
                .well_known
                .route_result
                .map_or(false, |result| self.is_subtype_of(&return_type, &GenericType::element(result)));
        let return_error = |message: String| {
            CompilationError::at(ErrorKind::Type { message }, &element.source, decl.return_type.span())
        };
        if !self.is_primitive(&return_type) && !routed_result {
            return Err(return_error(format!(
                "Externalizable function {} must return a primitive type{}, found {}",
                signature,
                if routed { " or a router Result" } else { "" },
                self.render(&return_type)
            )));
        }
        if decl.return_multiplicity != Multiplicity::PURE_ONE {
            return Err(return_error(format!(
                "Externalizable function {} must return exactly one value, found multiplicity {}",
                signature, decl.return_multiplicity
            )));
        }
        Ok(())
    }

    /// Route elements whose function slot points at `id`.
    pub fn routes_of(&self, id: ElementId) -> Vec<&'g PackageableElement> {
        let mut routes: Vec<_> = self
            .graph
            .usages_of(id)
            .iter()
            .filter_map(|u| self.element(u.owner))
            .filter(|owner| matches!(&owner.kind, ElementKind::Extension(ext) if ext.section == "Route"))
            .collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path));
        routes.dedup_by(|a, b| a.path == b.path);
        routes
    }

    fn route_pinned_parameters(&self, id: ElementId) -> Vec<String> {
        let mut pinned = Vec::new();
        for route in self.routes_of(id) {
            if let ElementKind::Extension(ext) = &route.kind {
                if let Some(path) = ext.attributes.get("path") {
                    pinned.extend(route_path_params(path).into_iter().map(str::to_string));
                }
            }
        }
        pinned
    }

    pub fn is_primitive(&self, ty: &GenericType) -> bool {
        ty.args.is_empty()
            && matches!(ty.element_id().and_then(|id| self.element(id)).map(|e| &e.kind), Some(ElementKind::PrimitiveType(_)))
    }

    pub fn is_enumeration(&self, ty: &GenericType) -> bool {
        matches!(ty.element_id().and_then(|id| self.element(id)).map(|e| &e.kind), Some(ElementKind::Enumeration(_)))
    }

    fn is_map(&self, ty: &GenericType) -> bool {
        ty.element_id().is_some() && ty.element_id() == self.well_known.map
    }
}

/// Unqualified names of externalizable functions must be unique across the
/// whole graph, whatever their package or signature.
pub fn check_externalizable_names(graph: &ModelGraph) -> Result<(), CompilationError> {
    let mut by_name: BTreeMap<&str, Vec<&PackageableElement>> = BTreeMap::new();
    for (_, element) in graph.iter() {
        if element.access != Some(AccessLevel::Externalizable) {
            continue;
        }
        if let Some(decl) = element.kind.function() {
            by_name.entry(decl.function_name.as_str()).or_default().push(element);
        }
    }

    for (name, mut functions) in by_name {
        if functions.len() < 2 {
            continue;
        }
        functions.sort_by(|a, b| a.path.cmp(&b.path));
        let listed: Vec<String> = functions
            .iter()
            .map(|f| {
                format!(
                    "{} at {}:{}:{}-{}:{}",
                    f.signature(),
                    f.source,
                    f.name_span.start_line,
                    f.name_span.start_col,
                    f.name_span.end_line,
                    f.name_span.end_col
                )
            })
            .collect();
        let last = functions[functions.len() - 1];
        return Err(CompilationError::at(
            ErrorKind::NameConflict {
                message: format!(
                    "Externalizable function name '{}' is not unique: {}",
                    name,
                    listed.join(", ")
                ),
            },
            &last.source,
            last.name_span,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::frontend::CompilerConfig;
    use crate::incremental::IncrementalCompiler;

    fn compile(text: &str) -> Result<IncrementalCompiler, crate::errors::PureError> {
        let mut compiler = IncrementalCompiler::new(CompilerConfig::default())?;
        compiler.create_in_memory_and_compile(&[("/e.pure", text)])?;
        Ok(compiler)
    }

    fn message(text: &str) -> String {
        compile(text).err().and_then(|e| e.as_compilation().map(|c| c.message())).unwrap_or_default()
    }

    #[test]
    fn test_valid_externalizable_function() {
        let compiler = compile(
            "function <<access.externalizable>> e::find(name: String[1], tags: String[*], limit: Integer[0..1]): String[1] { $name }\n",
        )
        .unwrap();
        assert!(compiler.get_element("e::find_String_1__String_MANY__Integer_$0_1$__String_1_").is_some());
    }

    #[test]
    fn test_multiple_access_stereotypes() {
        let text = "function <<access.private, access.externalizable>> e::f(): String[1] { 'a' }\n";
        assert_eq!(message(text), "e::f():String[1] has multiple access level stereotypes");
    }

    #[test]
    fn test_externalizable_only_on_functions() {
        let text = "Class <<access.externalizable>> e::C {}\n";
        assert_eq!(message(text), "Only functions may have an access level of externalizable");
    }

    #[test]
    fn test_no_access_levels_on_properties() {
        let text = "Class e::C { <<access.private>> name: String[1]; }\n";
        assert!(message(text).starts_with("Access level stereotypes are not allowed on properties"));
    }

    #[test]
    fn test_parameter_multiplicity_one_many_rejected() {
        let text = "function <<access.externalizable>> e::f(names: String[1..*]): String[1] { 'a' }\n";
        let error = compile(text).unwrap_err();
        let error = error.as_compilation().unwrap();
        assert_eq!(error.kind.category(), "ParameterTypeError");
        assert!(error.message().contains("must have multiplicity [0..1], [1] or [*], found [1..*]"));
    }

    #[test]
    fn test_parameter_must_be_primitive_or_map() {
        let text = "Class e::C {}\nfunction <<access.externalizable>> e::f(c: e::C[1]): String[1] { 'a' }\n";
        assert!(message(text).contains("must have a primitive or Map type, found C"));

        let text = "function <<access.externalizable>> e::g(m: Map<String, Integer>[1]): String[1] { 'a' }\n";
        assert!(compile(text).is_ok());
    }

    #[test]
    fn test_return_must_be_single_primitive() {
        let text = "function <<access.externalizable>> e::f(): String[*] { ['a', 'b'] }\n";
        assert!(message(text).contains("must return exactly one value"));
    }

    #[test]
    fn test_route_pinned_parameter_needs_exactly_one() {
        let text = "function <<access.externalizable>> e::f(id: String[0..1]): String[1] { 'a' }\n###Route\nRoute e::r { function: e::f; path: '/people/{id}'; }\n";
        assert!(message(text).contains("is bound to a route path segment"));

        let text = "Enum e::Kind { A, B }\nfunction <<access.externalizable>> e::g(kind: e::Kind[1]): String[1] { 'a' }\n###Route\nRoute e::r { function: e::g; path: '/things/{kind}'; }\n";
        assert!(compile(text).is_ok());
    }

    #[test]
    fn test_routed_function_may_return_router_result() {
        let text = "Class e::Out extends meta::pure::router::Result {}\nfunction <<access.externalizable>> e::f(id: String[1]): e::Out[1] { ^e::Out() }\n###Route\nRoute e::r { function: e::f; path: '/x/{id}'; }\n";
        assert!(compile(text).is_ok());

        let unrouted = "Class e::Out extends meta::pure::router::Result {}\nfunction <<access.externalizable>> e::f(id: String[1]): e::Out[1] { ^e::Out() }\n";
        assert!(message(unrouted).contains("must return a primitive type, found Out"));
    }
}
