//! Type system
//!
//! Read-only analyses over the model graph: reference resolution, generic
//! type resolution, subtyping, generalization linearization with diamond
//! and cycle detection, property sets, function bodies and externalizable
//! rules. Memo tables live for one validation pass.

pub mod expressions;
pub mod externalizable;
pub mod generalization;
pub mod properties;
pub mod resolver;
pub mod subtype;
pub mod validate;
pub mod variance;

use dashmap::DashMap;
use std::sync::Arc;

use crate::core::{ElementId, GenericType, RawType};
use crate::model::{well_known, ModelGraph, PackageableElement};

pub use expressions::{CallResolution, FunctionBodyChecker, Typed};
pub use generalization::Ancestor;
pub use properties::PropertyInfo;
pub use variance::Variance;

/// Ids of the platform elements the analyses refer to directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct WellKnown {
    pub any: Option<ElementId>,
    pub nil: Option<ElementId>,
    pub string: Option<ElementId>,
    pub boolean: Option<ElementId>,
    pub integer: Option<ElementId>,
    pub float: Option<ElementId>,
    pub map: Option<ElementId>,
    pub route_result: Option<ElementId>,
    pub access_profile: Option<ElementId>,
}

impl WellKnown {
    pub fn lookup(graph: &ModelGraph) -> Self {
        Self {
            any: graph.lookup(well_known::ANY),
            nil: graph.lookup(well_known::NIL),
            string: graph.lookup(well_known::STRING),
            boolean: graph.lookup(well_known::BOOLEAN),
            integer: graph.lookup(well_known::INTEGER),
            float: graph.lookup(well_known::FLOAT),
            map: graph.lookup(well_known::MAP),
            route_result: graph.lookup(well_known::ROUTE_RESULT),
            access_profile: graph.lookup(well_known::ACCESS_PROFILE),
        }
    }
}

/// Shared entry point of the analyses for one pass over a graph.
pub struct TypeSystem<'g> {
    graph: &'g ModelGraph,
    well_known: WellKnown,
    max_suggestions: usize,
    linearizations: DashMap<ElementId, Arc<Vec<Ancestor>>>,
    property_sets: DashMap<ElementId, Arc<Vec<PropertyInfo>>>,
}

impl<'g> TypeSystem<'g> {
    pub fn new(graph: &'g ModelGraph) -> Self {
        Self {
            graph,
            well_known: WellKnown::lookup(graph),
            max_suggestions: 3,
            linearizations: DashMap::new(),
            property_sets: DashMap::new(),
        }
    }

    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = max;
        self
    }

    pub fn graph(&self) -> &'g ModelGraph {
        self.graph
    }

    pub fn well_known(&self) -> &WellKnown {
        &self.well_known
    }

    pub(crate) fn element(&self, id: ElementId) -> Option<&'g PackageableElement> {
        self.graph.get(id)
    }

    /// Simple name of an element, `?` once it has been unbound.
    pub(crate) fn name_of(&self, id: ElementId) -> &'g str {
        self.graph.get(id).map_or("?", |e| e.name.as_str())
    }

    /// Render a resolved type with simple names: `Map<String, Person>`,
    /// `{String[1]->Boolean[1]}`.
    pub fn render(&self, ty: &GenericType) -> String {
        let raw = match &ty.raw {
            RawType::Element(id) => self.name_of(*id).to_string(),
            RawType::Param(name) => name.clone(),
            RawType::Function(function) => {
                let params: Vec<_> = function
                    .params
                    .iter()
                    .map(|(t, m)| format!("{}{}", self.render(t), m))
                    .collect();
                format!("{{{}->{}{}}}", params.join(", "), self.render(&function.ret.0), function.ret.1)
            }
        };
        if ty.args.is_empty() {
            raw
        } else {
            let args: Vec<_> = ty.args.iter().map(|a| self.render(a)).collect();
            format!("{}<{}>", raw, args.join(", "))
        }
    }

    /// Declared form of a generic element, e.g. `A<T>`.
    pub fn render_declared(&self, id: ElementId) -> String {
        let Some(element) = self.element(id) else { return "?".to_string() };
        let params = element.kind.type_params();
        if params.is_empty() {
            element.name.clone()
        } else {
            format!("{}<{}>", element.name, params.join(", "))
        }
    }

    /// The element's own type: raw type applied to its type parameters.
    pub fn self_type(&self, id: ElementId) -> GenericType {
        let params = self.element(id).map(|e| e.kind.type_params()).unwrap_or_default();
        GenericType::with_args(id, params.iter().map(GenericType::param).collect())
    }

    pub fn is_any(&self, ty: &GenericType) -> bool {
        ty.element_id().is_some() && ty.element_id() == self.well_known.any
    }

    pub fn is_nil(&self, ty: &GenericType) -> bool {
        ty.element_id().is_some() && ty.element_id() == self.well_known.nil
    }

    /// `Any`, falling back to a parameter when the platform is missing.
    pub fn any_type(&self) -> GenericType {
        self.well_known.any.map_or_else(|| GenericType::param("Any"), GenericType::element)
    }

    pub fn nil_type(&self) -> GenericType {
        self.well_known.nil.map_or_else(|| GenericType::param("Nil"), GenericType::element)
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::CompilerConfig;
    use crate::incremental::IncrementalCompiler;

    #[test]
    fn test_render_uses_simple_names() {
        let mut compiler = IncrementalCompiler::new(CompilerConfig::default()).unwrap();
        compiler
            .create_in_memory_and_compile(&[("/a.pure", "Class a::Box<T> { value: T[1]; }\n")])
            .unwrap();
        let types = compiler.type_system();
        let graph = compiler.graph();
        let boxed = graph.lookup("a::Box").unwrap();
        let string = types.well_known().string.unwrap();

        let ty = crate::core::GenericType::with_args(boxed, vec![crate::core::GenericType::element(string)]);
        assert_eq!(types.render(&ty), "Box<String>");
        assert_eq!(types.render_declared(boxed), "Box<T>");
        assert_eq!(types.render(&types.self_type(boxed)), "Box<T>");
    }
}
