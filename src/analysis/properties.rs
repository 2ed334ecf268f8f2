//! Property sets and property assignment
//!
//! A class's property set is its own properties, the properties attached to
//! it by associations, then the same for every ancestor in generalization
//! order with the ancestor's type arguments substituted.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::{ElementId, GenericType, Multiplicity, Span};
use crate::errors::{CompilationError, ErrorKind};
use crate::model::{ElementKind, PackageableElement, PropertyDecl};

use super::expressions::Typed;
use super::TypeSystem;

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub name: String,
    pub ty: GenericType,
    pub multiplicity: Multiplicity,
    /// Class or association declaring the property.
    pub owner: ElementId,
    pub span: Span,
}

impl<'g> TypeSystem<'g> {
    /// Properties declared by `id` plus those associations attach to it, in
    /// terms of `id`'s own type parameters.
    pub fn own_properties(&self, id: ElementId) -> Result<Vec<PropertyInfo>, CompilationError> {
        let Some(element) = self.element(id) else { return Ok(Vec::new()) };
        let mut properties = Vec::new();
        if let ElementKind::Class(decl) = &element.kind {
            for property in &decl.properties {
                properties.push(self.property_info(id, element, property)?);
            }
        }

        let mut associations: Vec<ElementId> = self
            .graph
            .usages_of(id)
            .iter()
            .filter(|u| matches!(self.element(u.owner).map(|o| &o.kind), Some(ElementKind::Association(_))))
            .map(|u| u.owner)
            .collect();
        associations.sort_by(|a, b| self.graph.path_of(*a).cmp(self.graph.path_of(*b)));
        associations.dedup();

        for association in associations {
            properties.extend(self.association_properties_for(association, id)?);
        }
        Ok(properties)
    }

    /// Properties of `association` that attach to `class`: each end's
    /// property lands on the class at the opposite end.
    fn association_properties_for(&self, association: ElementId, class: ElementId) -> Result<Vec<PropertyInfo>, CompilationError> {
        let Some(element) = self.element(association) else { return Ok(Vec::new()) };
        let ElementKind::Association(decl) = &element.kind else { return Ok(Vec::new()) };
        if decl.properties.len() != 2 {
            return Ok(Vec::new());
        }

        let end_class = |property: &PropertyDecl| {
            property.ty.slot().and_then(|s| element.slot(s)).and_then(|s| s.resolved)
        };
        let mut attached = Vec::new();
        for (index, property) in decl.properties.iter().enumerate() {
            let opposite = &decl.properties[1 - index];
            if end_class(opposite) == Some(class) {
                attached.push(self.property_info(association, element, property)?);
            }
        }
        Ok(attached)
    }

    fn property_info(&self, owner: ElementId, element: &PackageableElement, property: &PropertyDecl) -> Result<PropertyInfo, CompilationError> {
        Ok(PropertyInfo {
            name: property.name.clone(),
            ty: self.resolve_generic_type(element, &property.ty)?,
            multiplicity: property.multiplicity,
            owner,
            span: property.name_span,
        })
    }

    /// Own and inherited properties of a class, rejecting names defined
    /// more than once across the hierarchy.
    pub fn property_set(&self, id: ElementId) -> Result<Arc<Vec<PropertyInfo>>, CompilationError> {
        if let Some(cached) = self.property_sets.get(&id) {
            return Ok(cached.clone());
        }

        let mut properties: Vec<PropertyInfo> = Vec::new();
        let mut seen = HashSet::new();
        for ancestor in self.linearize(id)?.iter() {
            let bindings = self.bindings_for(ancestor.id, &ancestor.binding);
            for mut property in self.own_properties(ancestor.id)? {
                if !seen.insert(property.name.clone()) {
                    return Err(self.property_conflict(id, &property));
                }
                property.ty = property.ty.substitute(&bindings);
                properties.push(property);
            }
        }

        let properties = Arc::new(properties);
        self.property_sets.insert(id, properties.clone());
        Ok(properties)
    }

    fn property_conflict(&self, id: ElementId, property: &PropertyInfo) -> CompilationError {
        let (source, span) = match self.element(id) {
            Some(element) => (element.source.as_str(), element.name_span),
            None => ("", property.span),
        };
        CompilationError::at(
            ErrorKind::NameConflict {
                message: format!(
                    "Property conflict on class {}: property '{}' defined more than once",
                    self.name_of(id),
                    property.name
                ),
            },
            source,
            span,
        )
    }

    /// Look up a property on an instantiated type, with the type's
    /// arguments substituted into the property type.
    pub fn find_property(&self, ty: &GenericType, name: &str) -> Result<Option<PropertyInfo>, CompilationError> {
        let Some(id) = ty.element_id() else { return Ok(None) };
        if !matches!(self.element(id).map(|e| &e.kind), Some(ElementKind::Class(_))) {
            return Ok(None);
        }
        let bindings = self.bindings_for(id, ty);
        Ok(self.property_set(id)?.iter().find(|p| p.name == name).map(|p| PropertyInfo {
            ty: p.ty.substitute(&bindings),
            ..p.clone()
        }))
    }

    /// Check one `path = value` assignment of an instance creation on
    /// `class_type`.
    pub fn check_property_assignment(
        &self,
        class_type: &GenericType,
        path: &[String],
        value: &Typed,
        source: &str,
        span: Span,
    ) -> Result<PropertyInfo, CompilationError> {
        if path.len() != 1 {
            return Err(CompilationError::at(ErrorKind::ChainedProperty { path: path.join(".") }, source, span));
        }
        let name = &path[0];

        let Some(property) = self.find_property(class_type, name)? else {
            return Err(CompilationError::at(
                ErrorKind::PropertyNotFound { property: name.clone(), owner: self.render(class_type) },
                source,
                span,
            ));
        };

        self.require_subtype(&value.ty, &property.ty, source, value.span)?;
        if !value.multiplicity.is_compatible_with(&property.multiplicity) {
            return Err(CompilationError::at(
                ErrorKind::Multiplicity {
                    found: value.multiplicity.to_string(),
                    expected: property.multiplicity.to_string(),
                },
                source,
                value.span,
            ));
        }
        Ok(property)
    }

    /// Every required property of `class_type` must be among `supplied`.
    pub fn check_required_properties(
        &self,
        class_type: &GenericType,
        supplied: &HashSet<&str>,
        source: &str,
        span: Span,
    ) -> Result<(), CompilationError> {
        let Some(id) = class_type.element_id() else { return Ok(()) };
        for property in self.property_set(id)?.iter() {
            if property.multiplicity.lower >= 1 && !supplied.contains(property.name.as_str()) {
                return Err(CompilationError::at(
                    ErrorKind::MissingRequiredProperty {
                        property: property.name.clone(),
                        multiplicity: property.multiplicity.to_string(),
                        owner: self.render(class_type),
                    },
                    source,
                    span,
                ));
            }
        }
        Ok(())
    }
}
