use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

use crate::core::{ElementId, SlotId, Span};
use crate::errors::{CompilationError, ErrorKind};
use crate::incremental::ContentHash;
use crate::visibility::AccessLevel;

use super::element::{
    split_path, Annotations, ElementKind, PackageDecl, PackageableElement, SlotKind, ROOT_PACKAGE,
};
use super::generalization::GeneralizationGraph;
use super::usage::{ReferenceUsage, UsageIndex};
use super::well_known;

/// Result of removing an element from the graph.
#[derive(Debug)]
pub struct Unbound {
    pub element: PackageableElement,
    /// Elements whose slots pointed at the removed element. Their slots
    /// have been reset and must be resolved again.
    pub dependents: Vec<ElementId>,
}

/// Arena of bound elements plus the indexes the compiler maintains over it.
///
/// The graph is the single source of truth for bound state. Only the
/// incremental compiler mutates it; everything else reads it.
#[derive(Debug, Clone)]
pub struct ModelGraph {
    elements: Vec<Option<PackageableElement>>,
    free: Vec<u32>,
    paths: HashMap<String, ElementId>,
    usages: UsageIndex,
    generalizations: GeneralizationGraph,
    functions_by_name: HashMap<String, BTreeSet<String>>,
    name_references: HashMap<String, HashSet<ElementId>>,
}

impl ModelGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            elements: Vec::new(),
            free: Vec::new(),
            paths: HashMap::new(),
            usages: UsageIndex::new(),
            generalizations: GeneralizationGraph::new(),
            functions_by_name: HashMap::new(),
            name_references: HashMap::new(),
        };
        graph.insert(package_element(ROOT_PACKAGE));
        graph
    }

    pub fn get(&self, id: ElementId) -> Option<&PackageableElement> {
        self.elements.get(id.index()).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: ElementId) -> Option<&mut PackageableElement> {
        self.elements.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    pub fn lookup(&self, path: &str) -> Option<ElementId> {
        self.paths.get(path).copied()
    }

    pub fn lookup_element(&self, path: &str) -> Option<&PackageableElement> {
        self.lookup(path).and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &PackageableElement)> {
        self.elements
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (ElementId(i as u32), e)))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.len() <= 1
    }

    pub fn path_of(&self, id: ElementId) -> &str {
        self.get(id).map_or("<unbound>", |e| e.path.as_str())
    }

    /// Insert a parsed element, creating its enclosing packages.
    pub fn bind(&mut self, element: PackageableElement) -> Result<ElementId, CompilationError> {
        if let Some(existing) = self.lookup_element(&element.path) {
            let mut error = CompilationError::at(
                ErrorKind::NameConflict {
                    message: format!(
                        "The element '{}' already exists in the package '{}'",
                        element.name, element.package
                    ),
                },
                &element.source,
                element.name_span,
            );
            if !existing.source.is_empty() {
                error = error.with_suggestion(format!(
                    "previously defined at {}:{}:{}",
                    existing.source, existing.span.start_line, existing.span.start_col
                ));
            }
            return Err(error);
        }

        self.ensure_package(&element.package, &element)?;
        self.attach_to_package(&element.package, &element.name);

        if let Some(function) = element.kind.function() {
            self.functions_by_name
                .entry(function.function_name.clone())
                .or_default()
                .insert(element.path.clone());
        }
        let names: Vec<String> = element
            .slots
            .iter()
            .filter(|s| !s.is_qualified())
            .map(|s| s.text.clone())
            .collect();

        let id = self.insert(element);
        for name in names {
            self.name_references.entry(name).or_default().insert(id);
        }
        trace!(path = self.path_of(id), "bound element");
        Ok(id)
    }

    /// Remove an element, resetting every slot that pointed at it.
    pub fn unbind(&mut self, id: ElementId) -> Option<Unbound> {
        let element = self.elements.get_mut(id.index())?.take()?;
        self.paths.remove(&element.path);
        self.free.push(id.0);

        if let Some(function) = element.kind.function() {
            if let Some(paths) = self.functions_by_name.get_mut(&function.function_name) {
                paths.remove(&element.path);
                if paths.is_empty() {
                    self.functions_by_name.remove(&function.function_name);
                }
            }
        }
        for slot in element.slots.iter().filter(|s| !s.is_qualified()) {
            if let Some(owners) = self.name_references.get_mut(&slot.text) {
                owners.remove(&id);
                if owners.is_empty() {
                    self.name_references.remove(&slot.text);
                }
            }
        }

        self.usages.remove_outgoing(id);
        let mut dependents = Vec::new();
        for usage in self.usages.take_incoming(id) {
            if let Some(slot) = self.get_mut(usage.owner).and_then(|o| o.slots.get_mut(usage.slot)) {
                slot.resolved = None;
            }
            dependents.push(usage.owner);
        }
        dependents.sort();
        dependents.dedup();

        self.generalizations.remove(id);
        self.detach_from_package(&element.package, &element.name);
        trace!(path = %element.path, dependents = dependents.len(), "unbound element");

        Some(Unbound { element, dependents })
    }

    /// Swap in a re-parsed copy of an unchanged element, keeping its identity
    /// and resolutions while taking the new positions. The copy must declare
    /// the same reference slots, in order, as the bound element.
    pub fn refresh(&mut self, id: ElementId, mut element: PackageableElement) {
        let Some(current) = self.get_mut(id) else { return };
        for (new, old) in element.slots.iter_mut().zip(&current.slots) {
            new.resolved = old.resolved;
        }
        element.access = current.access;
        *current = element;

        let spans: Vec<Span> = current.slots.iter().map(|s| s.span).collect();
        self.usages.refresh_spans(id, &spans);
        self.recompute_access(id);
    }

    /// Point `slot` of `owner` at `target`, keeping the usage index in step.
    pub fn resolve_slot(&mut self, owner: ElementId, slot: SlotId, target: Option<ElementId>) {
        self.usages.remove_slot(owner, slot);
        let Some(reference) = self.get_mut(owner).and_then(|o| o.slots.get_mut(slot)) else { return };
        reference.resolved = target;
        let span = reference.span;
        if let Some(target) = target {
            self.usages.record(target, ReferenceUsage { owner, slot, span });
        }
    }

    /// Reset every resolved slot of `owner` whose kind matches.
    pub fn clear_slots(&mut self, owner: ElementId, matches: impl Fn(&SlotKind) -> bool) {
        let Some(element) = self.get(owner) else { return };
        let slots: Vec<SlotId> = element
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.resolved.is_some() && matches(&s.kind))
            .map(|(i, _)| i)
            .collect();
        for slot in slots {
            self.resolve_slot(owner, slot, None);
        }
    }

    /// Cache the explicit access level from resolved `access` stereotypes.
    pub fn recompute_access(&mut self, id: ElementId) {
        let profile = self.lookup(well_known::ACCESS_PROFILE);
        let Some(element) = self.get_mut(id) else { return };
        let declarations: Vec<(AccessLevel, Span)> = element
            .annotations
            .stereotypes
            .iter()
            .filter(|s| profile.is_some() && element.slots.get(s.profile).and_then(|p| p.resolved) == profile)
            .filter_map(|s| AccessLevel::from_stereotype(&s.value).map(|level| (level, s.span)))
            .collect();
        element.access = declarations.first().map(|(level, _)| *level);
        element.access_declarations = declarations;
    }

    pub fn usages_of(&self, target: ElementId) -> &[ReferenceUsage] {
        self.usages.usages_of(target)
    }

    pub fn generalizations(&self) -> &GeneralizationGraph {
        &self.generalizations
    }

    pub fn set_supertypes(&mut self, id: ElementId, supertypes: &[ElementId]) {
        self.generalizations.set_supertypes(id, supertypes);
    }

    /// Functions with the given unqualified name, ordered by path.
    pub fn functions_named(&self, name: &str) -> Vec<ElementId> {
        self.functions_by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|path| self.lookup(path))
            .collect()
    }

    /// Elements holding an unqualified reference written as `name`.
    pub fn referencing_name(&self, name: &str) -> Vec<ElementId> {
        let mut owners: Vec<_> = self.name_references.get(name).into_iter().flatten().copied().collect();
        owners.sort();
        owners
    }

    /// Names of the direct members of a package.
    pub fn package_members(&self, package: &str) -> Vec<&str> {
        match self.lookup_element(package).map(|e| &e.kind) {
            Some(ElementKind::Package(decl)) => decl.children.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    fn insert(&mut self, element: PackageableElement) -> ElementId {
        let path = element.path.clone();
        let id = match self.free.pop() {
            Some(index) => {
                self.elements[index as usize] = Some(element);
                ElementId(index)
            }
            None => {
                self.elements.push(Some(element));
                ElementId(self.elements.len() as u32 - 1)
            }
        };
        self.paths.insert(path, id);
        id
    }

    fn ensure_package(&mut self, package: &str, for_element: &PackageableElement) -> Result<(), CompilationError> {
        match self.lookup_element(package) {
            Some(existing) if matches!(existing.kind, ElementKind::Package(_)) => return Ok(()),
            Some(existing) => {
                return Err(CompilationError::at(
                    ErrorKind::NameConflict {
                        message: format!(
                            "'{}' is a {} and cannot contain the element '{}'",
                            package,
                            existing.kind.tag(),
                            for_element.name
                        ),
                    },
                    &for_element.source,
                    for_element.name_span,
                ));
            }
            None => {}
        }

        let (parent, name) = split_path(package);
        self.ensure_package(parent, for_element)?;
        self.attach_to_package(parent, name);
        self.insert(package_element(package));
        Ok(())
    }

    fn attach_to_package(&mut self, package: &str, name: &str) {
        if let Some(ElementKind::Package(decl)) = self.lookup(package).and_then(|id| self.get_mut(id)).map(|e| &mut e.kind) {
            decl.children.insert(name.to_string());
        }
    }

    fn detach_from_package(&mut self, package: &str, name: &str) {
        let mut package = package.to_string();
        let mut name = name.to_string();
        loop {
            let Some(id) = self.lookup(&package) else { return };
            let now_empty = match self.get_mut(id).map(|e| &mut e.kind) {
                Some(ElementKind::Package(decl)) => {
                    decl.children.remove(&name);
                    decl.children.is_empty()
                }
                _ => return,
            };
            if !now_empty || package == ROOT_PACKAGE {
                return;
            }

            self.elements[id.index()] = None;
            self.paths.remove(&package);
            self.free.push(id.0);
            let (parent, simple) = split_path(&package);
            let (parent, simple) = (parent.to_string(), simple.to_string());
            package = parent;
            name = simple;
        }
    }
}

impl Default for ModelGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn package_element(path: &str) -> PackageableElement {
    let (package, name) = if path == ROOT_PACKAGE {
        ("", ROOT_PACKAGE)
    } else {
        split_path(path)
    };
    PackageableElement {
        path: path.to_string(),
        name: name.to_string(),
        package: package.to_string(),
        kind: ElementKind::Package(PackageDecl::default()),
        annotations: Annotations::default(),
        slots: Vec::new(),
        access: None,
        access_declarations: Vec::new(),
        source: String::new(),
        span: Span::default(),
        name_span: Span::default(),
        imports: Arc::new(Vec::new()),
        fingerprint: ContentHash::from_str(path),
    }
}
