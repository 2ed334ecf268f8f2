//! Incremental compiler
//!
//! The only mutator of the model graph. Edits are staged in the source
//! registry; `compile` applies them as one batch:
//!
//! 1. parse every changed source (a parser error aborts before any mutation)
//! 2. unbind elements that changed or disappeared, refresh unchanged ones,
//!    bind new ones
//! 3. reset references whose resolution may have changed and resolve every
//!    open reference slot
//! 4. validate the affected elements and everything that references them
//!
//! Any error restores the graph snapshot taken before step 2, so a failed
//! batch leaves no trace.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::analysis::externalizable::check_externalizable_names;
use crate::analysis::{CallResolution, TypeSystem};
use crate::core::{ElementId, SlotId, Span, TypeExpr};
use crate::errors::{CompilationError, ErrorKind, PureError, Result};
use crate::frontend::{CompilerConfig, ParserRegistry, UnboundElement};
use crate::model::{ElementKind, ModelGraph, PackageableElement, ReferenceSlot, SlotKind};
use crate::visibility::{RepositorySet, VisibilityEngine};

use super::cache::{CacheKey, CacheStats, ParseCache};
use super::invalidation::{in_path_order, invalidate};
use super::platform::{PLATFORM_SOURCE, PLATFORM_SOURCE_ID};
use super::source::{PendingChange, SourceRegistry, SourceState};

/// Summary of one successful compile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileReport {
    pub sources: Vec<String>,
    pub bound: usize,
    pub unbound: usize,
    pub refreshed: usize,
    pub validated: usize,
    pub elapsed: Duration,
}

impl CompileReport {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Mutations of one batch, gathered while the graph is rebuilt.
#[derive(Default)]
struct BatchChanges {
    /// Elements to validate: new ones and those whose references were reset.
    dirty: BTreeSet<ElementId>,
    /// Newly bound elements.
    bound: Vec<ElementId>,
    /// Lookup names that appeared or disappeared.
    names: BTreeSet<String>,
    /// Function names whose overload family changed.
    families: BTreeSet<String>,
    unbound: usize,
    refreshed: usize,
}

pub struct IncrementalCompiler {
    config: CompilerConfig,
    sources: SourceRegistry,
    graph: ModelGraph,
    parsers: ParserRegistry,
    cache: ParseCache,
    repositories: RepositorySet,
}

impl std::fmt::Debug for IncrementalCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalCompiler").finish_non_exhaustive()
    }
}

impl IncrementalCompiler {
    /// Create a compiler with the platform model already compiled.
    pub fn new(config: CompilerConfig) -> Result<Self> {
        config.validate().map_err(PureError::Config)?;
        let repositories = RepositorySet::from_config(&config).map_err(PureError::Config)?;
        let mut compiler = Self {
            cache: ParseCache::new(config.compiler.parse_cache_size),
            config,
            sources: SourceRegistry::new(),
            graph: ModelGraph::new(),
            parsers: ParserRegistry::with_defaults(),
            repositories,
        };

        compiler.sources.create_immutable(PLATFORM_SOURCE_ID, PLATFORM_SOURCE)?;
        compiler.compile()?;
        debug!(elements = compiler.graph.len(), "platform compiled");
        Ok(compiler)
    }

    /// Replace the section parsers, e.g. to register an additional DSL.
    /// Cached parses from the previous parsers are dropped.
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self.cache.clear();
        self
    }

    pub fn create_source(&mut self, id: &str, text: &str) -> Result<()> {
        self.sources.create(id, text)
    }

    pub fn modify(&mut self, id: &str, text: &str) -> Result<()> {
        self.sources.modify(id, text)
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.sources.delete(id)
    }

    /// Stage all sources and compile them as one batch, so references
    /// between them resolve regardless of order.
    pub fn create_in_memory_and_compile(&mut self, sources: &[(&str, &str)]) -> Result<CompileReport> {
        for (id, text) in sources {
            self.sources.create(id, text)?;
        }
        self.compile()
    }

    /// Compile every staged edit as one batch.
    #[instrument(skip(self))]
    pub fn compile(&mut self) -> Result<CompileReport> {
        let started = Instant::now();
        let pending = self.sources.pending();
        if pending.is_empty() {
            return Ok(CompileReport::default());
        }

        let mut parsed: BTreeMap<String, (Arc<str>, Arc<Vec<UnboundElement>>)> = BTreeMap::new();
        for (id, change) in &pending {
            let PendingChange::Upsert(text) = change else { continue };
            match self.parse(id, text) {
                Ok(elements) => {
                    self.sources.set_state(id, SourceState::Parsed);
                    parsed.insert(id.clone(), (text.clone(), elements));
                }
                Err(error) => {
                    warn!(source = %id, %error, "parse failed");
                    self.sources.set_state(id, SourceState::Failed);
                    return Err(error.into());
                }
            }
        }

        let snapshot = self.graph.clone();
        match self.apply(&pending, &parsed) {
            Ok(mut report) => {
                for (id, change) in &pending {
                    match change {
                        PendingChange::Upsert(_) => {
                            let (text, elements) = &parsed[id];
                            let paths = elements.iter().map(|e| e.path.clone()).collect();
                            self.sources.commit(id, text.clone(), paths);
                        }
                        PendingChange::Delete => self.sources.commit_delete(id),
                    }
                }
                report.sources = pending.into_iter().map(|(id, _)| id).collect();
                report.elapsed = started.elapsed();
                info!(
                    sources = report.sources.len(),
                    bound = report.bound,
                    unbound = report.unbound,
                    validated = report.validated,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "compile succeeded"
                );
                Ok(report)
            }
            Err(error) => {
                self.graph = snapshot;
                for (id, change) in &pending {
                    if matches!(change, PendingChange::Upsert(_)) {
                        self.sources.set_state(id, SourceState::Failed);
                    }
                }
                warn!(
                    category = error.kind.category(),
                    location = %error.location,
                    "compile failed, graph rolled back"
                );
                Err(error.into())
            }
        }
    }

    fn parse(&mut self, id: &str, text: &str) -> std::result::Result<Arc<Vec<UnboundElement>>, crate::errors::ParserError> {
        let key = CacheKey::new(id, text);
        if let Some(elements) = self.cache.get(&key) {
            return Ok(elements);
        }
        let elements = Arc::new(self.parsers.parse(id, text)?);
        self.cache.insert(key, elements.clone());
        Ok(elements)
    }

    fn apply(
        &mut self,
        pending: &[(String, PendingChange)],
        parsed: &BTreeMap<String, (Arc<str>, Arc<Vec<UnboundElement>>)>,
    ) -> std::result::Result<CompileReport, CompilationError> {
        let mut changes = BatchChanges::default();
        let kept = self.unbind_stale(pending, parsed, &mut changes);
        self.bind_parsed(parsed, &kept, &mut changes)?;
        self.reset_by_name(&mut changes);

        let to_resolve: BTreeSet<ElementId> = changes.dirty.iter().copied().chain(changes.bound.iter().copied()).collect();
        self.resolve(&to_resolve)?;

        // New associations, routes and subclasses change what the elements
        // they point at must satisfy.
        for id in &changes.bound {
            if let Some(element) = self.graph.get(*id) {
                if matches!(element.kind, ElementKind::Association(_) | ElementKind::Extension(_) | ElementKind::Class(_)) {
                    changes.dirty.extend(element.resolved_targets().map(|(_, target)| target));
                }
            }
        }
        for name in &changes.families {
            for function in self.graph.functions_named(name) {
                changes.dirty.extend(self.graph.usages_of(function).iter().map(|u| u.owner));
            }
        }

        let worklist = if self.config.compiler.full_validation {
            self.graph.iter().filter(|(_, e)| !e.source.is_empty()).map(|(id, _)| id).collect()
        } else {
            invalidate(&self.graph, changes.dirty.iter().copied().chain(changes.bound.iter().copied()))
        };
        let worklist = in_path_order(&self.graph, &worklist);
        debug!(worklist = worklist.len(), "validating");

        let calls = self.validate(&worklist)?;
        for call in calls {
            self.graph.resolve_slot(call.owner, call.slot, Some(call.target));
        }

        Ok(CompileReport {
            bound: changes.bound.len(),
            unbound: changes.unbound,
            refreshed: changes.refreshed,
            validated: worklist.len(),
            ..CompileReport::default()
        })
    }

    /// Unbind the elements of pending sources that changed or vanished.
    /// Returns the paths kept in place, per source.
    fn unbind_stale(
        &mut self,
        pending: &[(String, PendingChange)],
        parsed: &BTreeMap<String, (Arc<str>, Arc<Vec<UnboundElement>>)>,
        changes: &mut BatchChanges,
    ) -> HashMap<String, ElementId> {
        let mut kept = HashMap::new();
        for (id, _) in pending {
            let Some(committed) = self.sources.committed(id) else { continue };
            let fresh: HashMap<&str, &UnboundElement> = parsed
                .get(id)
                .map(|(_, elements)| elements.iter().map(|e| (e.path.as_str(), e)).collect())
                .unwrap_or_default();

            for path in committed.elements.clone() {
                let Some(element_id) = self.graph.lookup(&path) else { continue };
                let unchanged = match (self.graph.get(element_id), fresh.get(path.as_str())) {
                    (Some(current), Some(new)) => {
                        current.source == *id
                            && current.fingerprint == new.fingerprint
                            && same_references(&current.slots, &new.slots)
                    }
                    _ => false,
                };
                if unchanged {
                    kept.insert(path, element_id);
                    continue;
                }

                let Some(unbound) = self.graph.unbind(element_id) else { continue };
                debug!(path = %path, dependents = unbound.dependents.len(), "unbound");
                changes.unbound += 1;
                changes.dirty.extend(unbound.dependents);
                changes.dirty.extend(unbound.element.resolved_targets().map(|(_, target)| target));
                changes.names.insert(unbound.element.lookup_name().to_string());
                if let Some(function) = unbound.element.kind.function() {
                    changes.families.insert(function.function_name.clone());
                }
            }
        }
        kept
    }

    fn bind_parsed(
        &mut self,
        parsed: &BTreeMap<String, (Arc<str>, Arc<Vec<UnboundElement>>)>,
        kept: &HashMap<String, ElementId>,
        changes: &mut BatchChanges,
    ) -> std::result::Result<(), CompilationError> {
        for (source, (_, elements)) in parsed {
            for unbound in elements.iter() {
                let element = unbound.clone().into_element(source);
                if let Some(id) = kept.get(&element.path) {
                    self.graph.refresh(*id, element);
                    changes.refreshed += 1;
                    continue;
                }

                let name = element.lookup_name().to_string();
                let family = element.kind.function().map(|f| f.function_name.clone());
                let id = self.graph.bind(element)?;
                changes.bound.push(id);
                changes.names.insert(name);
                if let Some(family) = family {
                    changes.families.insert(family);
                }
            }
            self.sources.set_state(source, SourceState::Bound);
        }
        Ok(())
    }

    /// A name that appeared or disappeared may change what existing
    /// unqualified references resolve to, through shadowing or ambiguity.
    fn reset_by_name(&mut self, changes: &mut BatchChanges) {
        for name in &changes.names {
            for owner in self.graph.referencing_name(name) {
                self.graph.clear_slots(owner, |kind| !matches!(kind, SlotKind::Call { .. }));
                changes.dirty.insert(owner);
            }
        }
    }

    /// Resolve every open declared slot of `ids`, then refresh the access
    /// level cache and generalization edges that depend on them.
    fn resolve(&mut self, ids: &BTreeSet<ElementId>) -> std::result::Result<(), CompilationError> {
        let ordered = in_path_order(&self.graph, ids);
        let mut resolved: Vec<(ElementId, SlotId, ElementId)> = Vec::new();
        {
            let types = self.type_system();
            for id in &ordered {
                let Some(element) = self.graph.get(*id) else { continue };
                for (slot, reference) in element.slots.iter().enumerate() {
                    if reference.resolved.is_some() || matches!(reference.kind, SlotKind::Call { .. }) {
                        continue;
                    }
                    if let Some(target) = types.resolve_slot(element, slot)? {
                        resolved.push((*id, slot, target));
                    }
                }
            }
        }

        for (owner, slot, target) in resolved {
            self.graph.resolve_slot(owner, slot, Some(target));
        }
        for id in ordered {
            self.graph.recompute_access(id);
            let supertypes = self.graph.get(id).map(declared_supertypes).unwrap_or_default();
            self.graph.set_supertypes(id, &supertypes);
        }
        Ok(())
    }

    fn validate(&self, worklist: &[ElementId]) -> std::result::Result<Vec<CallResolution>, CompilationError> {
        let types = self.type_system();
        let visibility = VisibilityEngine::new(&self.graph, &self.repositories);
        let mut calls = Vec::new();
        for id in worklist {
            calls.extend(types.validate_element(*id, &visibility)?);
        }
        check_externalizable_names(&self.graph)?;
        Ok(calls)
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    /// Type system over the current graph. Memo tables are fresh per call.
    pub fn type_system(&self) -> TypeSystem<'_> {
        TypeSystem::new(&self.graph).with_max_suggestions(self.config.compiler.max_suggestions)
    }

    pub fn repositories(&self) -> &RepositorySet {
        &self.repositories
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn get_element(&self, path: &str) -> Option<&PackageableElement> {
        self.graph.lookup_element(path)
    }

    /// A function by signature id (`a::f_String_1__Boolean_1_`) or by its
    /// rendered signature (`a::f(String[1]):Boolean[1]`).
    pub fn get_function(&self, signature: &str) -> Option<&PackageableElement> {
        if let Some(element) = self.graph.lookup_element(signature).filter(|e| e.is_function()) {
            return Some(element);
        }
        let name = signature.split('(').next()?.rsplit("::").next()?;
        self.graph
            .functions_named(name)
            .into_iter()
            .filter_map(|id| self.graph.get(id))
            .find(|f| f.signature() == signature)
    }

    pub fn source_state(&self, id: &str) -> Option<SourceState> {
        self.sources.state(id)
    }

    pub fn has_pending(&self) -> bool {
        self.sources.has_pending()
    }

    /// Linearized generalization order of a type, as paths.
    pub fn generalization_order(&self, path: &str) -> Result<Vec<String>> {
        let id = self.graph.lookup(path).ok_or_else(|| {
            CompilationError::at(ErrorKind::ReferenceNotFound { name: path.to_string() }, "", Span::default())
        })?;
        let order = self.type_system().linearize(id)?;
        Ok(order.iter().map(|a| self.graph.path_of(a.id).to_string()).collect())
    }

    pub fn serialize(&self) -> Result<String> {
        Ok(self.graph.serialize()?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Same reference slots, in order, so resolutions carry over one to one.
fn same_references(bound: &[ReferenceSlot], parsed: &[ReferenceSlot]) -> bool {
    bound.len() == parsed.len() && bound.iter().zip(parsed).all(|(a, b)| a.kind == b.kind && a.text == b.text)
}

/// Generalization targets of a class or primitive, as resolved so far.
fn declared_supertypes(element: &PackageableElement) -> Vec<ElementId> {
    let declared: Vec<&TypeExpr> = match &element.kind {
        ElementKind::Class(decl) => decl.generalizations.iter().collect(),
        ElementKind::PrimitiveType(decl) => decl.supertype.iter().collect(),
        _ => Vec::new(),
    };
    declared
        .into_iter()
        .filter_map(|ty| ty.slot())
        .filter_map(|slot| element.slot(slot).and_then(|s| s.resolved))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> IncrementalCompiler {
        IncrementalCompiler::new(CompilerConfig::default()).unwrap()
    }

    #[test]
    fn test_platform_is_compiled_and_immutable() {
        let mut compiler = compiler();
        assert_eq!(compiler.source_state(PLATFORM_SOURCE_ID), Some(SourceState::Validated));
        assert!(compiler.get_element("meta::pure::metamodel::type::String").is_some());
        assert!(compiler.modify(PLATFORM_SOURCE_ID, "").is_err());
        assert!(compiler.delete(PLATFORM_SOURCE_ID).is_err());
    }

    #[test]
    fn test_unchanged_elements_keep_their_identity() {
        let mut compiler = compiler();
        compiler
            .create_in_memory_and_compile(&[("/a.pure", "Class a::A {}\nClass a::B { x: String[1]; }\n")])
            .unwrap();
        let a = compiler.graph().lookup("a::A").unwrap();

        compiler.modify("/a.pure", "\n\nClass a::A {}\nClass a::B { x: Integer[1]; }\n").unwrap();
        let report = compiler.compile().unwrap();
        assert_eq!(report.refreshed, 1);
        assert_eq!(report.bound, 1);
        assert_eq!(report.unbound, 1);
        assert_eq!(compiler.graph().lookup("a::A"), Some(a));
        assert_eq!(compiler.get_element("a::A").unwrap().span.start_line, 3);
    }

    #[test]
    fn test_failed_compile_rolls_back() {
        let mut compiler = compiler();
        compiler.create_in_memory_and_compile(&[("/a.pure", "Class a::A {}\n")]).unwrap();
        let before = compiler.serialize().unwrap();

        compiler.modify("/a.pure", "Class a::A { b: a::Missing[1]; }\n").unwrap();
        let error = compiler.compile().unwrap_err();
        assert_eq!(error.as_compilation().unwrap().message(), "a::Missing has not been defined!");
        assert_eq!(compiler.source_state("/a.pure"), Some(SourceState::Failed));
        assert_eq!(compiler.serialize().unwrap(), before);
        assert!(compiler.has_pending());
    }

    #[test]
    fn test_parser_error_leaves_graph_untouched() {
        let mut compiler = compiler();
        compiler.create_in_memory_and_compile(&[("/a.pure", "Class a::A {}\n")]).unwrap();
        compiler.create_source("/b.pure", "Class a::B {\n  x String[1];\n}\n").unwrap();
        let error = compiler.compile().unwrap_err();
        assert!(matches!(error, PureError::Parser(_)));
        assert!(compiler.get_element("a::B").is_none());
        assert_eq!(compiler.source_state("/a.pure"), Some(SourceState::Validated));
    }

    #[test]
    fn test_get_function_by_signature() {
        let mut compiler = compiler();
        compiler
            .create_in_memory_and_compile(&[("/f.pure", "function f::greet(name: String[1]): String[1] { $name }\n")])
            .unwrap();
        assert!(compiler.get_function("f::greet_String_1__String_1_").is_some());
        assert!(compiler.get_function("f::greet(String[1]):String[1]").is_some());
        assert!(compiler.get_function("f::greet(Integer[1]):String[1]").is_none());
    }

    #[test]
    fn test_parse_cache_hits_on_recreate() {
        let mut compiler = compiler();
        let text = "Class c::A {}\n";
        compiler.create_in_memory_and_compile(&[("/c.pure", text)]).unwrap();
        compiler.delete("/c.pure").unwrap();
        compiler.compile().unwrap();
        let hits = compiler.cache_stats().hits;
        compiler.create_in_memory_and_compile(&[("/c.pure", text)]).unwrap();
        assert_eq!(compiler.cache_stats().hits, hits + 1);
    }
}
