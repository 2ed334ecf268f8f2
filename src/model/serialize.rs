//! Deterministic dump of the model graph
//!
//! Arena ids depend on edit history, so the dump refers to elements by path
//! and sorts everything. Two graphs holding the same declarations produce
//! byte-identical output.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::Span;
use crate::visibility::AccessLevel;

use super::element::{Annotations, ElementKind, SlotKind};
use super::graph::ModelGraph;

#[derive(Serialize)]
struct GraphSnapshot<'a> {
    elements: BTreeMap<&'a str, ElementSnapshot<'a>>,
}

#[derive(Serialize)]
struct ElementSnapshot<'a> {
    source: &'a str,
    span: Span,
    name_span: Span,
    access: Option<AccessLevel>,
    imports: &'a [String],
    annotations: &'a Annotations,
    #[serde(flatten)]
    kind: &'a ElementKind,
    slots: Vec<SlotSnapshot<'a>>,
    supertypes: Vec<&'a str>,
    referenced_by: Vec<UsageSnapshot<'a>>,
}

#[derive(Serialize)]
struct SlotSnapshot<'a> {
    kind: SlotKind,
    text: &'a str,
    span: Span,
    target: Option<&'a str>,
}

#[derive(Serialize, PartialEq, Eq, PartialOrd, Ord)]
struct UsageSnapshot<'a> {
    owner: &'a str,
    slot: usize,
    span: Span,
}

impl ModelGraph {
    /// Serialize the graph as pretty-printed JSON with a stable ordering.
    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        let mut elements = BTreeMap::new();

        for (id, element) in self.iter() {
            let slots = element
                .slots
                .iter()
                .map(|slot| SlotSnapshot {
                    kind: slot.kind,
                    text: &slot.text,
                    span: slot.span,
                    target: slot.resolved.map(|t| self.path_of(t)),
                })
                .collect();

            let supertypes = self
                .generalizations()
                .direct_supertypes(id)
                .into_iter()
                .map(|t| self.path_of(t))
                .collect();

            let mut referenced_by: Vec<_> = self
                .usages_of(id)
                .iter()
                .map(|u| UsageSnapshot { owner: self.path_of(u.owner), slot: u.slot, span: u.span })
                .collect();
            referenced_by.sort();

            elements.insert(
                element.path.as_str(),
                ElementSnapshot {
                    source: &element.source,
                    span: element.span,
                    name_span: element.name_span,
                    access: element.access,
                    imports: element.imports.as_slice(),
                    annotations: &element.annotations,
                    kind: &element.kind,
                    slots,
                    supertypes,
                    referenced_by,
                },
            );
        }

        serde_json::to_string_pretty(&GraphSnapshot { elements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph_serializes_root_package() {
        let graph = ModelGraph::new();
        let json = graph.serialize().unwrap();
        assert!(json.contains("\"::\""));
        assert!(json.contains("\"type\": \"Package\""));
    }
}
