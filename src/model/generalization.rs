//! Generalization multigraph
//!
//! Edges run from a type to each of its direct supertypes, weighted by the
//! declaration position. Type-argument bindings stay on the declaring
//! element; the graph only answers reachability questions.

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::ElementId;

#[derive(Debug, Clone, Default)]
pub struct GeneralizationGraph {
    graph: StableDiGraph<ElementId, usize>,
    nodes: HashMap<ElementId, NodeIndex>,
}

impl GeneralizationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the direct supertypes of `id`, in declaration order.
    pub fn set_supertypes(&mut self, id: ElementId, supertypes: &[ElementId]) {
        let node = self.ensure_node(id);
        let stale: Vec<_> = self.graph.edges_directed(node, Direction::Outgoing).map(|e| e.id()).collect();
        for edge in stale {
            self.graph.remove_edge(edge);
        }
        for (position, supertype) in supertypes.iter().enumerate() {
            let target = self.ensure_node(*supertype);
            self.graph.add_edge(node, target, position);
        }
    }

    pub fn remove(&mut self, id: ElementId) {
        if let Some(node) = self.nodes.remove(&id) {
            self.graph.remove_node(node);
        }
    }

    pub fn direct_supertypes(&self, id: ElementId) -> Vec<ElementId> {
        let Some(&node) = self.nodes.get(&id) else { return Vec::new() };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (*e.weight(), self.graph[e.target()]))
            .collect();
        edges.sort();
        edges.into_iter().map(|(_, id)| id).collect()
    }

    pub fn direct_subtypes(&self, id: ElementId) -> Vec<ElementId> {
        let Some(&node) = self.nodes.get(&id) else { return Vec::new() };
        let mut subtypes: Vec<_> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|n| self.graph[n])
            .collect();
        subtypes.sort();
        subtypes.dedup();
        subtypes
    }

    /// Every transitive subtype of `id`, excluding `id` itself.
    pub fn all_subtypes(&self, id: ElementId) -> HashSet<ElementId> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<_> = self.direct_subtypes(id).into();
        while let Some(next) = queue.pop_front() {
            if next != id && seen.insert(next) {
                queue.extend(self.direct_subtypes(next));
            }
        }
        seen
    }

    /// A path `id -> ... -> id` along supertype edges, if one exists.
    pub fn find_cycle(&self, id: ElementId) -> Option<Vec<ElementId>> {
        let start = *self.nodes.get(&id)?;
        let mut visited = HashSet::new();
        let mut path = vec![id];
        if self.cycle_from(start, start, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn cycle_from(&self, node: NodeIndex, start: NodeIndex, visited: &mut HashSet<NodeIndex>, path: &mut Vec<ElementId>) -> bool {
        for next in self.direct_supertypes(self.graph[node]) {
            let Some(&next_node) = self.nodes.get(&next) else { continue };
            path.push(next);
            if next_node == start {
                return true;
            }
            if visited.insert(next_node) && self.cycle_from(next_node, start, visited, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn ensure_node(&mut self, id: ElementId) -> NodeIndex {
        if let Some(&node) = self.nodes.get(&id) {
            return node;
        }
        let node = self.graph.add_node(id);
        self.nodes.insert(id, node);
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supertypes_keep_declaration_order() {
        let mut graph = GeneralizationGraph::new();
        graph.set_supertypes(ElementId(1), &[ElementId(3), ElementId(2)]);
        assert_eq!(graph.direct_supertypes(ElementId(1)), vec![ElementId(3), ElementId(2)]);

        graph.set_supertypes(ElementId(1), &[ElementId(2)]);
        assert_eq!(graph.direct_supertypes(ElementId(1)), vec![ElementId(2)]);
    }

    #[test]
    fn test_all_subtypes() {
        let mut graph = GeneralizationGraph::new();
        graph.set_supertypes(ElementId(2), &[ElementId(1)]);
        graph.set_supertypes(ElementId(3), &[ElementId(2)]);
        let subtypes = graph.all_subtypes(ElementId(1));
        assert!(subtypes.contains(&ElementId(2)));
        assert!(subtypes.contains(&ElementId(3)));
        assert_eq!(subtypes.len(), 2);
    }

    #[test]
    fn test_find_cycle() {
        let mut graph = GeneralizationGraph::new();
        graph.set_supertypes(ElementId(1), &[ElementId(2)]);
        assert!(graph.find_cycle(ElementId(1)).is_none());

        graph.set_supertypes(ElementId(2), &[ElementId(1)]);
        assert_eq!(graph.find_cycle(ElementId(1)), Some(vec![ElementId(1), ElementId(2), ElementId(1)]));
    }

    #[test]
    fn test_remove_drops_edges() {
        let mut graph = GeneralizationGraph::new();
        graph.set_supertypes(ElementId(2), &[ElementId(1)]);
        graph.remove(ElementId(1));
        assert!(graph.direct_supertypes(ElementId(2)).is_empty());
    }
}
