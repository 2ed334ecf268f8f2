//! Invalidation
//!
//! Every element that references a changed element, directly or through a
//! chain of references, is validated again.

use std::collections::BTreeSet;

use crate::core::ElementId;
use crate::model::ModelGraph;

/// Seeds plus every element transitively referencing one of them.
pub fn invalidate(graph: &ModelGraph, changed: impl IntoIterator<Item = ElementId>) -> BTreeSet<ElementId> {
    let mut invalid = BTreeSet::new();
    let mut worklist: Vec<ElementId> = changed.into_iter().collect();

    while let Some(id) = worklist.pop() {
        if !graph.contains(id) || !invalid.insert(id) {
            continue;
        }
        worklist.extend(graph.usages_of(id).iter().map(|u| u.owner));
    }

    invalid
}

/// Worklist in path order, so the first error reported does not depend on
/// arena ids.
pub fn in_path_order(graph: &ModelGraph, ids: &BTreeSet<ElementId>) -> Vec<ElementId> {
    let mut ordered: Vec<ElementId> = ids.iter().copied().collect();
    ordered.sort_by(|a, b| graph.path_of(*a).cmp(graph.path_of(*b)));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::CompilerConfig;
    use crate::incremental::IncrementalCompiler;

    #[test]
    fn test_invalidation_follows_reference_chains() {
        let mut compiler = IncrementalCompiler::new(CompilerConfig::default()).unwrap();
        compiler
            .create_in_memory_and_compile(&[(
                "/i.pure",
                "Class i::A {}\nClass i::B extends i::A {}\nClass i::C { b: i::B[1]; }\nClass i::D {}\n",
            )])
            .unwrap();
        let graph = compiler.graph();
        let a = graph.lookup("i::A").unwrap();

        let invalid = invalidate(graph, [a]);
        let paths: Vec<_> = in_path_order(graph, &invalid).into_iter().map(|id| graph.path_of(id)).collect();
        assert_eq!(paths, vec!["i::A", "i::B", "i::C"]);
    }
}
