//! Reverse reference index
//!
//! For every target element the index records who points at it, so that
//! removing a target can reset exactly the dependent slots.

use serde::Serialize;
use std::collections::HashMap;

use crate::core::{ElementId, SlotId, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceUsage {
    pub owner: ElementId,
    pub slot: SlotId,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct UsageIndex {
    incoming: HashMap<ElementId, Vec<ReferenceUsage>>,
    outgoing: HashMap<ElementId, Vec<(SlotId, ElementId)>>,
}

impl UsageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, target: ElementId, usage: ReferenceUsage) {
        self.incoming.entry(target).or_default().push(usage);
        self.outgoing.entry(usage.owner).or_default().push((usage.slot, target));
    }

    /// Drop the usage recorded for one slot of `owner`, if any.
    pub fn remove_slot(&mut self, owner: ElementId, slot: SlotId) {
        let Some(out) = self.outgoing.get_mut(&owner) else { return };
        let mut targets = Vec::new();
        out.retain(|(s, t)| {
            if *s == slot {
                targets.push(*t);
                false
            } else {
                true
            }
        });
        if out.is_empty() {
            self.outgoing.remove(&owner);
        }
        for target in targets {
            self.detach(target, owner, Some(slot));
        }
    }

    /// Drop every usage owned by `owner`.
    pub fn remove_outgoing(&mut self, owner: ElementId) {
        let Some(out) = self.outgoing.remove(&owner) else { return };
        for (_, target) in out {
            self.detach(target, owner, None);
        }
    }

    /// Remove and return every usage pointing at `target`.
    pub fn take_incoming(&mut self, target: ElementId) -> Vec<ReferenceUsage> {
        let usages = self.incoming.remove(&target).unwrap_or_default();
        for usage in &usages {
            if let Some(out) = self.outgoing.get_mut(&usage.owner) {
                out.retain(|(s, t)| !(*s == usage.slot && *t == target));
                if out.is_empty() {
                    self.outgoing.remove(&usage.owner);
                }
            }
        }
        usages
    }

    pub fn usages_of(&self, target: ElementId) -> &[ReferenceUsage] {
        self.incoming.get(&target).map_or(&[], |v| v.as_slice())
    }

    pub fn targets_of(&self, owner: ElementId) -> impl Iterator<Item = (SlotId, ElementId)> + '_ {
        self.outgoing.get(&owner).into_iter().flatten().copied()
    }

    /// Rewrite the recorded spans of `owner`'s usages after its text moved.
    pub fn refresh_spans(&mut self, owner: ElementId, spans: &[Span]) {
        let Some(out) = self.outgoing.get(&owner) else { return };
        for (slot, target) in out {
            if let (Some(list), Some(span)) = (self.incoming.get_mut(target), spans.get(*slot)) {
                for usage in list.iter_mut().filter(|u| u.owner == owner && u.slot == *slot) {
                    usage.span = *span;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.incoming.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.incoming.is_empty()
    }

    fn detach(&mut self, target: ElementId, owner: ElementId, slot: Option<SlotId>) {
        if let Some(list) = self.incoming.get_mut(&target) {
            list.retain(|u| !(u.owner == owner && slot.map_or(true, |s| s == u.slot)));
            if list.is_empty() {
                self.incoming.remove(&target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(owner: u32, slot: SlotId) -> ReferenceUsage {
        ReferenceUsage { owner: ElementId(owner), slot, span: Span::new(1, 1, 1, 1) }
    }

    #[test]
    fn test_record_and_take() {
        let mut index = UsageIndex::new();
        index.record(ElementId(1), usage(2, 0));
        index.record(ElementId(1), usage(3, 4));
        index.record(ElementId(5), usage(2, 1));

        assert_eq!(index.usages_of(ElementId(1)).len(), 2);
        let taken = index.take_incoming(ElementId(1));
        assert_eq!(taken.len(), 2);
        assert!(index.usages_of(ElementId(1)).is_empty());
        assert_eq!(index.targets_of(ElementId(2)).collect::<Vec<_>>(), vec![(1, ElementId(5))]);
        assert_eq!(index.targets_of(ElementId(3)).count(), 0);
    }

    #[test]
    fn test_remove_outgoing() {
        let mut index = UsageIndex::new();
        index.record(ElementId(1), usage(2, 0));
        index.record(ElementId(1), usage(3, 0));
        index.remove_outgoing(ElementId(2));
        let remaining = index.usages_of(ElementId(1));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].owner, ElementId(3));
    }

    #[test]
    fn test_remove_slot_and_refresh() {
        let mut index = UsageIndex::new();
        index.record(ElementId(1), usage(2, 0));
        index.record(ElementId(1), usage(2, 1));
        index.remove_slot(ElementId(2), 0);
        assert_eq!(index.len(), 1);

        index.refresh_spans(ElementId(2), &[Span::default(), Span::new(9, 2, 9, 4)]);
        assert_eq!(index.usages_of(ElementId(1))[0].span, Span::new(9, 2, 9, 4));
    }
}
