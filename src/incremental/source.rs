//! Source registry
//!
//! Tracks the committed text of every source, the edits staged since the
//! last successful compile, and each source's compile state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::PureError;

/// Content hash for change detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_content(content: &[u8]) -> Self {
        let hash = blake3::hash(content);
        Self(*hash.as_bytes())
    }

    pub fn from_str(content: &str) -> Self {
        Self::from_content(content.as_bytes())
    }

    /// Hash of several parts, each length-prefixed so boundaries matter.
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceState {
    Uncompiled,
    Parsed,
    Bound,
    Validated,
    Failed,
}

/// A committed source: the text of the last successful compile.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: String,
    pub text: Arc<str>,
    pub hash: ContentHash,
    /// Paths of the top-level elements this source produced.
    pub elements: Vec<String>,
    pub immutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingChange {
    Upsert(Arc<str>),
    Delete,
}

#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    committed: BTreeMap<String, Source>,
    pending: BTreeMap<String, PendingChange>,
    states: BTreeMap<String, SourceState>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the source exists once pending edits are applied.
    pub fn exists(&self, id: &str) -> bool {
        match self.pending.get(id) {
            Some(PendingChange::Upsert(_)) => true,
            Some(PendingChange::Delete) => false,
            None => self.committed.contains_key(id),
        }
    }

    pub fn create(&mut self, id: &str, text: &str) -> Result<(), PureError> {
        if self.exists(id) {
            return Err(PureError::source_error(id, "already exists"));
        }
        if !id.starts_with('/') {
            return Err(PureError::source_error(id, "source ids must start with '/'"));
        }
        self.stage(id, PendingChange::Upsert(Arc::from(text)));
        Ok(())
    }

    pub fn modify(&mut self, id: &str, text: &str) -> Result<(), PureError> {
        self.check_mutable(id)?;
        let unchanged = self.pending.get(id).is_none()
            && self.committed.get(id).map_or(false, |s| &*s.text == text);
        if !unchanged {
            self.stage(id, PendingChange::Upsert(Arc::from(text)));
        }
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<(), PureError> {
        self.check_mutable(id)?;
        if self.committed.contains_key(id) {
            // The committed elements stay bound until a compile removes them.
            self.pending.insert(id.to_string(), PendingChange::Delete);
            self.states.insert(id.to_string(), SourceState::Validated);
        } else {
            // Never compiled: just forget the staged text.
            self.pending.remove(id);
            self.states.remove(id);
        }
        Ok(())
    }

    /// Register a built-in source that callers may not edit.
    pub fn create_immutable(&mut self, id: &str, text: &str) -> Result<(), PureError> {
        self.create(id, text)?;
        self.committed.insert(
            id.to_string(),
            Source {
                id: id.to_string(),
                text: Arc::from(""),
                hash: ContentHash::from_str(""),
                elements: Vec::new(),
                immutable: true,
            },
        );
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Staged edits in source id order.
    pub fn pending(&self) -> Vec<(String, PendingChange)> {
        self.pending.iter().map(|(id, c)| (id.clone(), c.clone())).collect()
    }

    pub fn committed(&self, id: &str) -> Option<&Source> {
        self.committed.get(id)
    }

    pub fn state(&self, id: &str) -> Option<SourceState> {
        self.states.get(id).copied()
    }

    pub fn set_state(&mut self, id: &str, state: SourceState) {
        self.states.insert(id.to_string(), state);
    }

    /// Apply the outcome of a successful compile.
    pub fn commit(&mut self, id: &str, text: Arc<str>, elements: Vec<String>) {
        let immutable = self.committed.get(id).map_or(false, |s| s.immutable);
        let hash = ContentHash::from_str(&text);
        self.committed.insert(
            id.to_string(),
            Source { id: id.to_string(), text, hash, elements, immutable },
        );
        self.pending.remove(id);
        self.states.insert(id.to_string(), SourceState::Validated);
    }

    pub fn commit_delete(&mut self, id: &str) {
        self.committed.remove(id);
        self.pending.remove(id);
        self.states.remove(id);
    }

    fn stage(&mut self, id: &str, change: PendingChange) {
        self.pending.insert(id.to_string(), change);
        self.states.insert(id.to_string(), SourceState::Uncompiled);
    }

    fn check_mutable(&self, id: &str) -> Result<(), PureError> {
        if !self.exists(id) {
            return Err(PureError::source_error(id, "does not exist"));
        }
        if self.committed.get(id).map_or(false, |s| s.immutable) {
            return Err(PureError::source_error(id, "is immutable"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash() {
        let hash1 = ContentHash::from_str("Class a::A {}");
        let hash2 = ContentHash::from_str("Class a::A {}");
        let hash3 = ContentHash::from_str("Class a::B {}");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_ne!(ContentHash::from_parts(["ab", "c"]), ContentHash::from_parts(["a", "bc"]));
    }

    #[test]
    fn test_staging_lifecycle() {
        let mut registry = SourceRegistry::new();
        registry.create("/a.pure", "x").unwrap();
        assert!(registry.create("/a.pure", "y").is_err());
        assert_eq!(registry.state("/a.pure"), Some(SourceState::Uncompiled));

        registry.commit("/a.pure", Arc::from("x"), vec!["a::A".into()]);
        assert!(!registry.has_pending());
        assert_eq!(registry.state("/a.pure"), Some(SourceState::Validated));

        registry.delete("/a.pure").unwrap();
        assert!(!registry.exists("/a.pure"));
        assert_eq!(registry.pending(), vec![("/a.pure".to_string(), PendingChange::Delete)]);
        assert_eq!(registry.state("/a.pure"), Some(SourceState::Validated));

        registry.create("/a.pure", "x").unwrap();
        assert!(registry.exists("/a.pure"));
    }

    #[test]
    fn test_unchanged_modify_is_not_staged() {
        let mut registry = SourceRegistry::new();
        registry.create("/a.pure", "x").unwrap();
        registry.commit("/a.pure", Arc::from("x"), vec![]);
        registry.modify("/a.pure", "x").unwrap();
        assert!(!registry.has_pending());
    }

    #[test]
    fn test_immutable_sources_reject_edits() {
        let mut registry = SourceRegistry::new();
        registry.create_immutable("/platform/m3.pure", "x").unwrap();
        assert!(registry.modify("/platform/m3.pure", "y").is_err());
        assert!(registry.delete("/platform/m3.pure").is_err());
    }

    #[test]
    fn test_missing_source_errors() {
        let mut registry = SourceRegistry::new();
        assert!(registry.modify("/nope.pure", "x").is_err());
        assert!(registry.delete("/nope.pure").is_err());
        assert!(registry.create("relative.pure", "x").is_err());
    }
}
