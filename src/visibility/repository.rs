//! Code repositories
//!
//! A source belongs to the repository named by the first segment of its id:
//! `/model/domain.pure` lives in `model`. Visibility between repositories is
//! declared explicitly and is neither symmetric nor transitive.

use glob::Pattern;
use std::collections::{BTreeMap, BTreeSet};

use crate::frontend::config::{CompilerConfig, RepositoryConfig};

#[derive(Debug, Clone)]
pub struct CodeRepository {
    pub name: String,
    pub pattern: Pattern,
    pub visible: BTreeSet<String>,
}

impl CodeRepository {
    pub fn new(config: &RepositoryConfig) -> Result<Self, String> {
        let pattern = Pattern::new(&config.pattern)
            .map_err(|e| format!("Invalid pattern '{}' for repository '{}': {}", config.pattern, config.name, e))?;
        Ok(Self {
            name: config.name.clone(),
            pattern,
            visible: config.visible.iter().cloned().collect(),
        })
    }

    /// Whether an element path belongs to this repository's packages.
    pub fn allows_path(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }
}

#[derive(Debug, Clone)]
pub struct RepositorySet {
    repositories: BTreeMap<String, CodeRepository>,
    platform: String,
}

impl RepositorySet {
    pub fn from_config(config: &CompilerConfig) -> Result<Self, String> {
        let platform = config.compiler.platform_repository.clone();
        let mut repositories = BTreeMap::new();
        repositories.insert(
            platform.clone(),
            CodeRepository::new(&RepositoryConfig::new(&platform, "meta::*", &[]))?,
        );

        for repo in &config.repositories {
            repositories.insert(repo.name.clone(), CodeRepository::new(repo)?);
        }

        Ok(Self { repositories, platform })
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn get(&self, name: &str) -> Option<&CodeRepository> {
        self.repositories.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.repositories.keys().map(String::as_str)
    }

    /// Repository owning a source id, if its first segment names one.
    pub fn repository_of(&self, source_id: &str) -> Option<&CodeRepository> {
        let trimmed = source_id.strip_prefix('/')?;
        let (first, _) = trimmed.split_once('/')?;
        self.repositories.get(first)
    }

    /// `to` is visible from `from` when they are the same repository, `to`
    /// is the platform, or `from` declares `to` visible. Sources outside
    /// any repository see, and are seen by, everything.
    pub fn is_visible(&self, from: Option<&str>, to: Option<&str>) -> bool {
        match (from, to) {
            (None, _) | (_, None) => true,
            (Some(from), Some(to)) => {
                from == to
                    || to == self.platform
                    || self.repositories.get(from).map_or(false, |r| r.visible.contains(to))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repositories() -> RepositorySet {
        let config = CompilerConfig::default()
            .with_repository(RepositoryConfig::new("model_legacy", "model_legacy::*", &[]))
            .with_repository(RepositoryConfig::new("model", "model::*", &["model_legacy"]));
        RepositorySet::from_config(&config).unwrap()
    }

    #[test]
    fn test_repository_of_source() {
        let repos = repositories();
        assert_eq!(repos.repository_of("/model/domain.pure").map(|r| r.name.as_str()), Some("model"));
        assert!(repos.repository_of("/scratch.pure").is_none());
        assert!(repos.repository_of("/unknown/x.pure").is_none());
    }

    #[test]
    fn test_visibility_is_directed() {
        let repos = repositories();
        assert!(repos.is_visible(Some("model"), Some("model_legacy")));
        assert!(!repos.is_visible(Some("model_legacy"), Some("model")));
        assert!(repos.is_visible(Some("model_legacy"), Some("platform")));
        assert!(repos.is_visible(None, Some("model")));
    }

    #[test]
    fn test_pattern_matching() {
        let repos = repositories();
        let model = repos.get("model").unwrap();
        assert!(model.allows_path("model::domain::Person"));
        assert!(!model.allows_path("model_legacy::Person"));
        assert!(repos.get("platform").unwrap().allows_path("meta::pure::metamodel::type::Any"));
    }
}
