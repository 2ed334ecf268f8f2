use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "pure.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub compiler: CompilerOptions,

    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Validate every element on each compile instead of the affected set.
    #[serde(default = "default_false")]
    pub full_validation: bool,

    #[serde(default = "default_cache_size")]
    pub parse_cache_size: usize,

    #[serde(default = "default_platform")]
    pub platform_repository: String,

    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

/// One code repository: the packages it may define and the repositories
/// its sources may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,

    pub pattern: String,

    #[serde(default)]
    pub visible: Vec<String>,
}

impl RepositoryConfig {
    pub fn new(name: &str, pattern: &str, visible: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            visible: visible.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            compiler: CompilerOptions::default(),
            repositories: Vec::new(),
        }
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            full_validation: false,
            parse_cache_size: 256,
            platform_repository: default_platform(),
            max_suggestions: 3,
        }
    }
}

fn default_false() -> bool { false }
fn default_cache_size() -> usize { 256 }
fn default_platform() -> String { "platform".to_string() }
fn default_max_suggestions() -> usize { 3 }

impl CompilerConfig {
    /// Load configuration from a `pure.toml` file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Find and load `pure.toml` from the given directory or its parents
    pub fn discover(start: &Path) -> Self {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                if let Ok(config) = Self::load(&config_path) {
                    return config;
                }
            }

            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    pub fn with_repository(mut self, repository: RepositoryConfig) -> Self {
        self.repositories.push(repository);
        self
    }

    pub fn with_full_validation(mut self, enabled: bool) -> Self {
        self.compiler.full_validation = enabled;
        self
    }

    /// Check names are unique and visibility lists name known repositories.
    pub fn validate(&self) -> Result<(), String> {
        let mut names = std::collections::BTreeSet::new();
        names.insert(self.compiler.platform_repository.as_str());

        for repo in &self.repositories {
            if repo.name.is_empty() || repo.name.contains('/') {
                return Err(format!("Invalid repository name '{}'", repo.name));
            }
            if !names.insert(repo.name.as_str()) && repo.name != self.compiler.platform_repository {
                return Err(format!("Repository '{}' is declared more than once", repo.name));
            }
        }

        for repo in &self.repositories {
            if let Some(unknown) = repo.visible.iter().find(|v| !names.contains(v.as_str())) {
                return Err(format!(
                    "Repository '{}' declares unknown visible repository '{}'",
                    repo.name, unknown
                ));
            }
        }

        if self.compiler.parse_cache_size == 0 {
            return Err("parse_cache_size must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        let example = Self::default()
            .with_repository(RepositoryConfig::new("model", "model::*", &[]));
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(!config.compiler.full_validation);
        assert_eq!(config.compiler.platform_repository, "platform");
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[compiler]
full_validation = true
parse_cache_size = 16

[[repositories]]
name = "model_legacy"
pattern = "model_legacy::*"

[[repositories]]
name = "model"
pattern = "model::*"
visible = ["model_legacy"]
"#;

        let config = CompilerConfig::parse(toml).unwrap();
        assert!(config.compiler.full_validation);
        assert_eq!(config.compiler.parse_cache_size, 16);
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[1].visible, vec!["model_legacy".to_string()]);
    }

    #[test]
    fn test_unknown_visible_repository_is_rejected() {
        let toml = r#"
[[repositories]]
name = "model"
pattern = "model::*"
visible = ["nowhere"]
"#;
        let error = CompilerConfig::parse(toml).unwrap_err();
        assert!(error.contains("unknown visible repository 'nowhere'"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = CompilerConfig::default()
            .with_repository(RepositoryConfig::new("model", "model::*", &["platform"]));
        config.save(&path).unwrap();

        let loaded = CompilerConfig::load(&path).unwrap();
        assert_eq!(loaded.repositories, config.repositories);

        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        let discovered = CompilerConfig::discover(&nested);
        assert_eq!(discovered.repositories.len(), 1);
    }

    #[test]
    fn test_generate_default_parses() {
        let text = CompilerConfig::generate_default();
        let config = CompilerConfig::parse(&text).unwrap();
        assert_eq!(config.repositories[0].name, "model");
    }
}
