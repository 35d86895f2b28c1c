use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use anyhow::{Result, anyhow, bail};

use crate::config::LanguageConfig;

/// A resolved language profile
///
/// Holds everything the sandbox needs to materialize, compile and run a
/// submission written in one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    pub name: String,
    /// Name of the source file inside the workspace
    pub file_name: String,
    /// Compile command template, `None` for interpreted languages
    pub compile: Option<Vec<String>>,
    /// Run command template
    pub run: Vec<String>,
    /// Name of the compiled artifact inside the workspace
    pub executable: String,
}

impl LanguageProfile {
    pub fn requires_compilation(&self) -> bool {
        self.compile.is_some()
    }
}

/// Read-only lookup table from language identifiers to profiles
#[derive(Debug, Default)]
pub struct LanguageRegistry {
    profiles: Vec<LanguageProfile>,
    /// Lowercased name or alias -> index into `profiles`
    index: HashMap<String, usize>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<LanguageRegistry>> = OnceLock::new();

impl LanguageRegistry {
    /// Builds a registry, rejecting malformed or conflicting entries
    pub fn from_configs(configs: Vec<LanguageConfig>) -> Result<Self> {
        let mut registry = Self::default();

        for config in configs {
            validate(&config)?;

            let idx = registry.profiles.len();
            for key in std::iter::once(&config.name).chain(config.aliases.iter()) {
                let key = key.trim().to_lowercase();
                if registry.index.insert(key.clone(), idx).is_some() {
                    bail!("Language identifier `{key}` is declared more than once");
                }
            }

            registry.profiles.push(LanguageProfile {
                name: config.name,
                file_name: config.file_name,
                compile: config.compile,
                run: config.run,
                executable: config.executable,
            });
        }

        Ok(registry)
    }

    pub fn builtin() -> Self {
        // The built-in table is static and known to be valid
        Self::from_configs(LanguageConfig::builtin()).unwrap_or_default()
    }

    /// Looks up a language by name or alias, ignoring case
    pub fn resolve(&self, language: &str) -> Option<&LanguageProfile> {
        self.index
            .get(&language.trim().to_lowercase())
            .map(|&idx| &self.profiles[idx])
    }

    /// Canonical names of all supported languages
    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Installs the process-wide registry; fails if one is already installed
    pub fn install_global(self) -> Result<Arc<Self>> {
        let registry = Arc::new(self);
        GLOBAL_REGISTRY
            .set(registry.clone())
            .map_err(|_| anyhow!("The global language registry is already installed"))?;
        Ok(registry)
    }

    /// The process-wide registry, the built-in one unless another was installed first
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(Self::builtin()))
            .clone()
    }
}

fn validate(config: &LanguageConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        bail!("Language name must not be empty");
    }
    if config.aliases.iter().any(|a| a.trim().is_empty()) {
        bail!("Language `{}` has an empty alias", config.name);
    }
    if config.run.is_empty() {
        bail!("Language `{}` has an empty run command", config.name);
    }
    if config.compile.as_ref().is_some_and(|c| c.is_empty()) {
        bail!("Language `{}` has an empty compile command", config.name);
    }
    for file in [&config.file_name, &config.executable] {
        if file.is_empty() || file.contains(['/', '\\']) || file == "." || file == ".." {
            bail!(
                "Language `{}` uses invalid workspace file name `{file}`",
                config.name
            );
        }
    }
    Ok(())
}
