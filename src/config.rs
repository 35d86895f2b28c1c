use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::registry::LanguageRegistry;

#[derive(Parser, Debug)]
#[command(name = "oj-judge", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,

    /// Path to the evaluation request (JSON); reads stdin when omitted
    #[arg(long = "request", short = 'r')]
    pub request_path: Option<String>,

    /// Per-case time limit in milliseconds, overrides the configuration
    #[arg(long = "time-limit", short = 't')]
    pub time_limit_ms: Option<u64>,

    /// Pretty-print the evaluation result
    #[arg(long = "pretty", default_value_t = false)]
    pub pretty: bool,
}

impl CliArgs {
    /// Load the configuration from the specified file, the per-user config
    /// file, or fall back to the built-in languages
    pub fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config_path {
            Some(path) => Config::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    log::info!("Using configuration at {}", path.display());
                    Config::from_file(&path)?
                }
                None => Config::builtin(),
            },
        };

        if let Some(ms) = self.time_limit_ms {
            config.judge.time_limit = MicroSecond(ms * 1000);
        }
        Ok(config)
    }
}

/// Location of the per-user configuration file
pub fn default_config_path() -> Option<PathBuf> {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("", "", "oj-judge")?;
    Some(proj_dirs.config_dir().join("config.json"))
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub judge: JudgeConfig,
    pub languages: Vec<LanguageConfig>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Default limits with the built-in language profiles
    pub fn builtin() -> Self {
        Self {
            judge: JudgeConfig::default(),
            languages: LanguageConfig::builtin(),
        }
    }

    /// Builds the language registry described by this configuration
    pub fn registry(&self) -> Result<LanguageRegistry> {
        LanguageRegistry::from_configs(self.languages.clone())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct JudgeConfig {
    /// Wall-clock limit for a single test case
    #[serde(default = "JudgeConfig::default_time_limit")]
    pub time_limit: MicroSecond,
    /// Wall-clock limit for the compile step
    #[serde(default = "JudgeConfig::default_compile_time_limit")]
    pub compile_time_limit: MicroSecond,
    /// Parent directory of per-evaluation workspaces, system temp dir if unset
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
}

impl JudgeConfig {
    fn default_time_limit() -> MicroSecond {
        MicroSecond(2_000_000)
    }

    fn default_compile_time_limit() -> MicroSecond {
        MicroSecond(30_000_000)
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("oj-judge"))
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            time_limit: Self::default_time_limit(),
            compile_time_limit: Self::default_compile_time_limit(),
            workspace_root: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MicroSecond(pub u64);

impl From<MicroSecond> for Duration {
    fn from(value: MicroSecond) -> Self {
        Duration::from_micros(value.0)
    }
}

/// One language profile as written in the configuration file
///
/// Command templates are argument vectors; `%INPUT%`, `%OUTPUT%` and `%DIR%`
/// are replaced by the source path, the artifact path and the workspace
/// directory.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub file_name: String,
    #[serde(default)]
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
    #[serde(default = "LanguageConfig::default_executable")]
    pub executable: String,
}

impl LanguageConfig {
    fn default_executable() -> String {
        "main".to_string()
    }

    pub fn builtin() -> Vec<LanguageConfig> {
        let args = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        vec![
            LanguageConfig {
                name: "python".to_string(),
                aliases: args(&["py", "python3"]),
                file_name: "main.py".to_string(),
                compile: None,
                run: args(&["python3", "-B", "%INPUT%"]),
                executable: Self::default_executable(),
            },
            LanguageConfig {
                name: "c".to_string(),
                aliases: Vec::new(),
                file_name: "main.c".to_string(),
                compile: Some(args(&["gcc", "-O2", "-o", "%OUTPUT%", "%INPUT%", "-lm"])),
                run: args(&["%OUTPUT%"]),
                executable: Self::default_executable(),
            },
            LanguageConfig {
                name: "cpp".to_string(),
                aliases: args(&["c++", "cxx"]),
                file_name: "main.cpp".to_string(),
                compile: Some(args(&["g++", "-std=c++17", "-O2", "-o", "%OUTPUT%", "%INPUT%"])),
                run: args(&["%OUTPUT%"]),
                executable: Self::default_executable(),
            },
            LanguageConfig {
                name: "java".to_string(),
                aliases: Vec::new(),
                file_name: "Main.java".to_string(),
                compile: Some(args(&["javac", "-encoding", "UTF-8", "%INPUT%"])),
                run: args(&["java", "-cp", "%DIR%", "Main"]),
                executable: "Main.class".to_string(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("data/config.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();
        assert_eq!(config.judge.time_limit, MicroSecond(2_000_000));
        assert_eq!(config.languages[0].name, "python");
        assert!(config.languages[0].compile.is_none());
        assert_eq!(config.languages[2].run, vec!["%OUTPUT%".to_string()]);
    }

    #[test]
    fn test_judge_section_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "languages": [{ "name": "sh", "file_name": "main.sh", "run": ["sh", "%INPUT%"] }] }"#,
        )
        .unwrap();
        assert_eq!(config.judge.time_limit, MicroSecond(2_000_000));
        assert_eq!(config.judge.compile_time_limit, MicroSecond(30_000_000));
        assert_eq!(config.languages[0].executable, "main");
        assert!(config.languages[0].aliases.is_empty());
    }

    #[test]
    fn test_time_limit_override() {
        let cli = CliArgs::parse_from(["oj-judge", "-c", "data/config.json", "-t", "500"]);
        let config = cli.to_config().unwrap();
        assert_eq!(config.judge.time_limit, MicroSecond(500_000));
        assert_eq!(Duration::from(config.judge.time_limit), Duration::from_millis(500));
    }

    #[test]
    fn test_builtin_config_builds_registry() {
        let registry = Config::builtin().registry().unwrap();
        assert!(registry.resolve("python").is_some());
        assert!(registry.resolve("c++").is_some());
        assert!(registry.resolve("ruby").is_none());
    }
}
