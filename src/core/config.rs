//! # Configuration Module
//!
//! The optional `Pipeline.toml` project file. Every field has a default, so an
//! absent file (or an empty one) describes the stock findword layout.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::scenarios::{Scenario, default_scenarios, default_subject_candidates};

/// File name looked up in the project root when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Pipeline.toml";

/// The whole project configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub environment: EnvironmentConfig,
    pub tools: ToolsConfig,
    pub build: BuildSettings,
    pub test: TestSettings,
    pub package: PackageSettings,
    pub clean: CleanSettings,
}

impl ProjectConfig {
    /// Reads and parses a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` if given (it must exist), otherwise the default file in
    /// `project_root` if present, otherwise the built-in defaults.
    pub fn discover(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(&project_root.join(path)),
            None => {
                let default_path = project_root.join(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let lists = [
            ("tools.interpreter", &self.tools.interpreter),
            ("tools.build", &self.tools.build),
            ("tools.harness", &self.tools.harness),
        ];
        for (key, list) in lists {
            if list.is_empty() {
                anyhow::bail!("`{key}` must name at least one candidate");
            }
        }
        if let Some(scenario) = self.test.scenario.iter().find(|s| s.name.trim().is_empty()) {
            anyhow::bail!("scenario with args {:?} has an empty name", scenario.args);
        }
        Ok(())
    }
}

/// The isolated interpreter environment created by Setup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub dir: String,
    /// Dependency manifest installed into the environment when present.
    pub manifest: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            dir: "venv".to_string(),
            manifest: "requirements.txt.in".to_string(),
        }
    }
}

/// Candidate lists for every external tool, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub interpreter: Vec<String>,
    pub build: Vec<String>,
    pub harness: Vec<String>,
    pub compilers: Vec<String>,
    /// Upper bound for a single `--version` probe.
    pub probe_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            interpreter: strings(&["python3", "python"]),
            build: strings(&["cmake"]),
            harness: strings(&["ctest"]),
            compilers: strings(&["g++", "clang++", "cl"]),
            probe_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    /// Its presence switches Build to the preset path.
    pub preset_file: String,
    pub release_preset: String,
    pub debug_preset: String,
    /// Build directory used when there is no preset descriptor.
    pub dir: String,
    /// Extra arguments appended to every manual configure invocation.
    pub configure_args: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            preset_file: "CMakePresets.json".to_string(),
            release_preset: "default".to_string(),
            debug_preset: "debug".to_string(),
            dir: "build".to_string(),
            configure_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestSettings {
    /// Build-output directories searched for the harness, in order.
    pub dirs: Vec<String>,
    pub harness_args: Vec<String>,
    pub harness_timeout_secs: Option<u64>,
    /// Secondary integration script run with the resolved interpreter.
    pub integration_script: String,
    /// Runs the built-in scenario battery after the harness.
    pub scenarios: bool,
    /// Subject executable locations, in order.
    pub subjects: Vec<String>,
    /// When set, the scenario report is also written here as JSON.
    pub report: Option<String>,
    /// Replaces the default battery when non-empty.
    pub scenario: Vec<Scenario>,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            dirs: default_output_dirs(),
            harness_args: strings(&["--output-on-failure"]),
            harness_timeout_secs: None,
            integration_script: "tests/test_integration.py".to_string(),
            scenarios: true,
            subjects: default_subject_candidates(),
            report: None,
            scenario: Vec::new(),
        }
    }
}

impl TestSettings {
    /// The configured battery, or the built-in one.
    pub fn battery(&self) -> Vec<Scenario> {
        if self.scenario.is_empty() {
            default_scenarios()
        } else {
            self.scenario.clone()
        }
    }

    /// Subject candidates with `~` and environment variables expanded.
    pub fn expanded_subjects(&self) -> Vec<String> {
        self.subjects.iter().map(|s| expand(s)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageSettings {
    pub dirs: Vec<String>,
    pub target: String,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            dirs: default_output_dirs(),
            target: "package".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanSettings {
    /// Directories removed recursively.
    pub dirs: Vec<String>,
    /// File names or glob patterns, relative to the project root.
    pub files: Vec<String>,
}

impl Default for CleanSettings {
    fn default() -> Self {
        Self {
            dirs: strings(&["build", "venv"]),
            files: strings(&["permutated_words.txt", "*.exe", "findword"]),
        }
    }
}

fn default_output_dirs() -> Vec<String> {
    strings(&["build/default", "build/release", "build"])
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Expands `~` and `$VARS`, leaving the input untouched if expansion fails.
pub fn expand(raw: &str) -> String {
    shellexpand::full(raw)
        .map(|expanded| expanded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
