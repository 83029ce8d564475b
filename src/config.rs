use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{clog_debug, Error, Result};

/// What the planner does when leveling cannot schedule every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Log the cycle and keep the groups computed so far.
    #[default]
    Truncate,
    /// Fail plan construction with `Error::CyclicDependency`.
    Reject,
}

/// How a failed post-execution verification is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerifyPolicy {
    /// Log the failure and still report the plan result.
    #[default]
    Log,
    /// Replace the plan result with a `VERIFICATION_FAILED` result.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerSettings {
    #[serde(default = "default_true")]
    pub use_llm: bool,
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            use_llm: true,
            cycle_policy: CyclePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorSettings {
    #[serde(default = "default_author")]
    pub author_id: String,
    #[serde(default)]
    pub verify_policy: VerifyPolicy,
    #[serde(default = "default_true")]
    pub mirror_progress: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            author_id: default_author(),
            verify_policy: VerifyPolicy::default(),
            mirror_progress: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_author() -> String {
    "orchestrator".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub planner: PlannerSettings,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
}

impl Config {
    pub fn conductor_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".conductor"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::conductor_dir()?.join("conductor.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        clog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            clog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        clog_debug!(
            "Config loaded: use_llm={}, cycle_policy={:?}, verify_policy={:?}",
            config.planner.use_llm,
            config.planner.cycle_policy,
            config.orchestrator.verify_policy
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        clog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}
