use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use ubyte::{ByteUnit, ToByteUnit};
use validator::Validate;

#[derive(Debug, Clone, Default, Validate, Serialize, Deserialize)]
pub struct Config {
    #[validate]
    #[serde(default)]
    pub executor: Executor,

    #[validate]
    #[serde(default)]
    pub compiler: Compiler,
}

#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct Executor {
    pub workspace_root: PathBuf,

    pub uid: Option<u32>,
    pub gid: Option<u32>,

    pub output_limit: ByteUnit,
    pub stderr_excerpt: ByteUnit,

    #[validate(range(min = 1, max = 10))]
    pub wall_time_factor: u64,

    #[validate(range(max = 60000))]
    pub wall_time_extra: u64, // milliseconds

    pub limit_address_space: bool,

    #[validate(range(min = 1, max = 64))]
    pub max_workers: usize,

    pub cgroup_root: Option<PathBuf>,

    #[validate(range(min = 1, max = 4096))]
    pub max_pids: u32,
}

#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct Compiler {
    #[validate(range(min = 1000, max = 60000))]
    pub cpu_time: u64, // milliseconds

    pub memory: ByteUnit,
    pub log_limit: ByteUnit,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            workspace_root: env::temp_dir().join("judge-engine"),
            uid: None,
            gid: None,
            output_limit: 64.mebibytes(),
            stderr_excerpt: 4.kibibytes(),
            wall_time_factor: 2,
            wall_time_extra: 1000,
            limit_address_space: true,
            max_workers: 4,
            cgroup_root: None,
            max_pids: 64,
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            cpu_time: 10000,
            memory: 1.gibibytes(),
            log_limit: 16.kibibytes(),
        }
    }
}

impl Executor {
    /// Wall-clock allowance for a run with the given CPU limit.
    pub fn wall_time_limit(&self, cpu_time: u64) -> u64 {
        cpu_time
            .saturating_mul(self.wall_time_factor)
            .saturating_add(self.wall_time_extra)
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config> {
        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}
