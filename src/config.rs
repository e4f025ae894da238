use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::listener::SavePolicy;
use crate::store::DEFAULT_STORAGE_KEY;

#[derive(Parser, Debug)]
#[command(name = "inkmark")]
#[command(about = "Inspects and prunes persisted page highlights", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every page that has highlights
    Pages,
    /// Print the highlights stored for a page
    List { url: String },
    /// Delete every highlight of a page saved under an address
    Delete { url: String, address: String },
    /// Drop all highlights of a page
    Clear { url: String },
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".inkmark")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct App {
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub save_policy: SavePolicy,
}

impl Default for App {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            save_policy: SavePolicy::default(),
        }
    }
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    #[default]
    File,
    Libsql,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("highlights.json")
}

impl StorageSettings {
    /// Anchors a relative storage path at `data_dir`.
    pub fn rooted_at(&mut self, data_dir: &Path) {
        if self.path.is_relative() {
            self.path = data_dir.join(&self.path);
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub storage: StorageSettings,
}

impl Config {
    pub fn new(path: &Path) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    fn load_config(path: &Path) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::parse(&yaml_str)
    }

    fn parse(yaml_str: &str) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        if yaml_with_env.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            let Some(end) = result[actual_start..].find('}') else {
                break;
            };
            let var_name = &result[actual_start + 2..actual_start + end];

            // ${VAR:-default}
            let env_value = if let Some(default_start) = var_name.find(":-") {
                let actual_var = &var_name[..default_start];
                let default_val = &var_name[default_start + 2..];
                env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
            } else {
                env::var(var_name).unwrap_or_else(|_| {
                    tracing::warn!(var = %var_name, "environment variable not found");
                    String::new()
                })
            };

            result.replace_range(actual_start..actual_start + end + 1, &env_value);
            offset = actual_start + env_value.len();
        }

        Ok(result)
    }
}
