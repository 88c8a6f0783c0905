//! Per-repository defaults read from `.git/gitrewrite/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use gitrewrite_git::{DEFAULT_MAX_DIFF_LENGTH, DEFAULT_MAX_MSG_LENGTH};
use serde::{Deserialize, Serialize};

use crate::batcher::DEFAULT_MAX_FILES_PER_COMMIT;
use crate::error::Result;
use crate::journal::DEFAULT_CHECKPOINT_INTERVAL;

/// gitrewrite configuration loaded from .git/gitrewrite/config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Message generator settings.
    #[serde(default)]
    pub ollama: OllamaConfig,
}

impl Config {
    const DIR: &'static str = "gitrewrite";
    const FILE: &'static str = "config.toml";

    /// Location of the config file inside a repository's git directory.
    #[must_use]
    pub fn path_in(git_dir: &Path) -> PathBuf {
        git_dir.join(Self::DIR).join(Self::FILE)
    }

    /// Read the file at `path`, or the built-in defaults when it is absent.
    ///
    /// # Errors
    /// Returns error on unreadable or malformed TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }

    /// Write the config as TOML, creating `.git/gitrewrite` if needed.
    ///
    /// # Errors
    /// Returns error when the directory or file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::other(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Walk, diff and journal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Messages with at most this many bytes are rewritten.
    #[serde(default = "default_max_msg_length")]
    pub max_msg_length: usize,

    /// Per-file diff cap in bytes.
    #[serde(default = "default_max_diff_length")]
    pub max_diff_length: usize,

    #[serde(default = "default_max_files_per_commit")]
    pub max_files_per_commit: usize,

    /// New decisions between journal flushes.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Recreate commits whose tree equals their parent's when replaying.
    #[serde(default = "default_true")]
    pub keep_empty_commits: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_msg_length: default_max_msg_length(),
            max_diff_length: default_max_diff_length(),
            max_files_per_commit: default_max_files_per_commit(),
            checkpoint_interval: default_checkpoint_interval(),
            keep_empty_commits: true,
        }
    }
}

const fn default_max_msg_length() -> usize {
    DEFAULT_MAX_MSG_LENGTH
}

const fn default_max_diff_length() -> usize {
    DEFAULT_MAX_DIFF_LENGTH
}

const fn default_max_files_per_commit() -> usize {
    DEFAULT_MAX_FILES_PER_COMMIT
}

const fn default_checkpoint_interval() -> usize {
    DEFAULT_CHECKPOINT_INTERVAL
}

const fn default_true() -> bool {
    true
}

/// Ollama server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Server address; `OLLAMA_HOST` and `--ollama-host` take precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: None,
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

fn default_model() -> String {
    "qwen2.5:14b".into()
}

const fn default_temperature() -> f64 {
    0.1
}
