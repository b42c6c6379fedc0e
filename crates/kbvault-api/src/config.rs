//! Runtime configuration read from the environment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `VAULT_PATH` | (required) | Root directory of the vault |
//! | `KB_ROOT_DIR` | `.knowledge-bases` | Vault-relative directory for knowledge base records |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `LOG_FILE` | unset | Log to a daily-rotated file instead of stderr |
//! | `LOG_ANSI` | auto | Force ANSI colors on (`true`/`1`) or off |

use std::path::PathBuf;

use kbvault_core::defaults::KB_ROOT_DIR;
use kbvault_core::paths::{has_traversal, normalize_path};
use kbvault_core::{Error, Result};

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub vault_path: PathBuf,
    /// Normalized vault-relative directory holding knowledge base records.
    pub kb_root_dir: String,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
    pub log_ansi: Option<bool>,
}

impl Config {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` as the variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vault_path = lookup("VAULT_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| Error::Config("VAULT_PATH must be set".to_string()))?;

        let kb_root_dir = match lookup("KB_ROOT_DIR") {
            Some(raw) => {
                let dir = normalize_path(&raw);
                if dir.is_empty() || has_traversal(&dir) {
                    return Err(Error::Config(format!(
                        "KB_ROOT_DIR '{raw}' must be a non-empty vault-relative path"
                    )));
                }
                dir
            }
            None => KB_ROOT_DIR.to_string(),
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => LogFormat::parse(&raw).ok_or_else(|| {
                Error::Config(format!("LOG_FORMAT must be 'text' or 'json', got '{raw}'"))
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            vault_path,
            kb_root_dir,
            log_format,
            log_file: lookup("LOG_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            log_ansi: lookup("LOG_ANSI").map(|v| v == "true" || v == "1"),
        })
    }
}
