mod loader;

use serde::{Deserialize, Serialize};

use crate::location::MICROSOFT_TASK_FOLDER;
use crate::log::LogConfig;
use crate::task::DEFAULT_DESCRIPTION;

pub use loader::{config_dir, config_path, load, try_load};

/// Issuer marker a signing certificate must carry to count as trusted.
pub const DEFAULT_TRUSTED_ISSUER: &str = "CN=Microsoft";

/// Top-level configuration for autorun.
///
/// Loaded from `~/.config/autorun/config.toml`. Missing sections
/// fall back to defaults thanks to `#[serde(default)]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File logging.
    pub log: LogConfig,
    /// Third-party service listing.
    pub services: ServiceConfig,
    /// Scheduled task listing and creation.
    pub tasks: TaskConfig,
}

/// `[services]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Hide services whose binary is signed by a trusted issuer.
    pub hide_trusted_publishers: bool,
    /// Substring the signer's issuer name must contain (e.g. "CN=Microsoft").
    pub trusted_issuer: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            hide_trusted_publishers: true,
            trusted_issuer: DEFAULT_TRUSTED_ISSUER.into(),
        }
    }
}

/// `[tasks]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Task folder prefixes that are never listed.
    pub excluded_folders: Vec<String>,
    /// Registration description of tasks autorun creates.
    pub description: String,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            excluded_folders: vec![MICROSOFT_TASK_FOLDER.into()],
            description: DEFAULT_DESCRIPTION.into(),
        }
    }
}

impl Config {
    /// Normalizes values so the providers can use them as-is.
    pub fn validate(&mut self) {
        self.log.max_file_mb = self.log.max_file_mb.clamp(1, 1024);
        self.services.validate();
        self.tasks.validate();
    }
}

impl ServiceConfig {
    fn validate(&mut self) {
        let issuer = self.trusted_issuer.trim();
        self.trusted_issuer = if issuer.is_empty() {
            DEFAULT_TRUSTED_ISSUER.into()
        } else {
            issuer.into()
        };
    }
}

impl TaskConfig {
    fn validate(&mut self) {
        // Folder prefixes are rooted and end with a separator so `\Vendor`
        // does not also hide `\VendorTools`.
        self.excluded_folders = self
            .excluded_folders
            .iter()
            .map(|f| f.trim().trim_matches('\\'))
            .filter(|f| !f.is_empty())
            .map(|f| format!("\\{f}\\"))
            .collect();
        if self.description.trim().is_empty() {
            self.description = DEFAULT_DESCRIPTION.into();
        }
    }
}

#[cfg(test)]
mod tests;
