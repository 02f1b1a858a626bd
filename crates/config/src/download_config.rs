//! Download configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Asset acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root directory for downloaded assets
    /// (relative paths resolve against the platform data dir)
    pub download_dir: PathBuf,

    /// User agent sent with every transfer
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            user_agent: format!("Narrivo/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 300,
        }
    }
}

impl ConfigSection for DownloadConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::not_empty(&self.user_agent, "downloads.user_agent"),
            Validator::in_range(self.timeout_secs, 5, 3600, "downloads.timeout_secs"),
        ];

        if self.download_dir.as_os_str().is_empty() {
            results.push(Err(ValidationError::new(
                "downloads.download_dir",
                "must not be empty",
            )));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.download_dir = other.download_dir;
        self.user_agent = other.user_agent;
        self.timeout_secs = other.timeout_secs;
    }

    fn section_name(&self) -> &'static str {
        "downloads"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DownloadConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_user_agent() {
        let config = DownloadConfig {
            user_agent: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_too_small() {
        let config = DownloadConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
