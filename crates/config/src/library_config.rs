//! Library and import configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Import matching settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibraryConfig {
    /// Fuzzy matches scoring below this ask the user before merging
    pub confirm_threshold: f64,

    /// Minimum fuzzy score for a candidate to match an existing book at all
    pub merge_threshold: f64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            confirm_threshold: 0.9,
            merge_threshold: 0.7,
        }
    }
}

impl ConfigSection for LibraryConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(
                self.confirm_threshold,
                0.0,
                1.0,
                "library.confirm_threshold",
            ),
            Validator::in_range(self.merge_threshold, 0.0, 1.0, "library.merge_threshold"),
            Validator::ordered(
                self.merge_threshold,
                self.confirm_threshold,
                "library.merge_threshold",
            ),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.confirm_threshold = other.confirm_threshold;
        self.merge_threshold = other.merge_threshold;
    }

    fn section_name(&self) -> &'static str {
        "library"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LibraryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = LibraryConfig {
            confirm_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_threshold_above_confirm() {
        let config = LibraryConfig {
            confirm_threshold: 0.6,
            merge_threshold: 0.8,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge() {
        let mut base = LibraryConfig::default();
        base.merge(LibraryConfig {
            confirm_threshold: 0.95,
            merge_threshold: 0.5,
        });
        assert_eq!(base.confirm_threshold, 0.95);
        assert_eq!(base.merge_threshold, 0.5);
    }
}
