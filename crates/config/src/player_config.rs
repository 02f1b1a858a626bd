//! Player configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Player preferences and behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Lowest playback rate a caller may request
    pub min_rate: f32,

    /// Highest playback rate a caller may request
    pub max_rate: f32,

    /// Rate applied to every newly loaded track unless restored from the book
    pub default_rate: f32,

    /// Seconds jumped by "skip back"
    pub skip_back_secs: f64,

    /// Seconds jumped by "skip forward"
    pub skip_forward_secs: f64,

    /// Interval the media backend is asked to report positions at
    pub position_update_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            min_rate: 0.5,
            max_rate: 3.0,
            default_rate: 1.0,
            skip_back_secs: 15.0,
            skip_forward_secs: 30.0,
            position_update_ms: 500,
        }
    }
}

impl ConfigSection for PlayerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(self.min_rate, 0.25, 4.0, "player.min_rate"),
            Validator::in_range(self.max_rate, 0.25, 4.0, "player.max_rate"),
            Validator::ordered(self.min_rate, self.max_rate, "player.min_rate"),
            Validator::in_range(
                self.default_rate,
                self.min_rate,
                self.max_rate,
                "player.default_rate",
            ),
            Validator::in_range(self.skip_back_secs, 1.0, 600.0, "player.skip_back_secs"),
            Validator::in_range(
                self.skip_forward_secs,
                1.0,
                600.0,
                "player.skip_forward_secs",
            ),
            Validator::in_range(
                self.position_update_ms,
                50,
                5000,
                "player.position_update_ms",
            ),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.min_rate = other.min_rate;
        self.max_rate = other.max_rate;
        self.default_rate = other.default_rate;
        self.skip_back_secs = other.skip_back_secs;
        self.skip_forward_secs = other.skip_forward_secs;
        self.position_update_ms = other.position_update_ms;
    }

    fn section_name(&self) -> &'static str {
        "player"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PlayerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_rate_bounds() {
        let config = PlayerConfig {
            min_rate: 2.0,
            max_rate: 1.0,
            default_rate: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_rate_outside_bounds() {
        let config = PlayerConfig {
            default_rate: 3.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multiple_validation_errors() {
        let config = PlayerConfig {
            skip_back_secs: 0.0,
            position_update_ms: 1,
            ..Default::default()
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_merge() {
        let mut base = PlayerConfig::default();
        let other = PlayerConfig {
            default_rate: 1.25,
            skip_forward_secs: 10.0,
            ..Default::default()
        };

        base.merge(other);
        assert_eq!(base.default_rate, 1.25);
        assert_eq!(base.skip_forward_secs, 10.0);
    }
}
