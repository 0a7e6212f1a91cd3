//! Configuration validation with range checks.
//!
//! Invalid values are rejected, never clamped.

use crate::error::ConfigError;

use super::{Config, TaggerConfig};

/// Reject values outside `[0, 1]`, including NaN.
fn check_unit_range(name: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{name} must be between 0.0 and 1.0 (got {value})"
        )));
    }
    Ok(())
}

impl TaggerConfig {
    /// Validate tagger settings before any inference runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_range("tagger.general_threshold", self.general_threshold)?;
        check_unit_range("tagger.character_threshold", self.character_threshold)?;
        check_unit_range("tagger.general_mcut_min", self.general_mcut_min)?;
        check_unit_range("tagger.character_mcut_min", self.character_mcut_min)?;
        if self.target_size == 0 {
            return Err(ConfigError::ValidationError(
                "tagger.target_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.tagger.validate()?;
        if self.processing.supported_formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.supported_formats must not be empty".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_thresholds() {
        let mut config = Config::default();
        config.tagger.general_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general_threshold"));

        config.tagger.general_threshold = -0.1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general_threshold"));
    }

    #[test]
    fn test_validate_rejects_nan_mcut_min() {
        let mut config = TaggerConfig::default();
        config.character_mcut_min = f32::NAN;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("character_mcut_min"));
    }

    #[test]
    fn test_validate_accepts_threshold_bounds() {
        let mut config = TaggerConfig::default();
        config.general_threshold = 0.0;
        config.character_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_target_size() {
        let mut config = TaggerConfig::default();
        config.target_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("target_size"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.limits.max_image_dimension = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_image_dimension"));
    }

    #[test]
    fn test_validate_rejects_empty_formats() {
        let mut config = Config::default();
        config.processing.supported_formats.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("supported_formats"));
    }
}
