//! Editor configuration as sent by the host.

use crate::emitter::EmitOptions;
use crate::error::ConfigError;
use crate::units::LengthUnit;
use serde::{Deserialize, Serialize};

/// Upper bound for `numberOfDecimalPlaces`.
pub const MAX_DECIMAL_PLACES: u32 = 12;

/// Host-supplied settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Emit elements the parser did not model. Default: **true**.
    pub show_unresolved_elements: bool,

    /// Unit for lengths of newly drawn shapes. `None` writes unitless user
    /// units. Default: `None`.
    pub default_unit: Option<LengthUnit>,

    /// Decimal places of numbers written back into attributes. Default: **1**.
    pub number_of_decimal_places: u32,

    /// Collapse a shape's transform list into one matrix when an interaction
    /// ends. Default: **true**.
    pub collect_transform_on_commit: bool,

    /// Percentage basis when no ancestor `<svg>` resolves. Default: **400**.
    pub percentage_fallback_px: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            show_unresolved_elements: true,
            default_unit: None,
            number_of_decimal_places: 1,
            collect_transform_on_commit: true,
            percentage_fallback_px: 400.0,
        }
    }
}

impl EditorConfig {
    /// Parse and validate a JSON configuration object.
    ///
    /// # Errors
    /// Malformed JSON, an unsupported `defaultUnit`, or out-of-range numbers.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.number_of_decimal_places > MAX_DECIMAL_PLACES {
            return Err(ConfigError::DecimalPlaces {
                got: self.number_of_decimal_places,
                max: MAX_DECIMAL_PLACES,
            });
        }
        if !self.percentage_fallback_px.is_finite() || self.percentage_fallback_px <= 0.0 {
            return Err(ConfigError::PercentageFallback(self.percentage_fallback_px));
        }
        Ok(())
    }

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            decimal_places: self.number_of_decimal_places,
            show_unresolved: self.show_unresolved_elements,
        }
    }
}
