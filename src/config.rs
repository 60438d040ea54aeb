//! Engine configuration.
//!
//! Option names follow the camelCase keys accepted in configuration files:
//!
//! ```yaml
//! traceCallsEnabled: true
//! gnuCompatibleRecursion: false
//! maxRescanDepth: 64
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::err_msg;
use crate::IndigoError;

/// Default nesting limit for rescans.
pub const RESCAN_LIMIT: usize = 64;
/// Default size of the expansion work buffer, in bytes of rendered text.
pub const OUTPUT_LIMIT: usize = 65536;
/// Length above which a stringized literal draws a warning.
pub const STRING_LIMIT: usize = 4095;
/// Largest value `__LINE__` may take without a warning.
pub const LINE_LIMIT: u64 = 2_147_483_647;

pub const WARN_ARGUMENTS: u8 = 1;
pub const WARN_EMPTY_ARGUMENT: u8 = 2;
pub const WARN_LIMITS: u8 = 4;
pub const WARN_COMPAT: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Wrap calls and arguments in trace markers.
    pub trace_calls_enabled: bool,
    /// Let a macro re-expand after its call read past its own replacement
    /// list, whatever the origin of the name.
    pub gnu_compatible_recursion: bool,
    pub max_rescan_depth: usize,
    pub max_output_len: usize,
    pub max_string_len: usize,
    pub max_line_number: u64,
    /// Bitmask of enabled warning classes.
    pub warn_level: u8,
    /// Drop the comma before an empty `__VA_ARGS__`.
    pub elide_empty_variadic_comma: bool,
    /// Verify that trace markers nest in traced output.
    pub check_trace_balance: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trace_calls_enabled: false,
            gnu_compatible_recursion: false,
            max_rescan_depth: RESCAN_LIMIT,
            max_output_len: OUTPUT_LIMIT,
            max_string_len: STRING_LIMIT,
            max_line_number: LINE_LIMIT,
            warn_level: WARN_ARGUMENTS | WARN_EMPTY_ARGUMENT | WARN_LIMITS,
            elide_empty_variadic_comma: false,
            check_trace_balance: true,
        }
    }
}

impl EngineConfig {
    /// Loads a YAML or JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self, IndigoError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            err_msg!(Io, "Failed to read configuration {}", path.display()).with_cause(e)
        })?;
        Self::from_str_checked(&text)
            .map_err(|e| err_msg!(Config, "{}: {}", path.display(), e.message()))
    }

    /// Parses configuration text and validates it.
    pub fn from_str_checked(text: &str) -> Result<Self, IndigoError> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| err_msg!(Config, "Invalid configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IndigoError> {
        if self.max_rescan_depth == 0 {
            return Err(err_msg!(Config, "maxRescanDepth must be at least 1"));
        }
        if self.max_output_len == 0 {
            return Err(err_msg!(Config, "maxOutputLen must be at least 1"));
        }
        Ok(())
    }

    pub fn warns(&self, class: u8) -> bool {
        self.warn_level & class != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = EngineConfig::from_str_checked("traceCallsEnabled: true\n").unwrap();
        assert!(config.trace_calls_enabled);
        assert_eq!(config.max_rescan_depth, RESCAN_LIMIT);
        assert!(!config.gnu_compatible_recursion);
    }

    #[test]
    fn json_is_accepted() {
        let config =
            EngineConfig::from_str_checked(r#"{"gnuCompatibleRecursion": true, "maxRescanDepth": 8}"#)
                .unwrap();
        assert!(config.gnu_compatible_recursion);
        assert_eq!(config.max_rescan_depth, 8);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = EngineConfig::from_str_checked("maxRescanDepth: 0").unwrap_err();
        assert!(err.to_string().contains("maxRescanDepth"));
    }

    #[test]
    fn warning_mask() {
        let config = EngineConfig {
            warn_level: WARN_ARGUMENTS,
            ..EngineConfig::default()
        };
        assert!(config.warns(WARN_ARGUMENTS));
        assert!(!config.warns(WARN_EMPTY_ARGUMENT));
    }
}
