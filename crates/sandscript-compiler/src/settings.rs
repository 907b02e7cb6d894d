//! Compiler settings.
//!
//! Settings have usable defaults and can be loaded from a TOML table:
//!
//! ```toml
//! entry_function = "execute"
//! max_cache_depth = 5
//! initial_call_site_depth = 0
//! max_loop_counter = 1000000
//! statement_map = true
//! ```

use serde::Deserialize;
use thiserror::Error;

use sandscript_catalog::is_valid_type_name;

/// Invalid compiler settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("invalid compiler settings: {0}")]
    Parse(String),

    #[error("invalid compiler setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Tunables for one engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerSettings {
    /// Name of the script entry function produced by the IR builder.
    pub entry_function: String,
    /// Distinct receiver types cached per dynamic call site before it turns
    /// megamorphic.
    pub max_cache_depth: usize,
    /// Guard depth already consumed when a call site is created.
    pub initial_call_site_depth: u32,
    /// Counted loop iterations allowed per function invocation, summed over
    /// every loop in that invocation; `0` disables the bound.
    pub max_loop_counter: u64,
    /// Record statement boundaries for fault attribution.
    pub statement_map: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            entry_function: "execute".to_string(),
            max_cache_depth: 5,
            initial_call_site_depth: 0,
            max_loop_counter: 1_000_000,
            statement_map: true,
        }
    }
}

impl CompilerSettings {
    pub fn from_toml(source: &str) -> Result<Self, SettingsError> {
        let settings: CompilerSettings = toml::from_str(source)
            .map_err(|e| SettingsError::Parse(e.to_string().trim_end().to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !is_valid_type_name(&self.entry_function) || self.entry_function.contains('.') {
            return Err(SettingsError::Invalid {
                key: "entry_function",
                reason: format!("'{}' is not an identifier", self.entry_function),
            });
        }
        if self.max_cache_depth == 0 {
            return Err(SettingsError::Invalid {
                key: "max_cache_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Cache slots available to a call site created at `initial_depth`.
    pub fn cache_slots(&self, initial_depth: u32) -> usize {
        self.max_cache_depth.saturating_sub(initial_depth as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = CompilerSettings::default();
        assert_eq!(settings.entry_function, "execute");
        assert_eq!(settings.max_cache_depth, 5);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.cache_slots(2), 3);
        assert_eq!(settings.cache_slots(9), 0);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings =
            CompilerSettings::from_toml("max_cache_depth = 2\nstatement_map = false\n").unwrap();
        assert_eq!(settings.max_cache_depth, 2);
        assert!(!settings.statement_map);
        assert_eq!(settings.entry_function, "execute");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            CompilerSettings::from_toml("max_cache_depth = 0"),
            Err(SettingsError::Invalid { key: "max_cache_depth", .. })
        ));
        assert!(matches!(
            CompilerSettings::from_toml("entry_function = \"run.it\""),
            Err(SettingsError::Invalid { key: "entry_function", .. })
        ));
        assert!(matches!(
            CompilerSettings::from_toml("unknown = 1"),
            Err(SettingsError::Parse(_))
        ));
    }
}
