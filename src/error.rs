use sandscript_compiler::SettingsError;
use sandscript_core::WhitelistError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure while setting up a [`ScriptEngine`](crate::ScriptEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Whitelist(#[from] WhitelistError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl EngineError {
    /// Origin of the whitelist that failed to load, if any.
    pub fn origin(&self) -> Option<&str> {
        match self {
            EngineError::Whitelist(err) => Some(&err.origin),
            EngineError::Settings(_) => None,
        }
    }
}
