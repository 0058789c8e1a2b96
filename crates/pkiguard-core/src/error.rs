//! Error types for settings access and configuration loading.
//!
//! A failed bootstrap check is a value ([`crate::BootstrapCheckResult`]), not an
//! error. Everything in this module means the settings could not be read at
//! all, and callers must abort rather than guess.

use thiserror::Error;

/// Errors raised while reading values out of a [`crate::Settings`] snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// The secure settings store was released before the value was read.
    #[error("secure settings were closed before `{key}` could be read")]
    SecureSettingsClosed {
        /// Secure setting that was requested.
        key: String,
    },

    /// A boolean setting held something other than `true` or `false`.
    #[error("failed to parse value [{value}] for setting [{key}] as a boolean, expected [true] or [false]")]
    InvalidBoolean {
        /// Setting key.
        key: String,
        /// Raw value found.
        value: String,
    },

    /// A client authentication setting held an unknown mode.
    #[error("invalid client authentication [{value}] for setting [{key}], expected one of [required, optional, none]")]
    InvalidClientAuth {
        /// Setting key.
        key: String,
        /// Raw value found.
        value: String,
    },

    /// An integer setting could not be parsed.
    #[error("failed to parse value [{value}] for setting [{key}] as an integer")]
    InvalidInteger {
        /// Setting key.
        key: String,
        /// Raw value found.
        value: String,
    },
}

/// Errors raised while loading settings from a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {reason}")]
    ReadFailed {
        /// Path that was read.
        path: String,
        /// Underlying I/O failure.
        reason: String,
    },

    /// The configuration text is not valid for its format.
    #[error("failed to parse config: {0}")]
    ParseFailed(String),

    /// The file extension does not map to a known format.
    #[error("unsupported config format for {0} (expected .toml, .yml, .yaml or .json)")]
    UnsupportedFormat(String),

    /// A `key=value` override was malformed.
    #[error("invalid setting override `{0}` (expected key=value)")]
    InvalidOverride(String),
}

/// Top-level error for the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings access failed.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Configuration loading failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_error_messages_name_the_key() {
        let err = SettingsError::SecureSettingsClosed {
            key: "http.ssl.keystore.secure_password".to_string(),
        };
        assert!(err.to_string().contains("http.ssl.keystore.secure_password"));

        let err = SettingsError::InvalidClientAuth {
            key: "ssl.client_authentication".to_string(),
            value: "sometimes".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sometimes"));
        assert!(msg.contains("ssl.client_authentication"));
    }

    #[test]
    fn crate_error_is_transparent() {
        let err: Error = SettingsError::InvalidBoolean {
            key: "transport.ssl.enabled".to_string(),
            value: "yes".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Settings(_)));
        assert!(err.to_string().starts_with("failed to parse value [yes]"));
    }
}
