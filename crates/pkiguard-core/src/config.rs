//! Loading node settings from configuration files.
//!
//! Nested tables flatten into dotted keys, so these two files are equivalent:
//!
//! ```text
//! # flat
//! "transport.ssl.enabled" = true
//!
//! # nested
//! [transport.ssl]
//! enabled = true
//! ```

use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;
use crate::settings::{Settings, SettingsBuilder};

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (`.toml`).
    Toml,
    /// YAML (`.yml`, `.yaml`).
    Yaml,
    /// JSON (`.json`).
    Json,
}

impl ConfigFormat {
    /// Pick a format from the file extension.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => Ok(Self::Toml),
            Some("yml" | "yaml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Read and flatten a configuration file.
///
/// # Errors
/// Returns a [`ConfigError`] if the file cannot be read, has an unknown
/// extension, or does not parse.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let format = ConfigFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let settings = parse_settings(&text, format)?;
    tracing::debug!(
        path = %path.display(),
        keys = settings.len(),
        "Loaded settings from config file"
    );
    Ok(settings)
}

/// Parse configuration text into a flat [`Settings`] snapshot.
///
/// # Errors
/// Returns [`ConfigError::ParseFailed`] if the text is invalid for `format`.
pub fn parse_settings(text: &str, format: ConfigFormat) -> Result<Settings, ConfigError> {
    let root: Value = match format {
        ConfigFormat::Toml => {
            toml::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))?
        }
        ConfigFormat::Yaml => {
            if text.trim().is_empty() {
                Value::Null
            } else {
                serde_yaml::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))?
            }
        }
        ConfigFormat::Json => {
            serde_json::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))?
        }
    };

    match root {
        Value::Object(_) | Value::Null => {}
        other => {
            return Err(ConfigError::ParseFailed(format!(
                "expected a table of settings at the top level, found {}",
                json_kind(&other)
            )));
        }
    }

    let mut builder = Settings::builder();
    flatten_into(&mut builder, None, &root);
    Ok(builder.build())
}

/// Layer `key=value` overrides on top of `settings`. Overrides win.
///
/// # Errors
/// Returns [`ConfigError::InvalidOverride`] for entries without `=` or with an
/// empty key.
pub fn apply_overrides<S: AsRef<str>>(
    settings: &Settings,
    overrides: &[S],
) -> Result<Settings, ConfigError> {
    let mut builder = Settings::builder().put_settings(settings);
    for raw in overrides {
        let raw = raw.as_ref();
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidOverride(raw.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::InvalidOverride(raw.to_string()));
        }
        builder = builder.put(key, value.trim());
    }
    Ok(builder.build())
}

fn flatten_into(builder: &mut SettingsBuilder, prefix: Option<&str>, value: &Value) {
    let join = |segment: &str| match prefix {
        Some(prefix) => format!("{prefix}.{segment}"),
        None => segment.to_string(),
    };

    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (segment, child) in map {
                flatten_into(builder, Some(&join(segment)), child);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                flatten_into(builder, Some(&join(&idx.to_string())), child);
            }
        }
        Value::Bool(b) => put(builder, prefix, b),
        Value::Number(n) => put(builder, prefix, n),
        Value::String(s) => put(builder, prefix, s),
    }
}

fn put(builder: &mut SettingsBuilder, key: Option<&str>, value: impl ToString) {
    if let Some(key) = key {
        *builder = std::mem::take(builder).put(key, value);
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a table",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn toml_tables_flatten_to_dotted_keys() {
        let text = r#"
            "ssl.client_authentication" = "none"

            [authc.realms.pki1]
            type = "pki"
            order = 1

            [transport.ssl]
            enabled = true
        "#;
        let settings = parse_settings(text, ConfigFormat::Toml).unwrap();
        assert_eq!(settings.get("authc.realms.pki1.type"), Some("pki"));
        assert_eq!(settings.get("authc.realms.pki1.order"), Some("1"));
        assert_eq!(settings.get_bool("transport.ssl.enabled"), Ok(Some(true)));
        assert_eq!(settings.get("ssl.client_authentication"), Some("none"));
    }

    #[test]
    fn yaml_and_json_flatten_the_same_way() {
        let yaml = "transport:\n  profiles:\n    client:\n      ssl:\n        client_authentication: optional\n";
        let json = r#"{"transport":{"profiles":{"client":{"ssl":{"client_authentication":"optional"}}}}}"#;
        let from_yaml = parse_settings(yaml, ConfigFormat::Yaml).unwrap();
        let from_json = parse_settings(json, ConfigFormat::Json).unwrap();
        let key = "transport.profiles.client.ssl.client_authentication";
        assert_eq!(from_yaml.get(key), Some("optional"));
        assert_eq!(from_json.get(key), Some("optional"));
    }

    #[test]
    fn arrays_use_positional_keys_and_nulls_are_skipped() {
        let json = r#"{"hosts":["a","b"],"missing":null}"#;
        let settings = parse_settings(json, ConfigFormat::Json).unwrap();
        assert_eq!(settings.get("hosts.0"), Some("a"));
        assert_eq!(settings.get("hosts.1"), Some("b"));
        assert_eq!(settings.get("missing"), None);
        assert_eq!(settings.len(), 2);
    }

    #[test]
    fn empty_yaml_is_empty_settings() {
        let settings = parse_settings("", ConfigFormat::Yaml).unwrap();
        assert!(settings.is_empty());
    }

    #[test]
    fn non_table_root_is_rejected() {
        let err = parse_settings("[1, 2]", ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(msg) if msg.contains("an array")));
    }

    #[test]
    fn invalid_text_is_a_parse_error() {
        let err = parse_settings("transport = [", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn format_is_chosen_by_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("node.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("node.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("node.ini")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn load_settings_reads_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("temp file");
        writeln!(file, "http:\n  ssl:\n    enabled: true").expect("write config");

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.get_bool("http.ssl.enabled"), Ok(Some(true)));
    }

    #[test]
    fn load_settings_missing_file_is_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = load_settings(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let base = Settings::builder()
            .put("transport.ssl.enabled", false)
            .build();
        let settings = apply_overrides(
            &base,
            &["transport.ssl.enabled=true", " http.ssl.enabled = false "],
        )
        .unwrap();
        assert_eq!(settings.get_bool("transport.ssl.enabled"), Ok(Some(true)));
        assert_eq!(settings.get_bool("http.ssl.enabled"), Ok(Some(false)));

        assert!(matches!(
            apply_overrides(&base, &["novalue"]),
            Err(ConfigError::InvalidOverride(_))
        ));
        assert!(matches!(
            apply_overrides(&base, &["=true"]),
            Err(ConfigError::InvalidOverride(_))
        ));
    }
}
