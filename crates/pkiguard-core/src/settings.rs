//! Read-only node settings and the closable secure settings store.
//!
//! This module provides:
//! - [`Settings`] - An immutable snapshot of dotted setting keys to string values
//! - [`SettingsBuilder`] - Layered construction of a snapshot
//! - [`SecureSettings`] - A shared store of secret values that can be released
//! - [`SecureString`] - A zeroize-on-drop secret value
//!
//! # Example
//!
//! ```rust
//! use pkiguard_core::Settings;
//!
//! let settings = Settings::builder()
//!     .put("authc.realms.pki1.type", "pki")
//!     .put("transport.ssl.enabled", true)
//!     .build();
//!
//! assert_eq!(settings.get_bool("transport.ssl.enabled").unwrap(), Some(true));
//! assert!(settings.get_groups("authc.realms.").contains_key("pki1"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SettingsError;

// ─────────────────────────────────────────────────────────────────────────────
// Secure values
// ─────────────────────────────────────────────────────────────────────────────

/// A secret string that is wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret. Never log the returned value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString(<redacted>)")
    }
}

#[derive(Default)]
struct SecureStore {
    values: BTreeMap<String, SecureString>,
    closed: bool,
}

/// Shared store of secure settings.
///
/// Clones share the same underlying store, so the owner can [`close`] it after
/// handing a handle to a [`Settings`] snapshot. Once closed, every read fails
/// with [`SettingsError::SecureSettingsClosed`] and the store stays closed.
///
/// [`close`]: SecureSettings::close
#[derive(Clone, Default)]
pub struct SecureSettings {
    inner: Arc<RwLock<SecureStore>>,
}

impl SecureSettings {
    /// Create an empty, open store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a secret string.
    ///
    /// # Errors
    /// Returns [`SettingsError::SecureSettingsClosed`] if the store was closed.
    pub fn set_string(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SettingsError> {
        let key = key.into();
        let mut store = self.inner.write();
        if store.closed {
            return Err(SettingsError::SecureSettingsClosed { key });
        }
        store.values.insert(key, SecureString::new(value));
        Ok(())
    }

    /// Read a secret string, or `None` if the key is not present.
    ///
    /// # Errors
    /// Returns [`SettingsError::SecureSettingsClosed`] if the store was closed.
    pub fn get_string(&self, key: &str) -> Result<Option<SecureString>, SettingsError> {
        let store = self.inner.read();
        if store.closed {
            return Err(SettingsError::SecureSettingsClosed {
                key: key.to_string(),
            });
        }
        Ok(store.values.get(key).cloned())
    }

    /// Names of all stored secure settings.
    ///
    /// # Errors
    /// Returns [`SettingsError::SecureSettingsClosed`] if the store was closed.
    pub fn setting_names(&self) -> Result<BTreeSet<String>, SettingsError> {
        let store = self.inner.read();
        if store.closed {
            return Err(SettingsError::SecureSettingsClosed {
                key: "<names>".to_string(),
            });
        }
        Ok(store.values.keys().cloned().collect())
    }

    /// Release the store. Stored secrets are wiped.
    pub fn close(&self) {
        let mut store = self.inner.write();
        store.values.clear();
        store.closed = true;
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }
}

impl fmt::Debug for SecureSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.inner.read();
        f.debug_struct("SecureSettings")
            .field("entries", &store.values.len())
            .field("closed", &store.closed)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable snapshot of node settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: BTreeMap<String, String>,
    secure: Option<SecureSettings>,
}

impl Settings {
    /// Snapshot with no settings at all.
    pub const EMPTY: Self = Self {
        values: BTreeMap::new(),
        secure: None,
    };

    /// Create a new builder.
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Raw string value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Boolean value for `key`, `None` if unset.
    ///
    /// # Errors
    /// Returns [`SettingsError::InvalidBoolean`] unless the value is exactly
    /// `true` or `false`.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, SettingsError> {
        self.get(key)
            .map(|raw| match raw {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(SettingsError::InvalidBoolean {
                    key: key.to_string(),
                    value: other.to_string(),
                }),
            })
            .transpose()
    }

    /// Integer value for `key`, `None` if unset.
    ///
    /// # Errors
    /// Returns [`SettingsError::InvalidInteger`] if the value does not parse.
    pub fn get_i32(&self, key: &str) -> Result<Option<i32>, SettingsError> {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<i32>()
                    .map_err(|_| SettingsError::InvalidInteger {
                        key: key.to_string(),
                        value: raw.to_string(),
                    })
            })
            .transpose()
    }

    /// Settings under `prefix`, with the prefix stripped from every key.
    #[must_use]
    pub fn get_by_prefix(&self, prefix: &str) -> Self {
        let values = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), value.clone()))
            })
            .collect();
        Self {
            values,
            secure: None,
        }
    }

    /// Group settings under `prefix` by their next key segment.
    ///
    /// `get_groups("authc.realms.")` over `authc.realms.a.type` and
    /// `authc.realms.a.enabled` yields one group `a` holding `type` and
    /// `enabled`. Keys with no segment after the group name are ignored.
    #[must_use]
    pub fn get_groups(&self, prefix: &str) -> BTreeMap<String, Self> {
        let mut groups: BTreeMap<String, Self> = BTreeMap::new();
        for (key, value) in &self.values {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            let Some((name, sub_key)) = rest.split_once('.') else {
                continue;
            };
            if name.is_empty() || sub_key.is_empty() {
                continue;
            }
            groups
                .entry(name.to_string())
                .or_default()
                .values
                .insert(sub_key.to_string(), value.clone());
        }
        groups
    }

    /// Iterate over every plain setting key.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of plain settings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot holds no plain settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The attached secure settings store, if any.
    #[must_use]
    pub const fn secure_settings(&self) -> Option<&SecureSettings> {
        self.secure.as_ref()
    }

    /// Read a secure setting. `None` if no store is attached or the key is absent.
    ///
    /// # Errors
    /// Returns [`SettingsError::SecureSettingsClosed`] if the attached store was
    /// released.
    pub fn get_secure_string(&self, key: &str) -> Result<Option<SecureString>, SettingsError> {
        match &self.secure {
            Some(secure) => secure.get_string(key),
            None => Ok(None),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`Settings`]. Later writes win.
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    values: BTreeMap<String, String>,
    secure: Option<SecureSettings>,
}

impl SettingsBuilder {
    /// Set `key` to the string form of `value`.
    #[must_use]
    pub fn put(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// Copy every value (and the secure store, if any) from `settings`.
    #[must_use]
    pub fn put_settings(mut self, settings: &Settings) -> Self {
        self.values.extend(
            settings
                .values
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        if let Some(secure) = &settings.secure {
            self.secure = Some(secure.clone());
        }
        self
    }

    /// Remove `key` if present.
    #[must_use]
    pub fn remove(mut self, key: &str) -> Self {
        self.values.remove(key);
        self
    }

    /// Attach a secure settings store.
    #[must_use]
    pub fn set_secure_settings(mut self, secure: SecureSettings) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Finish the snapshot.
    #[must_use]
    pub fn build(self) -> Settings {
        Settings {
            values: self.values,
            secure: self.secure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_settings_have_no_keys() {
        assert!(Settings::EMPTY.is_empty());
        assert_eq!(Settings::EMPTY.get("anything"), None);
        assert!(Settings::EMPTY.get_groups("authc.realms.").is_empty());
    }

    #[test]
    fn get_bool_accepts_only_true_and_false() {
        let settings = Settings::builder()
            .put("a", true)
            .put("b", "false")
            .put("c", "yes")
            .build();
        assert_eq!(settings.get_bool("a"), Ok(Some(true)));
        assert_eq!(settings.get_bool("b"), Ok(Some(false)));
        assert_eq!(settings.get_bool("missing"), Ok(None));
        assert_eq!(
            settings.get_bool("c"),
            Err(SettingsError::InvalidBoolean {
                key: "c".to_string(),
                value: "yes".to_string(),
            })
        );
    }

    #[test]
    fn get_i32_parses_and_rejects() {
        let settings = Settings::builder()
            .put("order", 3)
            .put("bad", "three")
            .build();
        assert_eq!(settings.get_i32("order"), Ok(Some(3)));
        assert!(settings.get_i32("bad").is_err());
    }

    #[test]
    fn groups_split_on_next_segment() {
        let settings = Settings::builder()
            .put("authc.realms.pki1.type", "pki")
            .put("authc.realms.pki1.enabled", false)
            .put("authc.realms.native.type", "native")
            .put("authc.realms.dangling", "x")
            .put("transport.ssl.enabled", true)
            .build();

        let groups = settings.get_groups("authc.realms.");
        assert_eq!(
            groups.keys().cloned().collect::<Vec<_>>(),
            vec!["native".to_string(), "pki1".to_string()]
        );
        let pki1 = &groups["pki1"];
        assert_eq!(pki1.get("type"), Some("pki"));
        assert_eq!(pki1.get_bool("enabled"), Ok(Some(false)));
    }

    #[test]
    fn get_by_prefix_strips_prefix() {
        let settings = Settings::builder()
            .put("transport.ssl.enabled", true)
            .put("transport.ssl.client_authentication", "none")
            .put("http.ssl.enabled", false)
            .build();
        let transport = settings.get_by_prefix("transport.ssl.");
        assert_eq!(transport.len(), 2);
        assert_eq!(transport.get("client_authentication"), Some("none"));
    }

    #[test]
    fn put_settings_layers_and_later_wins() {
        let base = Settings::builder()
            .put("transport.ssl.enabled", false)
            .put("ssl.client_authentication", "required")
            .build();
        let layered = Settings::builder()
            .put_settings(&base)
            .put("transport.ssl.enabled", true)
            .build();
        assert_eq!(layered.get_bool("transport.ssl.enabled"), Ok(Some(true)));
        assert_eq!(layered.get("ssl.client_authentication"), Some("required"));

        let removed = Settings::builder()
            .put_settings(&layered)
            .remove("ssl.client_authentication")
            .build();
        assert_eq!(removed.get("ssl.client_authentication"), None);
    }

    #[test]
    fn secure_settings_reads_until_closed() {
        let secure = SecureSettings::new();
        secure
            .set_string("http.ssl.keystore.secure_password", "testnode")
            .unwrap();
        let settings = Settings::builder()
            .set_secure_settings(secure.clone())
            .build();

        let value = settings
            .get_secure_string("http.ssl.keystore.secure_password")
            .unwrap()
            .unwrap();
        assert_eq!(value.expose(), "testnode");
        assert!(settings.get_secure_string("other").unwrap().is_none());

        secure.close();
        assert!(secure.is_closed());
        assert!(matches!(
            settings.get_secure_string("http.ssl.keystore.secure_password"),
            Err(SettingsError::SecureSettingsClosed { key }) if key == "http.ssl.keystore.secure_password"
        ));
        assert!(secure.setting_names().is_err());
        assert!(secure.set_string("k", "v").is_err());
    }

    #[test]
    fn settings_without_secure_store_read_none() {
        let settings = Settings::builder().put("a", "b").build();
        assert!(settings.secure_settings().is_none());
        assert!(settings.get_secure_string("a").unwrap().is_none());
    }

    #[test]
    fn secure_debug_is_redacted() {
        let secret = SecureString::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));

        let secure = SecureSettings::new();
        secure.set_string("k", "hunter2").unwrap();
        let settings = Settings::builder().set_secure_settings(secure).build();
        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
