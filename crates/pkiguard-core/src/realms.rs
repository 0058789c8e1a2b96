//! Authentication realms configured under `authc.realms.<name>.*`.

use serde::Serialize;

use crate::error::SettingsError;
use crate::settings::Settings;

/// Namespace holding one group of settings per realm.
pub const REALMS_PREFIX: &str = "authc.realms.";

/// Realm type of certificate-based realms.
pub const PKI_REALM_TYPE: &str = "pki";

/// A configured authentication realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealmConfig {
    /// Realm name (the `<name>` segment of its keys).
    pub name: String,
    /// Realm type, e.g. `pki` or `native`.
    #[serde(rename = "type")]
    pub realm_type: String,
    /// Whether the realm takes part in authentication. Defaults to true.
    pub enabled: bool,
    /// Position in the realm chain. Defaults to `i32::MAX`.
    pub order: i32,
}

impl RealmConfig {
    /// Whether this is a certificate-based realm.
    #[must_use]
    pub fn is_pki(&self) -> bool {
        self.realm_type == PKI_REALM_TYPE
    }
}

/// Enumerates realms from a settings snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealmCatalog;

impl RealmCatalog {
    /// Every realm that declares a type, ordered by `order` then name.
    ///
    /// Only a PKI realm's `enabled` flag is read strictly. Malformed values on
    /// other realms, and a malformed `order` on any realm, fall back to their
    /// defaults.
    ///
    /// # Errors
    /// Returns [`SettingsError`] if a PKI realm's `enabled` is malformed.
    pub fn realms(settings: &Settings) -> Result<Vec<RealmConfig>, SettingsError> {
        let mut realms = Vec::new();
        for (name, realm) in settings.get_groups(REALMS_PREFIX) {
            let Some(realm_type) = realm.get("type") else {
                tracing::debug!(realm = %name, "Skipping realm without a type");
                continue;
            };
            let enabled = match realm.get_bool("enabled") {
                Ok(enabled) => enabled.unwrap_or(true),
                Err(_) if realm_type == PKI_REALM_TYPE => {
                    return Err(SettingsError::InvalidBoolean {
                        key: format!("{REALMS_PREFIX}{name}.enabled"),
                        value: realm.get("enabled").unwrap_or_default().to_string(),
                    });
                }
                Err(_) => {
                    tracing::debug!(
                        realm = %name,
                        value = realm.get("enabled").unwrap_or_default(),
                        "Ignoring malformed enabled flag on non-PKI realm"
                    );
                    true
                }
            };
            let order = realm.get_i32("order").unwrap_or_else(|_| {
                tracing::debug!(
                    realm = %name,
                    value = realm.get("order").unwrap_or_default(),
                    "Ignoring malformed realm order"
                );
                None
            });

            realms.push(RealmConfig {
                realm_type: realm_type.to_string(),
                name,
                enabled,
                order: order.unwrap_or(i32::MAX),
            });
        }
        realms.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        Ok(realms)
    }

    /// Realms of type `pki` whose `enabled` setting is true or unset.
    ///
    /// # Errors
    /// Returns [`SettingsError`] if a PKI realm's `enabled` is malformed.
    pub fn enabled_pki_realms(settings: &Settings) -> Result<Vec<RealmConfig>, SettingsError> {
        let realms = Self::realms(settings)?
            .into_iter()
            .filter(|realm| {
                if realm.is_pki() && !realm.enabled {
                    tracing::debug!(realm = %realm.name, "PKI realm is disabled");
                }
                realm.is_pki() && realm.enabled
            })
            .collect();
        Ok(realms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(realms: &[RealmConfig]) -> Vec<&str> {
        realms.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn empty_settings_have_no_realms() {
        assert!(RealmCatalog::realms(&Settings::EMPTY).unwrap().is_empty());
        assert!(
            RealmCatalog::enabled_pki_realms(&Settings::EMPTY)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn pki_realm_enabled_by_default() {
        let settings = Settings::builder()
            .put("authc.realms.test_pki.type", "pki")
            .build();
        let realms = RealmCatalog::enabled_pki_realms(&settings).unwrap();
        assert_eq!(
            realms,
            vec![RealmConfig {
                name: "test_pki".to_string(),
                realm_type: "pki".to_string(),
                enabled: true,
                order: i32::MAX,
            }]
        );
    }

    #[test]
    fn disabled_and_other_types_are_filtered() {
        let settings = Settings::builder()
            .put("authc.realms.off.type", "pki")
            .put("authc.realms.off.enabled", false)
            .put("authc.realms.on.type", "pki")
            .put("authc.realms.on.enabled", true)
            .put("authc.realms.native1.type", "native")
            .put("authc.realms.untyped.order", 0)
            .build();

        let all = RealmCatalog::realms(&settings).unwrap();
        assert_eq!(names(&all), vec!["native1", "off", "on"]);

        let pki = RealmCatalog::enabled_pki_realms(&settings).unwrap();
        assert_eq!(names(&pki), vec!["on"]);
    }

    #[test]
    fn realms_sort_by_order_then_name() {
        let settings = Settings::builder()
            .put("authc.realms.b.type", "pki")
            .put("authc.realms.b.order", 1)
            .put("authc.realms.a.type", "pki")
            .put("authc.realms.a.order", 2)
            .put("authc.realms.c.type", "pki")
            .put("authc.realms.c.order", 1)
            .build();
        let realms = RealmCatalog::enabled_pki_realms(&settings).unwrap();
        assert_eq!(names(&realms), vec!["b", "c", "a"]);
    }

    #[test]
    fn type_match_is_exact() {
        let settings = Settings::builder()
            .put("authc.realms.upper.type", "PKI")
            .build();
        assert!(
            RealmCatalog::enabled_pki_realms(&settings)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn malformed_enabled_reports_full_key() {
        let settings = Settings::builder()
            .put("authc.realms.test_pki.type", "pki")
            .put("authc.realms.test_pki.enabled", "nope")
            .build();
        assert_eq!(
            RealmCatalog::enabled_pki_realms(&settings),
            Err(SettingsError::InvalidBoolean {
                key: "authc.realms.test_pki.enabled".to_string(),
                value: "nope".to_string(),
            })
        );
    }

    #[test]
    fn malformed_order_falls_back_to_last() {
        let settings = Settings::builder()
            .put("authc.realms.test_pki.type", "pki")
            .put("authc.realms.test_pki.order", "first")
            .put("authc.realms.other.type", "pki")
            .put("authc.realms.other.order", 3)
            .build();
        let realms = RealmCatalog::enabled_pki_realms(&settings).unwrap();
        assert_eq!(names(&realms), vec!["other", "test_pki"]);
        assert_eq!(realms[1].order, i32::MAX);
    }

    #[test]
    fn malformed_values_on_non_pki_realms_are_not_errors() {
        let settings = Settings::builder()
            .put("authc.realms.native1.type", "native")
            .put("authc.realms.native1.order", "first")
            .put("authc.realms.native1.enabled", "maybe")
            .put("authc.realms.off.type", "pki")
            .put("authc.realms.off.enabled", false)
            .put("authc.realms.off.order", "1.5")
            .build();

        let all = RealmCatalog::realms(&settings).unwrap();
        assert_eq!(names(&all), vec!["native1", "off"]);
        assert!(all[0].enabled);
        assert!(
            RealmCatalog::enabled_pki_realms(&settings)
                .unwrap()
                .is_empty()
        );
    }
}
