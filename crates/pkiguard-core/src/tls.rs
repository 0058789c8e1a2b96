//! Effective TLS settings per network layer and profile.
//!
//! Values resolve through an ordered chain of setting keys, falling back to a
//! layer-specific default when none of them is set:
//!
//! ```text
//! ssl_enabled   transport: transport.ssl.enabled -> ssl.enabled (legacy) -> false
//!               http:      http.ssl.enabled -> false
//! client_auth   <layer>.ssl.client_authentication -> ssl.client_authentication
//!               -> required (transport) | none (http)
//! ```
//!
//! Transport profiles (`transport.profiles.<name>.ssl.*`) override either value
//! for that profile only and otherwise inherit the resolved layer value. A
//! profile named `default` overrides the default profile itself.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SettingsError;
use crate::settings::Settings;

/// Name of the implicit profile every layer has.
pub const DEFAULT_PROFILE: &str = "default";

/// Prefix under which transport profiles are configured.
pub const TRANSPORT_PROFILES_PREFIX: &str = "transport.profiles.";

/// Global client authentication fallback shared by both layers.
pub const GLOBAL_CLIENT_AUTH_KEY: &str = "ssl.client_authentication";

/// Legacy global TLS toggle, consulted for the transport layer only.
pub const LEGACY_SSL_ENABLED_KEY: &str = "ssl.enabled";

// ─────────────────────────────────────────────────────────────────────────────
// Layers and client authentication
// ─────────────────────────────────────────────────────────────────────────────

/// Network layer a listener belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkLayer {
    /// Node-to-node transport.
    Transport,
    /// Client-facing HTTP.
    Http,
}

impl NetworkLayer {
    /// Every layer, in the order they are evaluated.
    pub const ALL: [Self; 2] = [Self::Transport, Self::Http];

    /// Setting namespace for the layer.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Http => "http",
        }
    }

    /// Client authentication used when no key in the chain is set.
    #[must_use]
    pub const fn default_client_auth(&self) -> ClientAuth {
        match self {
            Self::Transport => ClientAuth::Required,
            Self::Http => ClientAuth::None,
        }
    }

    /// Whether named profiles exist for this layer.
    #[must_use]
    pub const fn supports_profiles(&self) -> bool {
        matches!(self, Self::Transport)
    }
}

impl fmt::Display for NetworkLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a TLS listener asks connecting peers for a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAuth {
    /// Peers must present a certificate.
    Required,
    /// Peers are asked for a certificate but may omit it.
    Optional,
    /// Peers are never asked for a certificate.
    None,
}

impl ClientAuth {
    /// Setting value for this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::None => "none",
        }
    }

    /// Whether a client certificate can reach the realm through this listener.
    ///
    /// `Optional` counts: the listener requests a certificate and the PKI realm
    /// decides for itself whether a missing one is acceptable.
    #[must_use]
    pub const fn requests_certificate(&self) -> bool {
        matches!(self, Self::Required | Self::Optional)
    }

    fn parse_setting(key: &str, raw: &str) -> Result<Self, SettingsError> {
        raw.parse().map_err(|()| SettingsError::InvalidClientAuth {
            key: key.to_string(),
            value: raw.to_string(),
        })
    }
}

impl FromStr for ClientAuth {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "optional" => Ok(Self::Optional),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ClientAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved values
// ─────────────────────────────────────────────────────────────────────────────

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// A `transport.profiles.<name>.ssl.*` key.
    Profile,
    /// A `<layer>.ssl.*` key.
    Layer,
    /// The global `ssl.client_authentication` key.
    Global,
    /// The legacy global `ssl.enabled` toggle.
    LegacyGlobal,
    /// Nothing was set; the layer default applies.
    Default,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Profile => "profile",
            Self::Layer => "layer",
            Self::Global => "global",
            Self::LegacyGlobal => "legacy global",
            Self::Default => "default",
        })
    }
}

/// An effective value together with the key that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved<T> {
    /// Effective value.
    pub value: T,
    /// Kind of setting that supplied it.
    pub source: ValueSource,
    /// Exact key that supplied it (`None` for defaults).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl<T> Resolved<T> {
    const fn default_value(value: T) -> Self {
        Self {
            value,
            source: ValueSource::Default,
            key: None,
        }
    }
}

/// Resolve the first key of `chain` that is set, parsing it with `parse`.
fn resolve_chain<T>(
    settings: &Settings,
    chain: &[(String, ValueSource)],
    default: T,
    parse: impl Fn(&str, &str) -> Result<T, SettingsError>,
) -> Result<Resolved<T>, SettingsError> {
    for (key, source) in chain {
        if let Some(raw) = settings.get(key) {
            return Ok(Resolved {
                value: parse(key, raw)?,
                source: *source,
                key: Some(key.clone()),
            });
        }
    }
    Ok(Resolved::default_value(default))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, SettingsError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(SettingsError::InvalidBoolean {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profiles
// ─────────────────────────────────────────────────────────────────────────────

/// Keystore configured for a profile. Only non-secret facts are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeystoreInfo {
    /// Configured keystore path.
    pub path: String,
    /// Whether a keystore password was present in the secure settings.
    pub has_password: bool,
}

/// Effective TLS configuration of one listener profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsProfile {
    /// Layer the profile belongs to.
    pub layer: NetworkLayer,
    /// Profile name (`default` for the implicit profile).
    pub name: String,
    /// Effective TLS enablement.
    pub ssl_enabled: Resolved<bool>,
    /// Effective client authentication mode.
    pub client_auth: Resolved<ClientAuth>,
    /// Keystore, when TLS is enabled and one is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystore: Option<KeystoreInfo>,
}

impl TlsProfile {
    /// Whether this is the implicit default profile.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_PROFILE
    }

    /// TLS is on and the listener requests a client certificate.
    #[must_use]
    pub const fn accepts_client_certificates(&self) -> bool {
        self.ssl_enabled.value && self.client_auth.value.requests_certificate()
    }
}

/// Resolved TLS configuration of a whole layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerTls {
    /// The layer.
    pub layer: NetworkLayer,
    /// The implicit default profile.
    pub default_profile: TlsProfile,
    /// Named profiles, ordered by name. Always empty for http.
    pub profiles: Vec<TlsProfile>,
}

impl LayerTls {
    /// The default profile followed by every named profile.
    pub fn all_profiles(&self) -> impl Iterator<Item = &TlsProfile> {
        std::iter::once(&self.default_profile).chain(self.profiles.iter())
    }

    /// First profile that accepts client certificates over TLS.
    #[must_use]
    pub fn satisfying_profile(&self) -> Option<&TlsProfile> {
        self.all_profiles()
            .find(|profile| profile.accepts_client_certificates())
    }

    /// Whether at least one profile accepts client certificates over TLS.
    #[must_use]
    pub fn requires_client_cert_auth(&self) -> bool {
        self.satisfying_profile().is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// Pure resolution of TLS settings from a [`Settings`] snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsProfileResolver;

impl TlsProfileResolver {
    /// Whether `layer` offers at least one TLS path that requests client
    /// certificates.
    ///
    /// # Errors
    /// Propagates any [`SettingsError`] hit while reading the settings.
    pub fn requires_client_cert_auth(
        settings: &Settings,
        layer: NetworkLayer,
    ) -> Result<bool, SettingsError> {
        Ok(Self::resolve_layer(settings, layer)?.requires_client_cert_auth())
    }

    /// Resolve the default profile and every named profile of `layer`.
    ///
    /// # Errors
    /// Returns [`SettingsError`] for malformed values, or when a keystore
    /// password must be read from secure settings that were already closed.
    pub fn resolve_layer(
        settings: &Settings,
        layer: NetworkLayer,
    ) -> Result<LayerTls, SettingsError> {
        let base_enabled = resolve_chain(
            settings,
            &ssl_enabled_chain(layer),
            false,
            parse_bool,
        )?;
        let base_client_auth = resolve_chain(
            settings,
            &client_auth_chain(layer),
            layer.default_client_auth(),
            ClientAuth::parse_setting,
        )?;

        let mut default_profile = None;
        let mut profiles = Vec::new();
        if layer.supports_profiles() {
            for (name, profile_settings) in settings.get_groups(TRANSPORT_PROFILES_PREFIX) {
                let profile = resolve_profile(
                    settings,
                    layer,
                    &name,
                    &profile_settings,
                    &base_enabled,
                    &base_client_auth,
                )?;
                if name == DEFAULT_PROFILE {
                    default_profile = Some(profile);
                } else {
                    profiles.push(profile);
                }
            }
        }

        let default_profile = match default_profile {
            Some(profile) => profile,
            None => {
                let keystore =
                    resolve_keystore(settings, layer.as_str(), None, base_enabled.value)?;
                TlsProfile {
                    layer,
                    name: DEFAULT_PROFILE.to_string(),
                    ssl_enabled: base_enabled,
                    client_auth: base_client_auth,
                    keystore,
                }
            }
        };
        log_profile(&default_profile);
        for profile in &profiles {
            log_profile(profile);
        }

        Ok(LayerTls {
            layer,
            default_profile,
            profiles,
        })
    }
}

fn ssl_enabled_chain(layer: NetworkLayer) -> Vec<(String, ValueSource)> {
    let mut chain = vec![(format!("{layer}.ssl.enabled"), ValueSource::Layer)];
    if layer == NetworkLayer::Transport {
        chain.push((LEGACY_SSL_ENABLED_KEY.to_string(), ValueSource::LegacyGlobal));
    }
    chain
}

fn client_auth_chain(layer: NetworkLayer) -> Vec<(String, ValueSource)> {
    vec![
        (
            format!("{layer}.ssl.client_authentication"),
            ValueSource::Layer,
        ),
        (GLOBAL_CLIENT_AUTH_KEY.to_string(), ValueSource::Global),
    ]
}

fn resolve_profile(
    settings: &Settings,
    layer: NetworkLayer,
    name: &str,
    profile_settings: &Settings,
    base_enabled: &Resolved<bool>,
    base_client_auth: &Resolved<ClientAuth>,
) -> Result<TlsProfile, SettingsError> {
    let scope = format!("{TRANSPORT_PROFILES_PREFIX}{name}");
    let ssl_enabled = match profile_settings.get("ssl.enabled") {
        Some(raw) => {
            let key = format!("{scope}.ssl.enabled");
            Resolved {
                value: parse_bool(&key, raw)?,
                source: ValueSource::Profile,
                key: Some(key),
            }
        }
        None => base_enabled.clone(),
    };
    let client_auth = match profile_settings.get("ssl.client_authentication") {
        Some(raw) => {
            let key = format!("{scope}.ssl.client_authentication");
            Resolved {
                value: ClientAuth::parse_setting(&key, raw)?,
                source: ValueSource::Profile,
                key: Some(key),
            }
        }
        None => base_client_auth.clone(),
    };
    let keystore = resolve_keystore(
        settings,
        layer.as_str(),
        Some(&scope),
        ssl_enabled.value,
    )?;

    Ok(TlsProfile {
        layer,
        name: name.to_string(),
        ssl_enabled,
        client_auth,
        keystore,
    })
}

/// Keystore for a profile, preferring the profile scope over the layer scope.
///
/// The keystore password is read from secure settings only when TLS is
/// enabled, so a released store fails the read instead of looking unset.
fn resolve_keystore(
    settings: &Settings,
    layer_scope: &str,
    profile_scope: Option<&str>,
    ssl_enabled: bool,
) -> Result<Option<KeystoreInfo>, SettingsError> {
    if !ssl_enabled {
        return Ok(None);
    }

    let scopes = profile_scope.into_iter().chain(std::iter::once(layer_scope));
    for scope in scopes {
        let Some(path) = settings.get(&format!("{scope}.ssl.keystore.path")) else {
            continue;
        };
        let password =
            settings.get_secure_string(&format!("{scope}.ssl.keystore.secure_password"))?;
        return Ok(Some(KeystoreInfo {
            path: path.to_string(),
            has_password: password.is_some_and(|p| !p.is_empty()),
        }));
    }
    Ok(None)
}

fn log_profile(profile: &TlsProfile) {
    tracing::debug!(
        layer = %profile.layer,
        profile = %profile.name,
        ssl_enabled = profile.ssl_enabled.value,
        ssl_enabled_source = %profile.ssl_enabled.source,
        client_auth = %profile.client_auth.value,
        client_auth_source = %profile.client_auth.source,
        "Resolved TLS profile"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Capability seam
// ─────────────────────────────────────────────────────────────────────────────

/// Answers "how is TLS configured for this layer".
pub trait TlsConfigSource {
    /// Resolved TLS configuration of `layer`.
    ///
    /// # Errors
    /// Returns [`SettingsError`] if the underlying settings cannot be read.
    fn layer(&self, layer: NetworkLayer) -> Result<LayerTls, SettingsError>;
}

/// Resolves from a settings snapshot every time it is asked.
#[derive(Debug, Clone, Copy)]
pub struct SettingsTlsSource<'a> {
    settings: &'a Settings,
}

impl<'a> SettingsTlsSource<'a> {
    /// Wrap a settings snapshot.
    #[must_use]
    pub const fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }
}

impl TlsConfigSource for SettingsTlsSource<'_> {
    fn layer(&self, layer: NetworkLayer) -> Result<LayerTls, SettingsError> {
        TlsProfileResolver::resolve_layer(self.settings, layer)
    }
}

/// TLS configuration resolved once, up front, for every layer.
///
/// Secure values are read during [`SslService::new`] and not retained, so a
/// service built before the secure store is released keeps answering after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslService {
    transport: LayerTls,
    http: LayerTls,
}

impl SslService {
    /// Resolve every layer from `settings`.
    ///
    /// # Errors
    /// Returns [`SettingsError`] if any layer fails to resolve.
    pub fn new(settings: &Settings) -> Result<Self, SettingsError> {
        Ok(Self {
            transport: TlsProfileResolver::resolve_layer(settings, NetworkLayer::Transport)?,
            http: TlsProfileResolver::resolve_layer(settings, NetworkLayer::Http)?,
        })
    }

    /// Borrow the resolved configuration of `layer`.
    #[must_use]
    pub const fn layer_tls(&self, layer: NetworkLayer) -> &LayerTls {
        match layer {
            NetworkLayer::Transport => &self.transport,
            NetworkLayer::Http => &self.http,
        }
    }
}

impl TlsConfigSource for SslService {
    fn layer(&self, layer: NetworkLayer) -> Result<LayerTls, SettingsError> {
        Ok(self.layer_tls(layer).clone())
    }
}
