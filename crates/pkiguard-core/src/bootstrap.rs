//! Bootstrap checks and the PKI realm check.
//!
//! A bootstrap check runs once before the node starts serving. A failed check
//! is returned as [`BootstrapCheckResult::Failure`]; an `Err` means the
//! settings themselves could not be read and startup must abort regardless.

use serde::Serialize;

use crate::Result;
use crate::realms::{RealmCatalog, RealmConfig};
use crate::settings::Settings;
use crate::tls::{LayerTls, NetworkLayer, SettingsTlsSource, TlsConfigSource};

// ─────────────────────────────────────────────────────────────────────────────
// Check seam
// ─────────────────────────────────────────────────────────────────────────────

/// What a bootstrap check gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapContext<'a> {
    settings: &'a Settings,
}

impl<'a> BootstrapContext<'a> {
    /// Context over a settings snapshot.
    #[must_use]
    pub const fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// The node settings.
    #[must_use]
    pub const fn settings(&self) -> &'a Settings {
        self.settings
    }
}

/// Outcome of a bootstrap check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BootstrapCheckResult {
    /// The node may start.
    Success,
    /// The node must not start.
    Failure {
        /// What is wrong and how to fix it.
        message: String,
    },
}

impl BootstrapCheckResult {
    /// Build a failure.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Whether the check passed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the check failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure { message } => Some(message.as_str()),
        }
    }
}

/// A single validation run before the node begins serving.
pub trait BootstrapCheck {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Run the check.
    ///
    /// # Errors
    /// Returns an error only when settings cannot be read.
    fn check(&self, context: &BootstrapContext<'_>) -> Result<BootstrapCheckResult>;

    /// Whether the check applies even in development mode.
    fn always_enforce(&self) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PKI realm check
// ─────────────────────────────────────────────────────────────────────────────

/// Which listener gives the PKI realms a usable path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SatisfiedBy {
    /// Layer of the satisfying profile.
    pub layer: NetworkLayer,
    /// Name of the satisfying profile.
    pub profile: String,
}

/// Everything the PKI realm check looked at, and what it decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PkiCheckReport {
    /// Enabled PKI realms.
    pub realms: Vec<RealmConfig>,
    /// Resolved TLS per layer. Empty when no PKI realm is enabled.
    pub layers: Vec<LayerTls>,
    /// First satisfying listener, transport before http.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfied_by: Option<SatisfiedBy>,
    /// Check outcome.
    pub result: BootstrapCheckResult,
}

/// Refuses to start a node that has an enabled PKI realm but no TLS listener
/// requesting client certificates.
#[derive(Debug, Clone)]
pub struct PkiRealmBootstrapCheck<S> {
    source: S,
}

impl<'a> PkiRealmBootstrapCheck<SettingsTlsSource<'a>> {
    /// Check that resolves TLS lazily from `settings`.
    #[must_use]
    pub const fn for_settings(settings: &'a Settings) -> Self {
        Self::new(SettingsTlsSource::new(settings))
    }
}

impl<S: TlsConfigSource> PkiRealmBootstrapCheck<S> {
    /// Check over any TLS configuration source.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Run the check and keep the details.
    ///
    /// # Errors
    /// Propagates settings read failures, including reads of released secure
    /// settings. These are never reported as a pass.
    pub fn evaluate(&self, settings: &Settings) -> Result<PkiCheckReport> {
        let realms = RealmCatalog::enabled_pki_realms(settings)?;
        if realms.is_empty() {
            tracing::debug!("No enabled PKI realm; nothing to check");
            return Ok(PkiCheckReport {
                realms,
                layers: Vec::new(),
                satisfied_by: None,
                result: BootstrapCheckResult::Success,
            });
        }

        // Both layers resolve even when the first one passes so that read
        // failures always surface.
        let layers = NetworkLayer::ALL
            .iter()
            .map(|layer| self.source.layer(*layer))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let satisfied_by = layers.iter().find_map(|tls| {
            tls.satisfying_profile().map(|profile| SatisfiedBy {
                layer: tls.layer,
                profile: profile.name.clone(),
            })
        });

        let result = match &satisfied_by {
            Some(by) => {
                tracing::info!(
                    layer = %by.layer,
                    profile = %by.profile,
                    realms = realms.len(),
                    "PKI realm check passed"
                );
                BootstrapCheckResult::Success
            }
            None => {
                let message = failure_message(&realms);
                tracing::warn!(realms = realms.len(), "{message}");
                BootstrapCheckResult::failure(message)
            }
        };

        Ok(PkiCheckReport {
            realms,
            layers,
            satisfied_by,
            result,
        })
    }
}

impl<S: TlsConfigSource> BootstrapCheck for PkiRealmBootstrapCheck<S> {
    fn name(&self) -> &'static str {
        "pki_realm"
    }

    fn check(&self, context: &BootstrapContext<'_>) -> Result<BootstrapCheckResult> {
        Ok(self.evaluate(context.settings())?.result)
    }
}

fn failure_message(realms: &[RealmConfig]) -> String {
    let names = realms
        .iter()
        .map(|realm| realm.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "PKI realm [{names}] is enabled but cannot authenticate anyone: no transport profile \
         or http listener has TLS enabled with client authentication set to [required] or \
         [optional]. Enable transport.ssl.enabled or http.ssl.enabled with a \
         client_authentication of required or optional, or disable the realm with \
         authc.realms.<name>.enabled=false"
    )
}
