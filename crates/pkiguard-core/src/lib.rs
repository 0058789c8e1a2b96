//! pkiguard-core: startup validation for certificate-based authentication.
//!
//! A PKI realm authenticates callers by the certificate they present over TLS.
//! If no listener requests a client certificate, the realm can never
//! authenticate anyone while still looking enforced. This crate refuses that
//! configuration before the node starts serving.
//!
//! # Architecture
//!
//! ```text
//! Settings ─┬─> RealmCatalog ────────> enabled PKI realms
//!           └─> TlsProfileResolver ──> per-layer, per-profile TLS
//!                        │
//!                        v
//!               PkiRealmBootstrapCheck ──> BootstrapCheckResult
//! ```
//!
//! # Modules
//!
//! - `settings`: Read-only settings snapshot and closable secure settings
//! - `config`: Loading settings from TOML, YAML or JSON files
//! - `realms`: Enumeration of configured authentication realms
//! - `tls`: Resolution of effective TLS settings per layer and profile
//! - `bootstrap`: Bootstrap check seam and the PKI realm check
//! - `error`: Settings and configuration errors
//!
//! # Example
//!
//! ```rust
//! use pkiguard_core::{BootstrapCheck, BootstrapContext, PkiRealmBootstrapCheck, Settings};
//!
//! let settings = Settings::builder()
//!     .put("authc.realms.pki1.type", "pki")
//!     .put("transport.ssl.enabled", true)
//!     .build();
//!
//! let check = PkiRealmBootstrapCheck::for_settings(&settings);
//! let result = check.check(&BootstrapContext::new(&settings)).unwrap();
//! assert!(result.is_success());
//! ```

#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod realms;
pub mod settings;
pub mod tls;

pub use bootstrap::{
    BootstrapCheck, BootstrapCheckResult, BootstrapContext, PkiCheckReport,
    PkiRealmBootstrapCheck, SatisfiedBy,
};
pub use config::{ConfigFormat, apply_overrides, load_settings, parse_settings};
pub use error::{ConfigError, Error, Result, SettingsError};
pub use realms::{PKI_REALM_TYPE, RealmCatalog, RealmConfig};
pub use settings::{SecureSettings, SecureString, Settings, SettingsBuilder};
pub use tls::{
    ClientAuth, KeystoreInfo, LayerTls, NetworkLayer, Resolved, SettingsTlsSource, SslService,
    TlsConfigSource, TlsProfile, TlsProfileResolver, ValueSource,
};
