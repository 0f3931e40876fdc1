//! Lease and token lifecycle manager for HashiCorp Vault credentials.
//!
//! Keeps one client token and a cache of dynamic credentials leases valid
//! under concurrent use: each access validates, extends or recreates the
//! cached value as needed. Wrapping tokens are resolved exactly once.

pub mod auth;
pub mod backend;
pub mod client;
pub mod clock;
pub mod confidentiality;
pub mod config;
pub mod credentials;
pub mod dynamic;
pub mod error;
pub mod lease;
pub mod manager;
mod secrets;
pub mod telemetry;

pub use auth::AuthManager;
pub use backend::{
    AuthGrant, GeneratedCredentials, KvVersion, LeaseGrant, LoginCredentials, SecretBackend,
    UnwrapTarget,
};
pub use client::VaultHttpClient;
pub use clock::{Clock, SystemClock};
pub use confidentiality::LogConfidentialityLevel;
pub use config::{
    AuthenticationConfig, CredentialsProviderConfig, LeaseRefreshMode, SecretValue, VaultConfig,
};
pub use credentials::CredentialsProvider;
pub use dynamic::{DynamicCredentials, DynamicCredentialsManager, LeaseKey};
pub use error::{VaultError, VaultResult};
pub use lease::{TimeLimited, Validity, VaultLease, VaultToken};
pub use manager::VaultLeaseManager;
