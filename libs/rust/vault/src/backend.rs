//! Secret backend abstraction.
//!
//! The managers never talk HTTP themselves; they consume this trait. Every
//! call returns structured data or a [`VaultError`] whose status code tells an
//! invalidated credential apart from a fatal failure.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::VaultResult;

/// Material presented to the backend on login.
#[derive(Debug, Clone)]
pub enum LoginCredentials {
    /// App-role role id and secret id
    AppRole {
        /// Role id
        role_id: String,
        /// Secret id
        secret_id: SecretString,
    },
    /// Username and password
    UserPass {
        /// Username
        username: String,
        /// Password
        password: SecretString,
    },
    /// Kubernetes service-account JWT
    Kubernetes {
        /// Vault role bound to the service account
        role: String,
        /// Service-account JWT
        jwt: SecretString,
        /// Mount path of the kubernetes auth method
        auth_mount_path: String,
    },
}

impl LoginCredentials {
    /// Auth method name, for logs.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::AppRole { .. } => "approle",
            Self::UserPass { .. } => "userpass",
            Self::Kubernetes { .. } => "kubernetes",
        }
    }
}

/// Token issued by login or renew-self.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    /// Client token
    pub client_token: SecretString,
    /// Whether the token can be renewed
    pub renewable: bool,
    /// Token lifetime in seconds
    pub lease_duration_secs: i64,
}

/// Lease metadata returned by generate or renew calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseGrant {
    /// Lease id
    pub lease_id: String,
    /// Whether the lease can be renewed
    pub renewable: bool,
    /// Lease lifetime in seconds
    pub lease_duration_secs: i64,
}

/// Freshly generated dynamic credentials.
#[derive(Debug, Clone)]
pub struct GeneratedCredentials {
    /// Lease governing the credentials
    pub lease: LeaseGrant,
    /// Generated username
    pub username: String,
    /// Generated password
    pub password: SecretString,
}

/// KV secret engine version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KvVersion {
    /// Unversioned engine
    V1,
    /// Versioned engine
    #[default]
    V2,
}

impl KvVersion {
    /// Parse the numeric engine version.
    #[must_use]
    pub const fn from_number(version: u8) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }
}

/// What a wrapping token is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnwrapTarget {
    /// A client token
    ClientToken,
    /// An app-role secret id
    AppRoleSecretId,
    /// A KV secret holding a `password` key
    UserPassPassword(KvVersion),
}

impl fmt::Display for UnwrapTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToken => f.write_str("client token"),
            Self::AppRoleSecretId => f.write_str("app role secret id"),
            Self::UserPassPassword(_) => f.write_str("userpass password"),
        }
    }
}

/// Network operations against the secret backend.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Authenticate and obtain a new client token.
    async fn login(&self, credentials: &LoginCredentials) -> VaultResult<AuthGrant>;

    /// Check that a client token is still accepted.
    async fn lookup_self(&self, client_token: &SecretString) -> VaultResult<()>;

    /// Extend a client token.
    async fn renew_self(&self, client_token: &SecretString) -> VaultResult<AuthGrant>;

    /// Check that a lease is still known to the backend.
    async fn lookup_lease(&self, client_token: &SecretString, lease_id: &str) -> VaultResult<()>;

    /// Extend a lease.
    async fn renew_lease(
        &self,
        client_token: &SecretString,
        lease_id: &str,
    ) -> VaultResult<LeaseGrant>;

    /// Generate dynamic credentials at `{mount}/{request_path}/{role}`.
    async fn generate_credentials(
        &self,
        client_token: &SecretString,
        mount: &str,
        request_path: &str,
        role: &str,
    ) -> VaultResult<GeneratedCredentials>;

    /// Resolve a single-use wrapping token.
    async fn unwrap(
        &self,
        wrapping_token: &SecretString,
        target: UnwrapTarget,
    ) -> VaultResult<SecretString>;

    /// Read a KV secret as string values.
    async fn read_kv(
        &self,
        client_token: &SecretString,
        mount: &str,
        path: &str,
        version: KvVersion,
    ) -> VaultResult<HashMap<String, String>>;
}
