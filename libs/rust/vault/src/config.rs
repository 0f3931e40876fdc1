//! Vault lease manager configuration.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::KvVersion;
use crate::confidentiality::LogConfidentialityLevel;
use crate::error::{VaultError, VaultResult};

/// Default kubernetes service account token location.
pub const DEFAULT_KUBERNETES_JWT_TOKEN_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Default mount of the kubernetes auth method.
pub const DEFAULT_KUBERNETES_AUTH_MOUNT_PATH: &str = "auth/kubernetes";

/// Mount used for database credentials providers.
pub const DATABASE_MOUNT: &str = "database";

/// Request path used for database and default dynamic credentials.
pub const DEFAULT_REQUEST_PATH: &str = "creds";

/// Default key read from a KV secret by a credentials provider.
pub const DEFAULT_KV_KEY: &str = "password";

/// A secret supplied either directly or as a wrapping token.
#[derive(Debug, Clone)]
pub enum SecretValue {
    /// The secret itself
    Plain(SecretString),
    /// A single-use wrapping token that resolves to the secret
    Wrapped(SecretString),
}

impl SecretValue {
    fn is_empty(&self) -> bool {
        match self {
            Self::Plain(s) | Self::Wrapped(s) => s.expose_secret().is_empty(),
        }
    }
}

/// How the manager authenticates against Vault.
#[derive(Debug, Clone)]
pub enum AuthenticationConfig {
    /// A fixed client token, used as is
    ClientToken(SecretValue),
    /// App-role login
    AppRole {
        /// Role id
        role_id: String,
        /// Secret id, possibly wrapped
        secret_id: SecretValue,
    },
    /// Userpass login
    UserPass {
        /// Username
        username: String,
        /// Password, possibly wrapped
        password: SecretValue,
    },
    /// Kubernetes service-account login
    Kubernetes {
        /// Vault role bound to the service account
        role: String,
        /// File holding the service-account JWT
        jwt_token_path: PathBuf,
        /// Mount of the kubernetes auth method
        auth_mount_path: String,
    },
}

impl AuthenticationConfig {
    /// Kubernetes login with the default token path and auth mount.
    #[must_use]
    pub fn kubernetes(role: impl Into<String>) -> Self {
        Self::Kubernetes {
            role: role.into(),
            jwt_token_path: PathBuf::from(DEFAULT_KUBERNETES_JWT_TOKEN_PATH),
            auth_mount_path: DEFAULT_KUBERNETES_AUTH_MOUNT_PATH.to_string(),
        }
    }

    fn validate(&self) -> VaultResult<()> {
        let missing = match self {
            Self::ClientToken(token) => token.is_empty().then_some("client token"),
            Self::AppRole { role_id, secret_id } => {
                if role_id.is_empty() {
                    Some("app role role id")
                } else {
                    secret_id.is_empty().then_some("app role secret id")
                }
            }
            Self::UserPass { username, password } => {
                if username.is_empty() {
                    Some("userpass username")
                } else {
                    password.is_empty().then_some("userpass password")
                }
            }
            Self::Kubernetes { role, .. } => role.is_empty().then_some("kubernetes role"),
        };
        match missing {
            Some(what) => Err(VaultError::invalid_config(format!("{what} must not be empty"))),
            None => Ok(()),
        }
    }
}

/// How a named credentials provider resolves its credentials.
///
/// Resolution order: database role, then generic dynamic role, then KV path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsProviderConfig {
    /// Role under the `database` mount
    pub database_credentials_role: Option<String>,
    /// Role for generic dynamic credentials
    pub credentials_role: Option<String>,
    /// Mount for generic dynamic credentials (default `database`)
    pub credentials_mount: Option<String>,
    /// Request path for generic dynamic credentials (default `creds`)
    pub credentials_request_path: Option<String>,
    /// KV secret path holding a static password
    pub kv_path: Option<String>,
    /// Key within the KV secret (default `password`)
    pub kv_key: String,
}

impl Default for CredentialsProviderConfig {
    fn default() -> Self {
        Self {
            database_credentials_role: None,
            credentials_role: None,
            credentials_mount: None,
            credentials_request_path: None,
            kv_path: None,
            kv_key: DEFAULT_KV_KEY.to_string(),
        }
    }
}

impl CredentialsProviderConfig {
    /// Database dynamic credentials for `role`.
    #[must_use]
    pub fn database(role: impl Into<String>) -> Self {
        Self {
            database_credentials_role: Some(role.into()),
            ..Self::empty()
        }
    }

    /// Generic dynamic credentials at `{mount}/{request_path}/{role}`.
    #[must_use]
    pub fn dynamic(
        mount: impl Into<String>,
        request_path: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            credentials_role: Some(role.into()),
            credentials_mount: Some(mount.into()),
            credentials_request_path: Some(request_path.into()),
            ..Self::empty()
        }
    }

    /// Static password stored in a KV secret.
    #[must_use]
    pub fn kv(path: impl Into<String>) -> Self {
        Self {
            kv_path: Some(path.into()),
            ..Self::empty()
        }
    }

    /// Read `key` instead of `password` from the KV secret.
    #[must_use]
    pub fn with_kv_key(mut self, key: impl Into<String>) -> Self {
        self.kv_key = key.into();
        self
    }

    /// No resolution strategy set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Refresh policy for concurrent callers of the same lease key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaseRefreshMode {
    /// Each caller validates, extends or creates on its own; last writer wins
    #[default]
    Concurrent,
    /// Callers for the same key are serialized so one refresh serves all
    SingleFlight,
}

/// Vault lease manager configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address
    pub addr: String,
    /// Request timeout
    pub timeout: Duration,
    /// Window before expiry in which renewable tokens and leases get extended
    pub renew_grace_period: Duration,
    /// Maximum wait for the unwrap gate
    pub unwrap_gate_timeout: Duration,
    /// How much secret material appears in logs
    pub log_confidentiality_level: LogConfidentialityLevel,
    /// Authentication method
    pub authentication: AuthenticationConfig,
    /// Mount of the KV engine used by credentials providers
    pub kv_secret_engine_mount_path: String,
    /// Version of the KV engine used by credentials providers
    pub kv_secret_engine_version: KvVersion,
    /// Named credentials providers
    pub credentials_provider: HashMap<String, CredentialsProviderConfig>,
    /// Same-key lease refresh policy
    pub lease_refresh: LeaseRefreshMode,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: std::env::var("VAULT_ADDR")
                .unwrap_or_else(|_| "https://vault.vault.svc:8200".to_string()),
            timeout: Duration::from_secs(30),
            renew_grace_period: Duration::from_secs(3600),
            unwrap_gate_timeout: Duration::from_secs(10),
            log_confidentiality_level: LogConfidentialityLevel::Medium,
            authentication: AuthenticationConfig::kubernetes(
                std::env::var("VAULT_ROLE").unwrap_or_default(),
            ),
            kv_secret_engine_mount_path: "secret".to_string(),
            kv_secret_engine_version: KvVersion::V2,
            credentials_provider: HashMap::new(),
            lease_refresh: LeaseRefreshMode::Concurrent,
        }
    }
}

impl VaultConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(addr: impl Into<String>, authentication: AuthenticationConfig) -> Self {
        Self {
            addr: addr.into(),
            authentication,
            ..Default::default()
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set renew grace period.
    #[must_use]
    pub const fn with_renew_grace_period(mut self, grace_period: Duration) -> Self {
        self.renew_grace_period = grace_period;
        self
    }

    /// Set unwrap gate timeout.
    #[must_use]
    pub const fn with_unwrap_gate_timeout(mut self, timeout: Duration) -> Self {
        self.unwrap_gate_timeout = timeout;
        self
    }

    /// Set log confidentiality level.
    #[must_use]
    pub const fn with_log_confidentiality_level(mut self, level: LogConfidentialityLevel) -> Self {
        self.log_confidentiality_level = level;
        self
    }

    /// Set the KV engine used by credentials providers.
    #[must_use]
    pub fn with_kv_secret_engine(
        mut self,
        mount_path: impl Into<String>,
        version: KvVersion,
    ) -> Self {
        self.kv_secret_engine_mount_path = mount_path.into();
        self.kv_secret_engine_version = version;
        self
    }

    /// Register a named credentials provider.
    #[must_use]
    pub fn with_credentials_provider(
        mut self,
        name: impl Into<String>,
        provider: CredentialsProviderConfig,
    ) -> Self {
        self.credentials_provider.insert(name.into(), provider);
        self
    }

    /// Set same-key lease refresh policy.
    #[must_use]
    pub const fn with_lease_refresh(mut self, mode: LeaseRefreshMode) -> Self {
        self.lease_refresh = mode;
        self
    }

    /// Check the configuration before building a manager.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] for an unparsable address, a zero
    /// unwrap gate timeout, or empty authentication parameters.
    pub fn validate(&self) -> VaultResult<()> {
        url::Url::parse(&self.addr).map_err(|e| {
            VaultError::invalid_config(format!("invalid Vault address {}: {e}", self.addr))
        })?;
        if self.unwrap_gate_timeout.is_zero() {
            return Err(VaultError::invalid_config("unwrap gate timeout must be positive"));
        }
        if self.kv_secret_engine_mount_path.is_empty() {
            return Err(VaultError::invalid_config("kv secret engine mount path must not be empty"));
        }
        self.authentication.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approle() -> AuthenticationConfig {
        AuthenticationConfig::AppRole {
            role_id: "role".to_string(),
            secret_id: SecretValue::Plain(SecretString::from("secret")),
        }
    }

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.renew_grace_period, Duration::from_secs(3600));
        assert_eq!(config.unwrap_gate_timeout, Duration::from_secs(10));
        assert_eq!(config.log_confidentiality_level, LogConfidentialityLevel::Medium);
        assert_eq!(config.lease_refresh, LeaseRefreshMode::Concurrent);
        assert!(matches!(config.authentication, AuthenticationConfig::Kubernetes { .. }));
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let config = VaultConfig::new("http://127.0.0.1:8200", approle());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let config = VaultConfig::new("not a url", approle());
        assert!(matches!(config.validate(), Err(VaultError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_empty_auth() {
        let config = VaultConfig::new(
            "http://127.0.0.1:8200",
            AuthenticationConfig::UserPass {
                username: "bob".to_string(),
                password: SecretValue::Plain(SecretString::from("")),
            },
        );
        assert!(matches!(config.validate(), Err(VaultError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_gate_timeout() {
        let config = VaultConfig::new("http://127.0.0.1:8200", approle())
            .with_unwrap_gate_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_provider_constructors() {
        let db = CredentialsProviderConfig::database("mydbrole");
        assert_eq!(db.database_credentials_role.as_deref(), Some("mydbrole"));
        assert_eq!(db.kv_key, DEFAULT_KV_KEY);

        let kv = CredentialsProviderConfig::kv("config/app").with_kv_key("db-password");
        assert_eq!(kv.kv_path.as_deref(), Some("config/app"));
        assert_eq!(kv.kv_key, "db-password");
    }

    #[test]
    fn test_credentials_provider_default_reads_password_key() {
        let provider = CredentialsProviderConfig::default();
        assert_eq!(provider.kv_key, DEFAULT_KV_KEY);
        assert_eq!(provider, CredentialsProviderConfig::empty());
    }
}
