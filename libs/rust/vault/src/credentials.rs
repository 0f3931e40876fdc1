//! Named credentials providers.
//!
//! Maps a provider name to its configured resolution strategy and returns a
//! flat property map, as expected by connection pools.

use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::auth::AuthManager;
use crate::backend::{KvVersion, SecretBackend};
use crate::config::{CredentialsProviderConfig, DATABASE_MOUNT, DEFAULT_REQUEST_PATH, VaultConfig};
use crate::dynamic::{DynamicCredentials, DynamicCredentialsManager};
use crate::error::{VaultError, VaultResult};

/// Username property.
pub const USER_PROPERTY_NAME: &str = "user";

/// Password property.
pub const PASSWORD_PROPERTY_NAME: &str = "password";

/// Lease expiry property (RFC 3339), present for dynamic credentials.
pub const EXPIRATION_TIMESTAMP_PROPERTY_NAME: &str = "expiration-timestamp";

/// Routes credential requests by provider name.
pub struct CredentialsProvider {
    providers: HashMap<String, CredentialsProviderConfig>,
    kv_mount: String,
    kv_version: KvVersion,
    auth: Arc<AuthManager>,
    dynamic: Arc<DynamicCredentialsManager>,
    backend: Arc<dyn SecretBackend>,
}

impl CredentialsProvider {
    /// Create a provider over the configured names.
    #[must_use]
    pub fn new(
        config: &VaultConfig,
        auth: Arc<AuthManager>,
        dynamic: Arc<DynamicCredentialsManager>,
        backend: Arc<dyn SecretBackend>,
    ) -> Self {
        Self {
            providers: config.credentials_provider.clone(),
            kv_mount: config.kv_secret_engine_mount_path.clone(),
            kv_version: config.kv_secret_engine_version,
            auth,
            dynamic,
            backend,
        }
    }

    /// Credentials for the provider called `name`.
    ///
    /// Dynamic providers yield `user`, `password` and `expiration-timestamp`;
    /// KV providers yield `password` only.
    ///
    /// # Errors
    ///
    /// [`VaultError::UnknownProvider`] for an unconfigured name,
    /// [`VaultError::MisconfiguredProvider`] when no strategy is set, and any
    /// error from the underlying read.
    #[instrument(skip(self))]
    pub async fn get_credentials(&self, name: &str) -> VaultResult<HashMap<String, String>> {
        let config = self
            .providers
            .get(name)
            .ok_or_else(|| VaultError::UnknownProvider(name.to_string()))?;

        if let Some(role) = &config.database_credentials_role {
            debug!(provider = name, role = %role, "resolving database credentials");
            let creds = self.dynamic.get_database_credentials(role).await?;
            return Ok(dynamic_properties(&creds));
        }

        if let Some(role) = &config.credentials_role {
            let mount = config.credentials_mount.as_deref().unwrap_or(DATABASE_MOUNT);
            let request_path = config
                .credentials_request_path
                .as_deref()
                .unwrap_or(DEFAULT_REQUEST_PATH);
            debug!(
                provider = name,
                mount,
                request_path,
                role = %role,
                "resolving dynamic credentials"
            );
            let creds = self
                .dynamic
                .get_dynamic_credentials(mount, request_path, role)
                .await?;
            return Ok(dynamic_properties(&creds));
        }

        if let Some(path) = &config.kv_path {
            debug!(provider = name, path = %path, "resolving kv credentials");
            let client_token = self.auth.get_client_token().await?;
            let secret = self
                .backend
                .read_kv(&client_token, &self.kv_mount, path, self.kv_version)
                .await?;
            let password = secret
                .get(&config.kv_key)
                .ok_or_else(|| VaultError::not_found(format!("{path} (key {})", config.kv_key)))?;
            return Ok(HashMap::from([(PASSWORD_PROPERTY_NAME.to_string(), password.clone())]));
        }

        Err(VaultError::MisconfiguredProvider(format!(
            "one of database-credentials-role, credentials-role or kv-path is required \
             on credentials provider {name}"
        )))
    }
}

fn dynamic_properties(creds: &DynamicCredentials) -> HashMap<String, String> {
    HashMap::from([
        (USER_PROPERTY_NAME.to_string(), creds.username.clone()),
        (
            PASSWORD_PROPERTY_NAME.to_string(),
            creds.password.expose_secret().to_string(),
        ),
        (
            EXPIRATION_TIMESTAMP_PROPERTY_NAME.to_string(),
            creds.expires_at.to_rfc3339(),
        ),
    ])
}
