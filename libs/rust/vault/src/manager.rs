//! Composition root.

use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::AuthManager;
use crate::backend::SecretBackend;
use crate::client::VaultHttpClient;
use crate::clock::{Clock, SystemClock};
use crate::config::VaultConfig;
use crate::credentials::CredentialsProvider;
use crate::dynamic::{DynamicCredentials, DynamicCredentialsManager};
use crate::error::VaultResult;

/// Auth manager, dynamic credentials manager and credentials provider wired
/// over one backend.
///
/// Owned by the application; clone the `Arc`s it hands out to share it.
pub struct VaultLeaseManager {
    auth: Arc<AuthManager>,
    dynamic: Arc<DynamicCredentialsManager>,
    credentials: CredentialsProvider,
}

impl VaultLeaseManager {
    /// Wire the managers over the Vault HTTP API.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration or HTTP client.
    pub fn connect(config: &VaultConfig) -> VaultResult<Self> {
        config.validate()?;
        let backend = Arc::new(VaultHttpClient::new(config)?);
        Self::with_clock(config, backend, Arc::new(SystemClock))
    }

    /// Wire the managers over `backend` with the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::InvalidConfig`] for an invalid configuration.
    pub fn new(config: &VaultConfig, backend: Arc<dyn SecretBackend>) -> VaultResult<Self> {
        Self::with_clock(config, backend, Arc::new(SystemClock))
    }

    /// Wire the managers over `backend` and `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::InvalidConfig`] for an invalid configuration.
    pub fn with_clock(
        config: &VaultConfig,
        backend: Arc<dyn SecretBackend>,
        clock: Arc<dyn Clock>,
    ) -> VaultResult<Self> {
        config.validate()?;

        let auth = Arc::new(AuthManager::new(config, Arc::clone(&backend), Arc::clone(&clock)));
        let dynamic = Arc::new(DynamicCredentialsManager::new(
            config,
            Arc::clone(&auth),
            Arc::clone(&backend),
            clock,
        ));
        let credentials =
            CredentialsProvider::new(config, Arc::clone(&auth), Arc::clone(&dynamic), backend);

        Ok(Self {
            auth,
            dynamic,
            credentials,
        })
    }

    /// Token lifecycle owner.
    #[must_use]
    pub fn auth(&self) -> Arc<AuthManager> {
        Arc::clone(&self.auth)
    }

    /// Dynamic credentials owner.
    #[must_use]
    pub fn dynamic_credentials(&self) -> Arc<DynamicCredentialsManager> {
        Arc::clone(&self.dynamic)
    }

    /// See [`AuthManager::get_client_token`].
    ///
    /// # Errors
    ///
    /// Same as [`AuthManager::get_client_token`].
    pub async fn get_client_token(&self) -> VaultResult<SecretString> {
        self.auth.get_client_token().await
    }

    /// See [`DynamicCredentialsManager::get_dynamic_credentials`].
    ///
    /// # Errors
    ///
    /// Same as [`DynamicCredentialsManager::get_dynamic_credentials`].
    pub async fn get_dynamic_credentials(
        &self,
        mount: &str,
        request_path: &str,
        role: &str,
    ) -> VaultResult<DynamicCredentials> {
        self.dynamic
            .get_dynamic_credentials(mount, request_path, role)
            .await
    }

    /// See [`CredentialsProvider::get_credentials`].
    ///
    /// # Errors
    ///
    /// Same as [`CredentialsProvider::get_credentials`].
    pub async fn get_credentials(&self, provider: &str) -> VaultResult<HashMap<String, String>> {
        self.credentials.get_credentials(provider).await
    }
}
