//! Dynamic credentials cache.
//!
//! One lease per `(mount, request path, role)`. Each access validates the
//! cached lease, extends it inside the grace window, and generates new
//! credentials when the lease is gone, expired or too short. Every backend call
//! uses the client token handed out by the [`AuthManager`].

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::auth::AuthManager;
use crate::backend::SecretBackend;
use crate::clock::Clock;
use crate::confidentiality::LogConfidentialityLevel;
use crate::config::{DATABASE_MOUNT, DEFAULT_REQUEST_PATH, LeaseRefreshMode, VaultConfig};
use crate::error::VaultResult;
use crate::lease::{TimeLimited, Validity, VaultLease};

/// Cache key of a dynamic credentials lease.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseKey {
    /// Secret engine mount
    pub mount: String,
    /// Path under the mount, usually `creds`
    pub request_path: String,
    /// Role the credentials are generated for
    pub role: String,
}

impl LeaseKey {
    /// Build a key.
    #[must_use]
    pub fn new(
        mount: impl Into<String>,
        request_path: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            mount: mount.into(),
            request_path: request_path.into(),
            role: role.into(),
        }
    }
}

/// Credentials handed to callers.
#[derive(Debug, Clone)]
pub struct DynamicCredentials {
    /// Generated username
    pub username: String,
    /// Generated password
    pub password: SecretString,
    /// Lease governing the credentials
    pub lease_id: String,
    /// When the lease runs out
    pub expires_at: DateTime<Utc>,
}

impl From<&VaultLease> for DynamicCredentials {
    fn from(lease: &VaultLease) -> Self {
        Self {
            username: lease.username().to_string(),
            password: lease.password().clone(),
            lease_id: lease.lease_id().to_string(),
            expires_at: lease.lifetime.expire_instant(),
        }
    }
}

/// Owner of the dynamic credentials leases.
pub struct DynamicCredentialsManager {
    auth: Arc<AuthManager>,
    backend: Arc<dyn SecretBackend>,
    clock: Arc<dyn Clock>,
    renew_grace_period: Duration,
    confidentiality: LogConfidentialityLevel,
    refresh_mode: LeaseRefreshMode,
    leases: RwLock<HashMap<LeaseKey, Arc<VaultLease>>>,
    refresh_locks: Mutex<HashMap<LeaseKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl DynamicCredentialsManager {
    /// Create a manager with an empty cache.
    #[must_use]
    pub fn new(
        config: &VaultConfig,
        auth: Arc<AuthManager>,
        backend: Arc<dyn SecretBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            auth,
            backend,
            clock,
            renew_grace_period: config.renew_grace_period,
            confidentiality: config.log_confidentiality_level,
            refresh_mode: config.lease_refresh,
            leases: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return usable credentials for `{mount}/{request_path}/{role}`.
    ///
    /// In [`LeaseRefreshMode::Concurrent`] callers racing on the same key each
    /// refresh independently and the last stored lease wins. In
    /// [`LeaseRefreshMode::SingleFlight`] they are serialized per key, so the
    /// first refresh is reused by the callers queued behind it.
    ///
    /// # Errors
    ///
    /// Propagates client token failures and backend errors other than a 400
    /// on the lease lookup, which only triggers regeneration.
    #[instrument(skip(self))]
    pub async fn get_dynamic_credentials(
        &self,
        mount: &str,
        request_path: &str,
        role: &str,
    ) -> VaultResult<DynamicCredentials> {
        let key = LeaseKey::new(mount, request_path, role);

        let _refresh_guard = match self.refresh_mode {
            LeaseRefreshMode::SingleFlight => Some(self.refresh_lock(&key).lock_owned().await),
            LeaseRefreshMode::Concurrent => None,
        };

        let client_token = self.auth.get_client_token().await?;
        let lease = self.refresh(&client_token, &key).await?;
        Ok(DynamicCredentials::from(lease.as_ref()))
    }

    /// Database credentials for `role` (mount `database`, path `creds`).
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_dynamic_credentials`].
    pub async fn get_database_credentials(&self, role: &str) -> VaultResult<DynamicCredentials> {
        self.get_dynamic_credentials(DATABASE_MOUNT, DEFAULT_REQUEST_PATH, role)
            .await
    }

    /// Lease currently cached for `key`, without any validation.
    #[must_use]
    pub fn cached_lease(&self, key: &LeaseKey) -> Option<Arc<VaultLease>> {
        self.leases.read().get(key).cloned()
    }

    async fn refresh(
        &self,
        client_token: &SecretString,
        key: &LeaseKey,
    ) -> VaultResult<Arc<VaultLease>> {
        let grace = self.renew_grace_period;

        let mut lease = match self.cached_lease(key) {
            Some(cached) => match self.validate(client_token, &cached).await? {
                Validity::Valid => Some(cached),
                Validity::Invalid => None,
            },
            None => None,
        };

        let renewable = lease
            .clone()
            .filter(|l| l.lifetime.should_extend(self.clock.now(), grace));
        if let Some(held) = renewable {
            lease = Some(Arc::new(self.extend(client_token, &held).await?));
        }

        let now = self.clock.now();
        let lease = match lease {
            Some(l) if !l.lifetime.is_expired(now) && !l.lifetime.expires_soon(grace) => l,
            _ => Arc::new(self.create(client_token, key).await?),
        };

        self.leases.write().insert(key.clone(), Arc::clone(&lease));
        Ok(lease)
    }

    async fn validate(
        &self,
        client_token: &SecretString,
        lease: &VaultLease,
    ) -> VaultResult<Validity> {
        match self
            .backend
            .lookup_lease(client_token, lease.lease_id())
            .await
        {
            Ok(()) => Ok(Validity::Valid),
            Err(e) if e.is_bad_request() => {
                debug!(
                    lease_id = %self.confidentiality.mask_lease_id(lease.lease_id()),
                    "lease has become invalid"
                );
                Ok(Validity::Invalid)
            }
            Err(e) => Err(e),
        }
    }

    async fn extend(
        &self,
        client_token: &SecretString,
        lease: &VaultLease,
    ) -> VaultResult<VaultLease> {
        let grant = self
            .backend
            .renew_lease(client_token, lease.lease_id())
            .await?;
        let lifetime =
            TimeLimited::new(self.clock.now(), grant.renewable, grant.lease_duration_secs)?;
        let extended = lease.extended(grant.lease_id, lifetime);
        extended
            .lifetime
            .lease_duration_sanity_check("dynamic credentials", self.renew_grace_period);
        debug!(lease = %extended.confidential(self.confidentiality), "extended lease");
        Ok(extended)
    }

    async fn create(&self, client_token: &SecretString, key: &LeaseKey) -> VaultResult<VaultLease> {
        let generated = self
            .backend
            .generate_credentials(client_token, &key.mount, &key.request_path, &key.role)
            .await?;
        let lifetime = TimeLimited::new(
            self.clock.now(),
            generated.lease.renewable,
            generated.lease.lease_duration_secs,
        )?;
        let created = VaultLease::new(
            generated.lease.lease_id,
            lifetime,
            generated.username,
            generated.password,
        );
        created
            .lifetime
            .lease_duration_sanity_check("dynamic credentials", self.renew_grace_period);
        info!(
            mount = %key.mount,
            request_path = %key.request_path,
            role = %key.role,
            lease = %created.confidential(self.confidentiality),
            "generated dynamic credentials"
        );
        Ok(created)
    }

    fn refresh_lock(&self, key: &LeaseKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.refresh_locks.lock().entry(key.clone()).or_default())
    }
}
