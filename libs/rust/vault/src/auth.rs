//! Client token lifecycle.
//!
//! [`AuthManager`] keeps one shared client token. Every call to
//! [`AuthManager::get_client_token`] runs the same sequence against the cached
//! value: validate it with a self lookup, extend it when it is renewable and
//! inside the grace window, and log in again when nothing usable is left.
//!
//! Wrapping tokens are single use at the backend, so resolving one goes through
//! a one-permit gate and the result is cached for the life of the manager.

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::backend::{KvVersion, LoginCredentials, SecretBackend, UnwrapTarget};
use crate::clock::Clock;
use crate::confidentiality::LogConfidentialityLevel;
use crate::config::{AuthenticationConfig, SecretValue, VaultConfig};
use crate::error::{VaultError, VaultResult};
use crate::lease::{TimeLimited, Validity, VaultToken};

/// Owner of the shared client token.
pub struct AuthManager {
    backend: Arc<dyn SecretBackend>,
    clock: Arc<dyn Clock>,
    authentication: AuthenticationConfig,
    kv_version: KvVersion,
    renew_grace_period: Duration,
    confidentiality: LogConfidentialityLevel,
    token: ArcSwapOption<VaultToken>,
    unwrapped: RwLock<HashMap<String, SecretString>>,
    unwrap_gate: Semaphore,
    unwrap_gate_timeout: Duration,
}

impl AuthManager {
    /// Create a manager with no cached token.
    #[must_use]
    pub fn new(
        config: &VaultConfig,
        backend: Arc<dyn SecretBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            clock,
            authentication: config.authentication.clone(),
            kv_version: config.kv_secret_engine_version,
            renew_grace_period: config.renew_grace_period,
            confidentiality: config.log_confidentiality_level,
            token: ArcSwapOption::empty(),
            unwrapped: RwLock::new(HashMap::new()),
            unwrap_gate: Semaphore::new(1),
            unwrap_gate_timeout: config.unwrap_gate_timeout,
        }
    }

    /// Return a client token that the backend currently accepts.
    ///
    /// With a fixed client token configured, that token is returned (after a
    /// one-time unwrap if it was supplied wrapped) and no lifecycle applies.
    ///
    /// # Errors
    ///
    /// Propagates backend failures other than a 403 on the validation lookup,
    /// which only triggers a new login.
    #[instrument(skip(self))]
    pub async fn get_client_token(&self) -> VaultResult<SecretString> {
        if let AuthenticationConfig::ClientToken(value) = &self.authentication {
            return match value {
                SecretValue::Plain(token) => Ok(token.clone()),
                SecretValue::Wrapped(wrapping_token) => {
                    self.unwrap_wrapping_token_once(wrapping_token, UnwrapTarget::ClientToken)
                        .await
                }
            };
        }

        let token = self.refresh(self.token.load_full()).await?;
        Ok(token.client_token().clone())
    }

    /// Token currently held in the shared slot, without any validation.
    #[must_use]
    pub fn cached_token(&self) -> Option<Arc<VaultToken>> {
        self.token.load_full()
    }

    async fn refresh(&self, current: Option<Arc<VaultToken>>) -> VaultResult<Arc<VaultToken>> {
        let grace = self.renew_grace_period;

        let mut token = match &current {
            Some(cached) => match self.validate(cached).await? {
                Validity::Valid => Some(Arc::clone(cached)),
                Validity::Invalid => None,
            },
            None => None,
        };

        let renewable = token
            .clone()
            .filter(|t| t.lifetime.should_extend(self.clock.now(), grace));
        if let Some(held) = renewable {
            token = Some(Arc::new(self.extend(&held).await?));
        }

        let now = self.clock.now();
        let token = match token {
            Some(t) if !t.lifetime.is_expired(now) && !t.lifetime.expires_soon(grace) => t,
            _ => Arc::new(self.create().await?),
        };

        let previous = self.token.compare_and_swap(&current, Some(Arc::clone(&token)));
        let replaced = match (&*previous, &current) {
            (Some(p), Some(c)) => Arc::ptr_eq(p, c),
            (None, None) => true,
            _ => false,
        };
        if !replaced {
            debug!("client token slot was updated concurrently, keeping the newer value");
        }

        Ok(token)
    }

    async fn validate(&self, token: &VaultToken) -> VaultResult<Validity> {
        match self.backend.lookup_self(token.client_token()).await {
            Ok(()) => Ok(Validity::Valid),
            Err(e) if e.is_forbidden() => {
                debug!(
                    token = %self.confidentiality.mask_secret(token.client_token().expose_secret()),
                    "login token has become invalid"
                );
                Ok(Validity::Invalid)
            }
            Err(e) => Err(e),
        }
    }

    async fn extend(&self, token: &VaultToken) -> VaultResult<VaultToken> {
        let grant = self.backend.renew_self(token.client_token()).await?;
        let lifetime =
            TimeLimited::new(self.clock.now(), grant.renewable, grant.lease_duration_secs)?;
        let extended = VaultToken::new(grant.client_token, lifetime);
        extended
            .lifetime
            .lease_duration_sanity_check("auth", self.renew_grace_period);
        debug!(token = %extended.confidential(self.confidentiality), "extended login token");
        Ok(extended)
    }

    async fn create(&self) -> VaultResult<VaultToken> {
        let credentials = self.login_credentials().await?;
        let grant = self.backend.login(&credentials).await?;
        let lifetime =
            TimeLimited::new(self.clock.now(), grant.renewable, grant.lease_duration_secs)?;
        let created = VaultToken::new(grant.client_token, lifetime);
        created
            .lifetime
            .lease_duration_sanity_check("auth", self.renew_grace_period);
        info!(
            method = credentials.method(),
            token = %created.confidential(self.confidentiality),
            "created new login token"
        );
        Ok(created)
    }

    async fn login_credentials(&self) -> VaultResult<LoginCredentials> {
        match &self.authentication {
            AuthenticationConfig::AppRole { role_id, secret_id } => Ok(LoginCredentials::AppRole {
                role_id: role_id.clone(),
                secret_id: self.resolve(secret_id, UnwrapTarget::AppRoleSecretId).await?,
            }),
            AuthenticationConfig::UserPass { username, password } => {
                Ok(LoginCredentials::UserPass {
                    username: username.clone(),
                    password: self
                        .resolve(password, UnwrapTarget::UserPassPassword(self.kv_version))
                        .await?,
                })
            }
            AuthenticationConfig::Kubernetes {
                role,
                jwt_token_path,
                auth_mount_path,
            } => {
                let jwt = tokio::fs::read_to_string(jwt_token_path).await.map_err(|e| {
                    VaultError::auth_failed(format!(
                        "unable to read kubernetes jwt from {}: {e}",
                        jwt_token_path.display()
                    ))
                })?;
                Ok(LoginCredentials::Kubernetes {
                    role: role.clone(),
                    jwt: SecretString::from(jwt.trim().to_string()),
                    auth_mount_path: auth_mount_path.clone(),
                })
            }
            AuthenticationConfig::ClientToken(_) => Err(VaultError::invalid_config(
                "a fixed client token cannot be used to log in",
            )),
        }
    }

    async fn resolve(
        &self,
        value: &SecretValue,
        target: UnwrapTarget,
    ) -> VaultResult<SecretString> {
        match value {
            SecretValue::Plain(secret) => Ok(secret.clone()),
            SecretValue::Wrapped(wrapping_token) => {
                self.unwrap_wrapping_token_once(wrapping_token, target).await
            }
        }
    }

    /// Resolve a wrapping token exactly once, however many callers ask for it.
    ///
    /// The resolved value is cached under the wrapping token; later calls never
    /// reach the backend. Concurrent first calls queue on a single-permit gate
    /// and re-check the cache once they hold it.
    ///
    /// # Errors
    ///
    /// [`VaultError::UnwrapGateTimeout`] when the gate cannot be acquired in
    /// time, [`VaultError::InvalidWrappingToken`] when the backend answers 400,
    /// any other backend error unchanged.
    #[instrument(skip(self, wrapping_token))]
    pub async fn unwrap_wrapping_token_once(
        &self,
        wrapping_token: &SecretString,
        target: UnwrapTarget,
    ) -> VaultResult<SecretString> {
        let key = wrapping_token.expose_secret();
        if let Some(value) = self.cached_unwrap(key) {
            return Ok(value);
        }

        let _permit = tokio::time::timeout(self.unwrap_gate_timeout, self.unwrap_gate.acquire())
            .await
            .map_err(|_| VaultError::UnwrapGateTimeout(self.unwrap_gate_timeout))?
            .map_err(|_| VaultError::unavailable("unwrap gate closed"))?;

        if let Some(value) = self.cached_unwrap(key) {
            return Ok(value);
        }

        let value = self
            .backend
            .unwrap(wrapping_token, target)
            .await
            .map_err(|e| {
                if e.is_bad_request() {
                    VaultError::InvalidWrappingToken {
                        target: target.to_string(),
                        reason: e.to_string(),
                    }
                } else {
                    e
                }
            })?;

        self.unwrapped.write().insert(key.to_string(), value.clone());
        debug!(
            %target,
            wrapping_token = %self.confidentiality.mask_secret(key),
            "unwrapped wrapping token"
        );
        Ok(value)
    }

    fn cached_unwrap(&self, wrapping_token: &str) -> Option<SecretString> {
        self.unwrapped.read().get(wrapping_token).cloned()
    }
}
