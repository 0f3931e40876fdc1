//! Time-limited values issued by the secret backend.
//!
//! [`TimeLimited`] carries the creation instant, the renewable flag and the
//! lease duration, and answers the expiry questions the managers ask.
//! [`VaultToken`] and [`VaultLease`] attach the client token or the lease id
//! and dynamic credentials to it. All of them are immutable: renewing builds a
//! new value.

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;
use tracing::warn;

use crate::confidentiality::LogConfidentialityLevel;
use crate::error::{VaultError, VaultResult};

/// Outcome of checking a cached token or lease with the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Still accepted
    Valid,
    /// Revoked or unknown; must be recreated
    Invalid,
}

/// Creation instant, renewability and lease duration of a backend grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLimited {
    created: DateTime<Utc>,
    renewable: bool,
    lease_duration_secs: i64,
    expire_instant: DateTime<Utc>,
}

impl TimeLimited {
    /// Build a value created at `created`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidArgument`] when the lease duration is
    /// negative or does not fit a timestamp.
    pub fn new(
        created: DateTime<Utc>,
        renewable: bool,
        lease_duration_secs: i64,
    ) -> VaultResult<Self> {
        if lease_duration_secs < 0 {
            return Err(VaultError::InvalidArgument(format!(
                "lease duration must not be negative, got {lease_duration_secs}"
            )));
        }
        let expire_instant = TimeDelta::try_seconds(lease_duration_secs)
            .and_then(|d| created.checked_add_signed(d))
            .ok_or_else(|| {
                VaultError::InvalidArgument(format!(
                    "lease duration out of range: {lease_duration_secs}"
                ))
            })?;

        Ok(Self {
            created,
            renewable,
            lease_duration_secs,
            expire_instant,
        })
    }

    /// Instant the grant was received.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Whether the backend allows extending the grant.
    #[must_use]
    pub const fn renewable(&self) -> bool {
        self.renewable
    }

    /// Lease duration in seconds.
    #[must_use]
    pub const fn lease_duration_secs(&self) -> i64 {
        self.lease_duration_secs
    }

    /// `created + lease duration`.
    #[must_use]
    pub const fn expire_instant(&self) -> DateTime<Utc> {
        self.expire_instant
    }

    /// `now > expire_instant`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_instant
    }

    /// The lease duration itself is shorter than the grace period.
    #[must_use]
    pub fn expires_soon(&self, grace: Duration) -> bool {
        i128::from(self.lease_duration_secs) < i128::from(grace.as_secs())
    }

    /// Not expired, renewable, and `now + grace` reaches past the expiry.
    #[must_use]
    pub fn should_extend(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        if self.is_expired(now) || !self.renewable {
            return false;
        }
        TimeDelta::from_std(grace)
            .ok()
            .and_then(|g| now.checked_add_signed(g))
            .is_none_or(|horizon| horizon > self.expire_instant)
    }

    /// Warn when the backend hands out grants shorter than the grace period.
    ///
    /// Such grants are recreated on every access, which usually means the
    /// grace period is misconfigured.
    pub fn lease_duration_sanity_check(&self, label: &str, grace: Duration) {
        if self.expires_soon(grace) {
            warn!(
                label,
                lease_duration_secs = self.lease_duration_secs,
                grace_period_secs = grace.as_secs(),
                "{label} lease duration is shorter than the renew grace period; \
                 it will be recreated on every access"
            );
        }
    }
}

/// Client token of an authenticated session.
#[derive(Clone)]
pub struct VaultToken {
    client_token: SecretString,
    /// Validity of the session.
    pub lifetime: TimeLimited,
}

impl VaultToken {
    /// Create a token value.
    #[must_use]
    pub const fn new(client_token: SecretString, lifetime: TimeLimited) -> Self {
        Self {
            client_token,
            lifetime,
        }
    }

    /// The token itself.
    #[must_use]
    pub const fn client_token(&self) -> &SecretString {
        &self.client_token
    }

    /// Log-safe rendering under the given confidentiality level.
    #[must_use]
    pub fn confidential(&self, level: LogConfidentialityLevel) -> String {
        format!(
            "{{client_token: {}, renewable: {}, lease_duration_secs: {}, expires: {}}}",
            level.mask_secret(self.client_token.expose_secret()),
            self.lifetime.renewable(),
            self.lifetime.lease_duration_secs(),
            self.lifetime.expire_instant().to_rfc3339(),
        )
    }
}

impl fmt::Debug for VaultToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultToken")
            .field("client_token", &"[REDACTED]")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Dynamic credentials and the lease that governs them.
#[derive(Clone)]
pub struct VaultLease {
    lease_id: String,
    /// Validity of the lease.
    pub lifetime: TimeLimited,
    username: String,
    password: SecretString,
}

impl VaultLease {
    /// Create a lease value.
    #[must_use]
    pub const fn new(
        lease_id: String,
        lifetime: TimeLimited,
        username: String,
        password: SecretString,
    ) -> Self {
        Self {
            lease_id,
            lifetime,
            username,
            password,
        }
    }

    /// Backend identifier of the lease.
    #[must_use]
    pub fn lease_id(&self) -> &str {
        &self.lease_id
    }

    /// Generated username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Generated password.
    #[must_use]
    pub const fn password(&self) -> &SecretString {
        &self.password
    }

    /// Same credentials under new lease metadata.
    #[must_use]
    pub fn extended(&self, lease_id: String, lifetime: TimeLimited) -> Self {
        Self {
            lease_id,
            lifetime,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Log-safe rendering under the given confidentiality level.
    #[must_use]
    pub fn confidential(&self, level: LogConfidentialityLevel) -> String {
        format!(
            "{{lease_id: {}, renewable: {}, lease_duration_secs: {}, expires: {}, \
             username: {}, password: {}}}",
            level.mask_lease_id(&self.lease_id),
            self.lifetime.renewable(),
            self.lifetime.lease_duration_secs(),
            self.lifetime.expire_instant().to_rfc3339(),
            self.username,
            level.mask_secret(self.password.expose_secret()),
        )
    }
}

impl fmt::Debug for VaultLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultLease")
            .field("lease_id", &self.lease_id)
            .field("lifetime", &self.lifetime)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
