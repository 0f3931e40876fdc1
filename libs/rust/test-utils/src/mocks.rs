//! Mock implementations for testing.
//!
//! [`MockSecretBackend`] behaves like a small Vault: it issues numbered tokens
//! and leases, consumes wrapping tokens on first unwrap, and can be scripted to
//! fail the next calls of a given kind with a status code.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use vault_lease_manager::{
    AuthGrant, Clock, GeneratedCredentials, KvVersion, LeaseGrant, LoginCredentials, SecretBackend,
    UnwrapTarget, VaultError, VaultResult,
};

/// Number of calls per backend operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `login`
    pub login: usize,
    /// `lookup_self`
    pub lookup_self: usize,
    /// `renew_self`
    pub renew_self: usize,
    /// `lookup_lease`
    pub lookup_lease: usize,
    /// `renew_lease`
    pub renew_lease: usize,
    /// `generate_credentials`
    pub generate: usize,
    /// `unwrap`
    pub unwrap: usize,
    /// `read_kv`
    pub read_kv: usize,
}

#[derive(Default)]
struct Counters {
    login: AtomicUsize,
    lookup_self: AtomicUsize,
    renew_self: AtomicUsize,
    lookup_lease: AtomicUsize,
    renew_lease: AtomicUsize,
    generate: AtomicUsize,
    unwrap: AtomicUsize,
    read_kv: AtomicUsize,
}

fn bump(counter: &AtomicUsize) -> usize {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Debug, Clone, Copy)]
struct Ttl {
    renewable: bool,
    lease_duration_secs: i64,
}

#[derive(Default)]
struct Failures {
    login: VecDeque<u16>,
    lookup_self: VecDeque<u16>,
    renew_self: VecDeque<u16>,
    lookup_lease: VecDeque<u16>,
    renew_lease: VecDeque<u16>,
    generate: VecDeque<u16>,
    unwrap: VecDeque<u16>,
}

/// In-memory secret backend.
pub struct MockSecretBackend {
    counters: Counters,
    token_ttl: Mutex<Ttl>,
    lease_ttl: Mutex<Ttl>,
    failures: Mutex<Failures>,
    wrapped: Mutex<HashMap<String, String>>,
    kv: Mutex<HashMap<(String, String), HashMap<String, String>>>,
    logins: Mutex<Vec<LoginCredentials>>,
    unwrap_delay: Mutex<Duration>,
}

impl Default for MockSecretBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSecretBackend {
    /// Tokens and leases last one day and are renewable.
    #[must_use]
    pub fn new() -> Self {
        let day = Ttl {
            renewable: true,
            lease_duration_secs: 86_400,
        };
        Self {
            counters: Counters::default(),
            token_ttl: Mutex::new(day),
            lease_ttl: Mutex::new(day),
            failures: Mutex::new(Failures::default()),
            wrapped: Mutex::new(HashMap::new()),
            kv: Mutex::new(HashMap::new()),
            logins: Mutex::new(Vec::new()),
            unwrap_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Lifetime of tokens issued from now on.
    pub fn set_token_ttl(&self, lease_duration_secs: i64, renewable: bool) {
        *self.token_ttl.lock() = Ttl {
            renewable,
            lease_duration_secs,
        };
    }

    /// Lifetime of leases issued from now on.
    pub fn set_lease_ttl(&self, lease_duration_secs: i64, renewable: bool) {
        *self.lease_ttl.lock() = Ttl {
            renewable,
            lease_duration_secs,
        };
    }

    /// Sleep this long inside every unwrap call.
    pub fn set_unwrap_delay(&self, delay: Duration) {
        *self.unwrap_delay.lock() = delay;
    }

    /// Register a wrapping token resolving to `value`.
    pub fn wrap(&self, wrapping_token: &str, value: &str) {
        self.wrapped
            .lock()
            .insert(wrapping_token.to_string(), value.to_string());
    }

    /// Store a KV secret.
    pub fn put_kv(&self, mount: &str, path: &str, data: &[(&str, &str)]) {
        let data = data
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.kv
            .lock()
            .insert((mount.to_string(), path.to_string()), data);
    }

    /// Fail the next login with `status`.
    pub fn fail_next_login(&self, status: u16) {
        self.failures.lock().login.push_back(status);
    }

    /// Fail the next token lookup with `status`.
    pub fn fail_next_lookup_self(&self, status: u16) {
        self.failures.lock().lookup_self.push_back(status);
    }

    /// Fail the next token renewal with `status`.
    pub fn fail_next_renew_self(&self, status: u16) {
        self.failures.lock().renew_self.push_back(status);
    }

    /// Fail the next lease lookup with `status`.
    pub fn fail_next_lookup_lease(&self, status: u16) {
        self.failures.lock().lookup_lease.push_back(status);
    }

    /// Fail the next lease renewal with `status`.
    pub fn fail_next_renew_lease(&self, status: u16) {
        self.failures.lock().renew_lease.push_back(status);
    }

    /// Fail the next credentials generation with `status`.
    pub fn fail_next_generate(&self, status: u16) {
        self.failures.lock().generate.push_back(status);
    }

    /// Fail the next unwrap with `status`.
    pub fn fail_next_unwrap(&self, status: u16) {
        self.failures.lock().unwrap.push_back(status);
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            login: c.login.load(Ordering::SeqCst),
            lookup_self: c.lookup_self.load(Ordering::SeqCst),
            renew_self: c.renew_self.load(Ordering::SeqCst),
            lookup_lease: c.lookup_lease.load(Ordering::SeqCst),
            renew_lease: c.renew_lease.load(Ordering::SeqCst),
            generate: c.generate.load(Ordering::SeqCst),
            unwrap: c.unwrap.load(Ordering::SeqCst),
            read_kv: c.read_kv.load(Ordering::SeqCst),
        }
    }

    /// Credentials presented on each login, in order.
    #[must_use]
    pub fn logins(&self) -> Vec<LoginCredentials> {
        self.logins.lock().clone()
    }

    fn scripted(queue: &mut VecDeque<u16>) -> VaultResult<()> {
        match queue.pop_front() {
            Some(status) => Err(VaultError::from_status(status, "scripted failure")),
            None => Ok(()),
        }
    }

    fn auth_grant(&self, client_token: String) -> AuthGrant {
        let ttl = *self.token_ttl.lock();
        AuthGrant {
            client_token: SecretString::from(client_token),
            renewable: ttl.renewable,
            lease_duration_secs: ttl.lease_duration_secs,
        }
    }

    fn lease_grant(&self, lease_id: String) -> LeaseGrant {
        let ttl = *self.lease_ttl.lock();
        LeaseGrant {
            lease_id,
            renewable: ttl.renewable,
            lease_duration_secs: ttl.lease_duration_secs,
        }
    }
}

#[async_trait]
impl SecretBackend for MockSecretBackend {
    async fn login(&self, credentials: &LoginCredentials) -> VaultResult<AuthGrant> {
        let n = bump(&self.counters.login);
        Self::scripted(&mut self.failures.lock().login)?;
        self.logins.lock().push(credentials.clone());
        Ok(self.auth_grant(format!("s.token-{n}")))
    }

    async fn lookup_self(&self, _client_token: &SecretString) -> VaultResult<()> {
        bump(&self.counters.lookup_self);
        Self::scripted(&mut self.failures.lock().lookup_self)
    }

    async fn renew_self(&self, client_token: &SecretString) -> VaultResult<AuthGrant> {
        bump(&self.counters.renew_self);
        Self::scripted(&mut self.failures.lock().renew_self)?;
        Ok(self.auth_grant(client_token.expose_secret().to_string()))
    }

    async fn lookup_lease(
        &self,
        _client_token: &SecretString,
        _lease_id: &str,
    ) -> VaultResult<()> {
        bump(&self.counters.lookup_lease);
        Self::scripted(&mut self.failures.lock().lookup_lease)
    }

    async fn renew_lease(
        &self,
        _client_token: &SecretString,
        lease_id: &str,
    ) -> VaultResult<LeaseGrant> {
        bump(&self.counters.renew_lease);
        Self::scripted(&mut self.failures.lock().renew_lease)?;
        Ok(self.lease_grant(lease_id.to_string()))
    }

    async fn generate_credentials(
        &self,
        _client_token: &SecretString,
        mount: &str,
        request_path: &str,
        role: &str,
    ) -> VaultResult<GeneratedCredentials> {
        let n = bump(&self.counters.generate);
        Self::scripted(&mut self.failures.lock().generate)?;
        Ok(GeneratedCredentials {
            lease: self.lease_grant(format!("{mount}/{request_path}/{role}/lease-{n}")),
            username: format!("v-{role}-{n}"),
            password: SecretString::from(format!("pw-{n}")),
        })
    }

    async fn unwrap(
        &self,
        wrapping_token: &SecretString,
        _target: UnwrapTarget,
    ) -> VaultResult<SecretString> {
        bump(&self.counters.unwrap);
        let delay = *self.unwrap_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Self::scripted(&mut self.failures.lock().unwrap)?;
        self.wrapped
            .lock()
            .remove(wrapping_token.expose_secret())
            .map(SecretString::from)
            .ok_or_else(|| {
                VaultError::BadRequest("wrapping token is not valid or does not exist".to_string())
            })
    }

    async fn read_kv(
        &self,
        _client_token: &SecretString,
        mount: &str,
        path: &str,
        _version: KvVersion,
    ) -> VaultResult<HashMap<String, String>> {
        bump(&self.counters.read_kv);
        self.kv
            .lock()
            .get(&(mount.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| VaultError::not_found(format!("{mount}/{path}")))
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock stopped at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move forward by `by`.
    ///
    /// # Panics
    ///
    /// Panics if `by` does not fit a chrono duration.
    #[allow(clippy::expect_used)]
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).expect("duration out of range");
        *self.now.lock() += delta;
    }

    /// Jump to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
