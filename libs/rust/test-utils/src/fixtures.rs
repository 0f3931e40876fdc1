//! Configuration fixtures.

use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;
use std::time::Duration;
use vault_lease_manager::{
    AuthenticationConfig, CredentialsProviderConfig, LogConfidentialityLevel, SecretValue,
    VaultConfig,
};

/// Local development Vault address.
pub const VAULT_ADDR: &str = "http://127.0.0.1:8200";

/// Fixed start instant for clock-driven tests.
#[must_use]
pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// App-role authentication with plain secrets.
#[must_use]
pub fn approle_auth() -> AuthenticationConfig {
    AuthenticationConfig::AppRole {
        role_id: "myapprole-role-id".to_string(),
        secret_id: SecretValue::Plain(SecretString::from("myapprole-secret-id")),
    }
}

/// Config with a one hour grace period, a short unwrap gate timeout, and the
/// `mydb` (database role), `generic` (dynamic) and `static` (KV) providers.
#[must_use]
pub fn sample_config(authentication: AuthenticationConfig) -> VaultConfig {
    VaultConfig::new(VAULT_ADDR, authentication)
        .with_renew_grace_period(Duration::from_secs(3600))
        .with_unwrap_gate_timeout(Duration::from_secs(2))
        .with_log_confidentiality_level(LogConfidentialityLevel::High)
        .with_credentials_provider("mydb", CredentialsProviderConfig::database("mydbrole"))
        .with_credentials_provider(
            "generic",
            CredentialsProviderConfig::dynamic("rabbitmq", "creds", "producer"),
        )
        .with_credentials_provider("static", CredentialsProviderConfig::kv("config/app"))
        .with_credentials_provider("broken", CredentialsProviderConfig::empty())
}
