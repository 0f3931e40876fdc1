//! Proptest generators for lease manager types.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use std::time::Duration;
use vault_lease_manager::LogConfidentialityLevel;

/// Creation instants between 2000 and 2100.
pub fn created_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800_i64..4_102_444_800_i64).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    })
}

/// Lease durations from one second up to a year.
pub fn lease_duration_strategy() -> impl Strategy<Value = i64> {
    1_i64..31_536_000
}

/// Grace periods up to a day.
pub fn grace_period_strategy() -> impl Strategy<Value = Duration> {
    (0_u64..86_400).prop_map(Duration::from_secs)
}

/// Any confidentiality level.
pub fn confidentiality_level_strategy() -> impl Strategy<Value = LogConfidentialityLevel> {
    prop_oneof![
        Just(LogConfidentialityLevel::Low),
        Just(LogConfidentialityLevel::Medium),
        Just(LogConfidentialityLevel::High),
    ]
}

/// Vault-style client tokens.
pub fn client_token_strategy() -> impl Strategy<Value = String> {
    "(s|hvs)\\.[A-Za-z0-9]{24}"
}

/// Generated passwords.
pub fn password_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9!@#$%^&*-]{12,40}"
}

/// Lease ids as issued for dynamic credentials.
pub fn lease_id_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{3,10}", "[a-z][a-z0-9-]{2,12}", "[A-Za-z0-9]{24}")
        .prop_map(|(mount, role, id)| format!("{mount}/creds/{role}/{id}"))
}
