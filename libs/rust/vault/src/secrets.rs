//! Vault response payloads.

use serde::Deserialize;
use std::collections::HashMap;

/// Vault auth response (login, renew-self, unwrapped client token)
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub auth: AuthData,
}

#[derive(Debug, Deserialize)]
pub struct AuthData {
    pub client_token: String,
    pub lease_duration: i64,
    pub renewable: bool,
}

/// `sys/leases/renew` response
#[derive(Debug, Deserialize)]
pub struct LeaseRenewResponse {
    pub lease_id: String,
    pub lease_duration: i64,
    pub renewable: bool,
}

/// Dynamic credentials response (`database/creds/<role>` and friends)
#[derive(Debug, Deserialize)]
pub struct DynamicCredsResponse {
    pub data: DynamicCredsData,
    pub lease_id: String,
    pub lease_duration: i64,
    pub renewable: bool,
}

#[derive(Debug, Deserialize)]
pub struct DynamicCredsData {
    pub username: String,
    pub password: String,
}

/// KV v1 read response
#[derive(Debug, Deserialize)]
pub struct KvV1Response {
    pub data: HashMap<String, serde_json::Value>,
}

/// KV v2 read response
#[derive(Debug, Deserialize)]
pub struct KvV2Response {
    pub data: KvV2Data,
}

#[derive(Debug, Deserialize)]
pub struct KvV2Data {
    pub data: HashMap<String, serde_json::Value>,
    pub metadata: Option<KvMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct KvMetadata {
    #[serde(default)]
    pub version: u32,
}

/// Unwrapped app-role secret id
#[derive(Debug, Deserialize)]
pub struct SecretIdResponse {
    pub data: SecretIdData,
}

#[derive(Debug, Deserialize)]
pub struct SecretIdData {
    pub secret_id: String,
}

/// Flatten KV values to strings; non-string JSON values keep their JSON text.
pub fn kv_to_strings(data: HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    data.into_iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect()
}
