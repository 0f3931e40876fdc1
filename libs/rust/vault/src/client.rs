//! Vault HTTP backend.

use async_trait::async_trait;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    backend::{
        AuthGrant, GeneratedCredentials, KvVersion, LeaseGrant, LoginCredentials, SecretBackend,
        UnwrapTarget,
    },
    config::VaultConfig,
    error::{VaultError, VaultResult},
    secrets::{
        AuthResponse, DynamicCredsResponse, KvV1Response, KvV2Response, LeaseRenewResponse,
        SecretIdResponse, kv_to_strings,
    },
};

const TOKEN_HEADER: &str = "X-Vault-Token";
const WRAPPED_PASSWORD_KEY: &str = "password";
const UNWRAP_PATH: &str = "sys/wrapping/unwrap";

/// [`SecretBackend`] speaking the Vault HTTP API.
pub struct VaultHttpClient {
    addr: String,
    http: Client,
}

impl VaultHttpClient {
    /// Create a new Vault client.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &VaultConfig) -> VaultResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(VaultError::Http)?;

        Ok(Self {
            addr: config.addr.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> VaultResult<Url> {
        let raw = format!("{}/v1/{}", self.addr, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| VaultError::invalid_config(format!("invalid url {raw}: {e}")))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        token: Option<&SecretString>,
        body: Option<serde_json::Value>,
    ) -> VaultResult<T> {
        let path = url.path().to_string();

        let mut request = self.http.request(method, url);
        if let Some(t) = token {
            request = request.header(TOKEN_HEADER, t.expose_secret());
        }
        if let Some(b) = body {
            request = request.json(&b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(path, status = status.as_u16(), "Vault request failed");
            return Err(VaultError::from_status(
                status.as_u16(),
                format!("{path}: {text}"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(VaultError::from)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&SecretString>,
        body: Option<serde_json::Value>,
    ) -> VaultResult<T> {
        self.request(method, self.endpoint(path)?, token, body).await
    }
}

impl From<AuthResponse> for AuthGrant {
    fn from(response: AuthResponse) -> Self {
        Self {
            client_token: SecretString::from(response.auth.client_token),
            renewable: response.auth.renewable,
            lease_duration_secs: response.auth.lease_duration,
        }
    }
}

#[async_trait]
impl SecretBackend for VaultHttpClient {
    #[instrument(skip_all, fields(method = credentials.method()))]
    async fn login(&self, credentials: &LoginCredentials) -> VaultResult<AuthGrant> {
        let (url, body) = match credentials {
            LoginCredentials::AppRole { role_id, secret_id } => (
                self.endpoint("auth/approle/login")?,
                serde_json::json!({
                    "role_id": role_id,
                    "secret_id": secret_id.expose_secret(),
                }),
            ),
            LoginCredentials::UserPass { username, password } => {
                let mut url = self.endpoint("auth/userpass/login")?;
                url.path_segments_mut()
                    .map_err(|()| VaultError::invalid_config("Vault address cannot be a base"))?
                    .push(username);
                (
                    url,
                    serde_json::json!({ "password": password.expose_secret() }),
                )
            }
            LoginCredentials::Kubernetes {
                role,
                jwt,
                auth_mount_path,
            } => (
                self.endpoint(&format!("{}/login", auth_mount_path.trim_matches('/')))?,
                serde_json::json!({
                    "role": role,
                    "jwt": jwt.expose_secret(),
                }),
            ),
        };

        let response: AuthResponse = self.request(Method::POST, url, None, Some(body)).await?;
        Ok(response.into())
    }

    async fn lookup_self(&self, client_token: &SecretString) -> VaultResult<()> {
        self.call::<serde_json::Value>(
            Method::GET,
            "auth/token/lookup-self",
            Some(client_token),
            None,
        )
        .await?;
        Ok(())
    }

    async fn renew_self(&self, client_token: &SecretString) -> VaultResult<AuthGrant> {
        let response: AuthResponse = self
            .call(
                Method::POST,
                "auth/token/renew-self",
                Some(client_token),
                Some(serde_json::json!({})),
            )
            .await?;
        Ok(response.into())
    }

    async fn lookup_lease(&self, client_token: &SecretString, lease_id: &str) -> VaultResult<()> {
        let body = serde_json::json!({ "lease_id": lease_id });
        self.call::<serde_json::Value>(
            Method::PUT,
            "sys/leases/lookup",
            Some(client_token),
            Some(body),
        )
        .await?;
        Ok(())
    }

    async fn renew_lease(
        &self,
        client_token: &SecretString,
        lease_id: &str,
    ) -> VaultResult<LeaseGrant> {
        let body = serde_json::json!({ "lease_id": lease_id });
        let response: LeaseRenewResponse = self
            .call(
                Method::PUT,
                "sys/leases/renew",
                Some(client_token),
                Some(body),
            )
            .await?;

        Ok(LeaseGrant {
            lease_id: response.lease_id,
            renewable: response.renewable,
            lease_duration_secs: response.lease_duration,
        })
    }

    #[instrument(skip(self, client_token))]
    async fn generate_credentials(
        &self,
        client_token: &SecretString,
        mount: &str,
        request_path: &str,
        role: &str,
    ) -> VaultResult<GeneratedCredentials> {
        let path = format!("{mount}/{request_path}/{role}");
        let response: DynamicCredsResponse = self
            .call(Method::GET, &path, Some(client_token), None)
            .await?;

        Ok(GeneratedCredentials {
            lease: LeaseGrant {
                lease_id: response.lease_id,
                renewable: response.renewable,
                lease_duration_secs: response.lease_duration,
            },
            username: response.data.username,
            password: SecretString::from(response.data.password),
        })
    }

    async fn unwrap(
        &self,
        wrapping_token: &SecretString,
        target: UnwrapTarget,
    ) -> VaultResult<SecretString> {
        let token = Some(wrapping_token);

        let value = match target {
            UnwrapTarget::ClientToken => {
                let response: AuthResponse =
                    self.call(Method::POST, UNWRAP_PATH, token, None).await?;
                response.auth.client_token
            }
            UnwrapTarget::AppRoleSecretId => {
                let response: SecretIdResponse =
                    self.call(Method::POST, UNWRAP_PATH, token, None).await?;
                response.data.secret_id
            }
            UnwrapTarget::UserPassPassword(version) => {
                let mut data = match version {
                    KvVersion::V1 => {
                        let response: KvV1Response =
                            self.call(Method::POST, UNWRAP_PATH, token, None).await?;
                        kv_to_strings(response.data)
                    }
                    KvVersion::V2 => {
                        let response: KvV2Response =
                            self.call(Method::POST, UNWRAP_PATH, token, None).await?;
                        kv_to_strings(response.data.data)
                    }
                };
                data.remove(WRAPPED_PASSWORD_KEY).ok_or_else(|| {
                    VaultError::not_found(format!("{WRAPPED_PASSWORD_KEY} in wrapped secret"))
                })?
            }
        };

        Ok(SecretString::from(value))
    }

    #[instrument(skip(self, client_token))]
    async fn read_kv(
        &self,
        client_token: &SecretString,
        mount: &str,
        path: &str,
        version: KvVersion,
    ) -> VaultResult<HashMap<String, String>> {
        match version {
            KvVersion::V1 => {
                let response: KvV1Response = self
                    .call(Method::GET, &format!("{mount}/{path}"), Some(client_token), None)
                    .await?;
                Ok(kv_to_strings(response.data))
            }
            KvVersion::V2 => {
                let response: KvV2Response = self
                    .call(
                        Method::GET,
                        &format!("{mount}/data/{path}"),
                        Some(client_token),
                        None,
                    )
                    .await?;
                if let Some(metadata) = &response.data.metadata {
                    debug!(mount, path, version = metadata.version, "read kv v2 secret");
                }
                Ok(kv_to_strings(response.data.data))
            }
        }
    }
}
