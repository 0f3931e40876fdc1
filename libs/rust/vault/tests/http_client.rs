//! Vault HTTP backend against a mock Vault server.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use test_utils::fixtures::{approle_auth, sample_config};
use vault_lease_manager::{
    KvVersion, LoginCredentials, SecretBackend, UnwrapTarget, VaultConfig, VaultError,
    VaultHttpClient, VaultLeaseManager,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> VaultHttpClient {
    VaultHttpClient::new(&VaultConfig::new(server.uri(), approle_auth())).unwrap()
}

fn auth_body(client_token: &str, lease_duration: i64) -> serde_json::Value {
    json!({
        "auth": {
            "client_token": client_token,
            "accessor": "acc",
            "policies": ["default"],
            "lease_duration": lease_duration,
            "renewable": true
        }
    })
}

fn token(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

#[tokio::test]
async fn test_approle_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .and(body_json(json!({ "role_id": "r", "secret_id": "s" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("s.login", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let grant = client(&server)
        .login(&LoginCredentials::AppRole {
            role_id: "r".to_string(),
            secret_id: token("s"),
        })
        .await
        .unwrap();

    assert_eq!(grant.client_token.expose_secret(), "s.login");
    assert_eq!(grant.lease_duration_secs, 3600);
    assert!(grant.renewable);
}

#[tokio::test]
async fn test_userpass_and_kubernetes_login_paths() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/userpass/login/alice"))
        .and(body_json(json!({ "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("s.user", 60)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/k8s/login"))
        .and(body_json(json!({ "role": "app", "jwt": "jwt" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("s.k8s", 60)))
        .mount(&server)
        .await;
    let client = client(&server);

    let user = client
        .login(&LoginCredentials::UserPass {
            username: "alice".to_string(),
            password: token("pw"),
        })
        .await
        .unwrap();
    let k8s = client
        .login(&LoginCredentials::Kubernetes {
            role: "app".to_string(),
            jwt: token("jwt"),
            auth_mount_path: "auth/k8s".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(user.client_token.expose_secret(), "s.user");
    assert_eq!(k8s.client_token.expose_secret(), "s.k8s");
}

#[tokio::test]
async fn test_userpass_username_is_a_single_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/userpass/login/team%2Falice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("s.team", 60)))
        .expect(1)
        .mount(&server)
        .await;

    let grant = client(&server)
        .login(&LoginCredentials::UserPass {
            username: "team/alice".to_string(),
            password: token("pw"),
        })
        .await
        .unwrap();

    assert_eq!(grant.client_token.expose_secret(), "s.team");
}

#[tokio::test]
async fn test_lookup_self_sends_token_and_maps_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", "s.good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "ttl": 100 } })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", "s.revoked"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "errors": ["permission denied"] })),
        )
        .mount(&server)
        .await;
    let client = client(&server);

    client.lookup_self(&token("s.good")).await.unwrap();
    let err = client.lookup_self(&token("s.revoked")).await.unwrap_err();

    assert!(err.is_forbidden());
    assert!(matches!(err, VaultError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_renew_self() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .and(header("X-Vault-Token", "s.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("s.1", 7200)))
        .mount(&server)
        .await;

    let grant = client(&server).renew_self(&token("s.1")).await.unwrap();

    assert_eq!(grant.client_token.expose_secret(), "s.1");
    assert_eq!(grant.lease_duration_secs, 7200);
}

#[tokio::test]
async fn test_lease_lookup_and_renew() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/lookup"))
        .and(body_json(json!({ "lease_id": "database/creds/r/abc" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "database/creds/r/abc" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/lookup"))
        .and(body_json(json!({ "lease_id": "database/creds/r/gone" })))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "errors": ["invalid lease"] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/renew"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_id": "database/creds/r/abc",
            "lease_duration": 1800,
            "renewable": true
        })))
        .mount(&server)
        .await;
    let client = client(&server);
    let t = token("s.1");

    client
        .lookup_lease(&t, "database/creds/r/abc")
        .await
        .unwrap();
    let err = client
        .lookup_lease(&t, "database/creds/r/gone")
        .await
        .unwrap_err();
    assert!(err.is_bad_request());

    let grant = client
        .renew_lease(&t, "database/creds/r/abc")
        .await
        .unwrap();
    assert_eq!(grant.lease_id, "database/creds/r/abc");
    assert_eq!(grant.lease_duration_secs, 1800);
}

#[tokio::test]
async fn test_generate_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/database/creds/mydbrole"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_id": "database/creds/mydbrole/xyz",
            "lease_duration": 86400,
            "renewable": true,
            "data": { "username": "v-root-mydbrole", "password": "A1a-secret" }
        })))
        .mount(&server)
        .await;

    let generated = client(&server)
        .generate_credentials(&token("s.1"), "database", "creds", "mydbrole")
        .await
        .unwrap();

    assert_eq!(generated.username, "v-root-mydbrole");
    assert_eq!(generated.password.expose_secret(), "A1a-secret");
    assert_eq!(generated.lease.lease_id, "database/creds/mydbrole/xyz");
    assert_eq!(generated.lease.lease_duration_secs, 86_400);
}

#[tokio::test]
async fn test_unwrap_targets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .and(header("X-Vault-Token", "w.token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("s.unwrapped", 60)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .and(header("X-Vault-Token", "w.secret-id"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "secret_id": "sid" } })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .and(header("X-Vault-Token", "w.password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "data": { "password": "bar" }, "metadata": { "version": 1 } }
        })))
        .mount(&server)
        .await;
    let client = client(&server);

    let client_token = client
        .unwrap(&token("w.token"), UnwrapTarget::ClientToken)
        .await
        .unwrap();
    let secret_id = client
        .unwrap(&token("w.secret-id"), UnwrapTarget::AppRoleSecretId)
        .await
        .unwrap();
    let password = client
        .unwrap(&token("w.password"), UnwrapTarget::UserPassPassword(KvVersion::V2))
        .await
        .unwrap();

    assert_eq!(client_token.expose_secret(), "s.unwrapped");
    assert_eq!(secret_id.expose_secret(), "sid");
    assert_eq!(password.expose_secret(), "bar");
}

#[tokio::test]
async fn test_unwrap_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": ["wrapping token is not valid or does not exist"]
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .unwrap(&token("w.used"), UnwrapTarget::ClientToken)
        .await
        .unwrap_err();

    assert!(err.is_bad_request());
}

#[tokio::test]
async fn test_read_kv_versions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/config/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "data": { "password": "v2pw", "port": 5432 }, "metadata": { "version": 3 } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/config/app"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "password": "v1pw" } })),
        )
        .mount(&server)
        .await;
    let client = client(&server);
    let t = token("s.1");

    let v2 = client
        .read_kv(&t, "secret", "config/app", KvVersion::V2)
        .await
        .unwrap();
    let v1 = client
        .read_kv(&t, "kv", "config/app", KvVersion::V1)
        .await
        .unwrap();

    assert_eq!(v2["password"], "v2pw");
    assert_eq!(v2["port"], "5432");
    assert_eq!(v1["password"], "v1pw");
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;
    for (role, status) in [("missing", 404), ("limited", 429), ("down", 503), ("teapot", 418)] {
        Mock::given(method("GET"))
            .and(path(format!("/v1/database/creds/{role}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }
    let client = client(&server);
    let t = token("s.1");

    let mut errors = Vec::new();
    for role in ["missing", "limited", "down", "teapot"] {
        errors.push(
            client
                .generate_credentials(&t, "database", "creds", role)
                .await
                .unwrap_err(),
        );
    }

    assert!(matches!(errors[0], VaultError::SecretNotFound(_)));
    assert!(matches!(errors[1], VaultError::RateLimited));
    assert!(matches!(errors[2], VaultError::Unavailable(_)));
    assert_eq!(errors[3].status(), Some(418));
}

#[tokio::test]
async fn test_malformed_body_is_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"auth\": "))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/database/creds/mydbrole"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "lease_id": 7 })))
        .mount(&server)
        .await;
    let client = client(&server);

    let truncated = client.renew_self(&token("s.1")).await.unwrap_err();
    let mistyped = client
        .generate_credentials(&token("s.1"), "database", "creds", "mydbrole")
        .await
        .unwrap_err();

    assert!(matches!(truncated, VaultError::Serialization(_)));
    assert!(matches!(mistyped, VaultError::Serialization(_)));
    assert_eq!(truncated.status(), None);
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    let config = VaultConfig::new("http://127.0.0.1:1", approle_auth());
    let client = VaultHttpClient::new(&config).unwrap();

    let err = client.lookup_self(&token("s.1")).await.unwrap_err();

    assert!(matches!(err, VaultError::Unavailable(_)));
}

#[tokio::test]
async fn test_manager_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("s.http", 86_400)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", "s.http"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/database/creds/mydbrole"))
        .and(header("X-Vault-Token", "s.http"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_id": "database/creds/mydbrole/1",
            "lease_duration": 86400,
            "renewable": true,
            "data": { "username": "v-http", "password": "pw" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .mount(&server)
        .await;

    let mut config = sample_config(approle_auth());
    config.addr = server.uri();
    let manager = VaultLeaseManager::connect(&config).unwrap();

    let first = manager.get_credentials("mydb").await.unwrap();
    let second = manager.get_credentials("mydb").await.unwrap();

    assert_eq!(first["user"], "v-http");
    assert_eq!(second["password"], "pw");
}
