use capella_dbplugin::config::ConnectionConfig;
use capella_dbplugin::lifecycle::{build_backend, CredentialBackend, RotatedRoot};
use capella_dbplugin::secrets::SecretString;
use capella_dbplugin::Error;
use serde_json::json;
use tracing::Span;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::support::{mount_page, users_path, v4_config};

fn backend(server: &MockServer) -> Box<dyn CredentialBackend> {
    let config = ConnectionConfig::from_raw(&v4_config(server)).unwrap().prepare().unwrap();
    build_backend(&config, None, Span::none()).unwrap()
}

#[tokio::test]
async fn create_user_sends_default_read_only_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(users_path()))
        .and(header("authorization", "Bearer SK"))
        .and(body_json(json!({
            "name": "alice",
            "password": "Secr3t!",
            "access": [{"privileges": ["data_reader"], "resources": {"buckets": [{"name": "*"}]}}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "u-alice"})))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server).create_user("alice", &SecretString::new("Secr3t!"), None).await.unwrap();
}

#[tokio::test]
async fn create_user_forwards_custom_access() {
    let server = MockServer::start().await;
    let statement = r#"{"access":[{"privileges":["data_writer"],"resources":{"buckets":[{"name":"travel-sample","scopes":[{"name":"inventory"}]}]}}]}"#;
    Mock::given(method("POST"))
        .and(path(users_path()))
        .and(body_json(json!({
            "name": "bob",
            "password": "pw",
            "access": [{
                "privileges": ["data_writer"],
                "resources": {"buckets": [{"name": "travel-sample", "scopes": [{"name": "inventory"}]}]}
            }]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server).create_user("bob", &SecretString::new("pw"), Some(statement)).await.unwrap();
}

#[tokio::test]
async fn rotate_resolves_user_across_pages() {
    let server = MockServer::start().await;
    mount_page(&server, 1, &[("u-1", "ALICE")], Some(2)).await;
    mount_page(&server, 2, &[("u-2", "BOB"), ("u-3", "CAROL")], None).await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/u-3", users_path())))
        .and(body_json(json!({"password": "n3w"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let rotated = backend(&server).rotate_credential("CAROL", &SecretString::new("n3w")).await.unwrap();
    assert!(rotated.is_none());
}

#[tokio::test]
async fn delete_of_unknown_user_sends_no_delete() {
    let server = MockServer::start().await;
    mount_page(&server, 1, &[("u-1", "ALICE")], Some(2)).await;
    mount_page(&server, 2, &[("u-2", "BOB")], None).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let err = backend(&server).delete_user("MALLORY").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { ref username } if username == "MALLORY"));
}

#[tokio::test]
async fn delete_removes_resolved_user() {
    let server = MockServer::start().await;
    mount_page(&server, 1, &[("u-1", "ALICE")], None).await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/u-1", users_path())))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server).delete_user("ALICE").await.unwrap();
}

#[tokio::test]
async fn rotating_the_api_key_returns_the_issued_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/organizations/org-1/apikeys/AK/rotate"))
        .and(body_json(json!({"secret": "requested"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"secretKey": "issued"})))
        .expect(1)
        .mount(&server)
        .await;

    let rotated = backend(&server).rotate_credential("AK", &SecretString::new("requested")).await.unwrap();
    assert_eq!(rotated, Some(RotatedRoot::SecretKey(SecretString::new("issued"))));
}
