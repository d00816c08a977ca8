use std::sync::Arc;

use capella_dbplugin::connection::ProducerState;
use capella_dbplugin::lifecycle::RotatedRoot;
use capella_dbplugin::plugin::{
    CapellaDatabase, ChangePassword, DeleteUserRequest, InitializeRequest, NewUserRequest,
    Statements, UpdateUserRequest, UsernameMetadata,
};
use capella_dbplugin::secrets::SecretString;
use capella_dbplugin::Error;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::support::{direct_config, mount_healthy_cluster};

const ADMIN_AUTH: &str = "Basic QWRtaW5pc3RyYXRvcjphZG1pbi1wdw==";
const ROTATED_ADMIN_AUTH: &str = "Basic QWRtaW5pc3RyYXRvcjpmcmVzaA==";

async fn initialized(server: &MockServer, verify_connection: bool) -> CapellaDatabase {
    let db = CapellaDatabase::new();
    db.initialize(InitializeRequest { config: direct_config(&server.uri()), verify_connection })
        .await
        .unwrap();
    db
}

fn change_password(username: &str, password: &str) -> UpdateUserRequest {
    UpdateUserRequest {
        username: username.into(),
        password: Some(ChangePassword { new_password: SecretString::new(password), ..Default::default() }),
        ..Default::default()
    }
}

#[tokio::test]
async fn connection_is_opened_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"implementationVersion": "7.6.2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pools/default/buckets/travel-sample"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": [{"status": "healthy"}]})))
        .mount(&server)
        .await;

    let db = initialized(&server, true).await;
    assert_eq!(db.producer().state().await, ProducerState::Connected);

    let first = db.producer().connection(None).await.unwrap();
    let second = db.producer().connection(None).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn missing_bucket_fails_verification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"implementationVersion": "7.6.2"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pools/default/buckets/travel-sample"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let db = CapellaDatabase::new();
    let err = db
        .initialize(InitializeRequest { config: direct_config(&server.uri()), verify_connection: true })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection { .. }), "{err}");
    assert_eq!(db.producer().state().await, ProducerState::Uninitialized);
}

#[tokio::test]
async fn new_user_is_upserted_with_statement_roles() {
    let server = MockServer::start().await;
    mount_healthy_cluster(&server).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/settings/rbac/users/local/V_APP_WRITER_[A-Z0-9]+_[0-9]+$"))
        .and(header("authorization", ADMIN_AUTH))
        .and(body_string_contains("roles=data_writer%5Bbeer%5D"))
        .and(body_string_contains("password=Secr3t%21"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let db = initialized(&server, false).await;
    let request = NewUserRequest {
        username_config: UsernameMetadata { display_name: "app".into(), role_name: "writer".into() },
        statements: Statements {
            commands: vec![
                r#"{"access":[{"privileges":["data_writer"],"resources":{"buckets":[{"name":"beer"}]}}]}"#.into(),
            ],
        },
        password: SecretString::new("Secr3t!"),
        ..Default::default()
    };
    let response = db.new_user(request).await.unwrap();
    assert!(response.username.starts_with("V_APP_WRITER_"));
}

#[tokio::test]
async fn rotation_keeps_roles_and_sets_password() {
    let server = MockServer::start().await;
    mount_healthy_cluster(&server).await;
    Mock::given(method("GET"))
        .and(path("/settings/rbac/users/local/ALICE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ALICE",
            "name": "Alice",
            "roles": [{"role": "data_reader", "bucket_name": "travel-sample"}],
            "groups": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/settings/rbac/users/local/ALICE"))
        .and(body_string_contains("roles=data_reader%5Btravel-sample%5D"))
        .and(body_string_contains("password=n3w"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let db = initialized(&server, false).await;
    let response = db.update_user(change_password("ALICE", "n3w")).await.unwrap();
    assert!(response.rotated_root.is_none());
}

#[tokio::test]
async fn rotation_leaves_group_roles_with_the_group() {
    let server = MockServer::start().await;
    mount_healthy_cluster(&server).await;
    Mock::given(method("GET"))
        .and(path("/settings/rbac/users/local/ALICE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ALICE",
            "name": "Alice",
            "roles": [
                {"role": "data_reader", "bucket_name": "travel-sample", "origins": [{"type": "user"}]},
                {"role": "admin", "origins": [{"type": "group", "name": "ops"}]}
            ],
            "groups": ["ops"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/settings/rbac/users/local/ALICE"))
        .and(body_string_contains("roles=data_reader%5Btravel-sample%5D&groups=ops"))
        .and(body_string_contains("password=n3w"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let db = initialized(&server, false).await;
    db.update_user(change_password("ALICE", "n3w")).await.unwrap();
}

#[tokio::test]
async fn admin_rotation_reconnects_with_the_new_password() {
    let server = MockServer::start().await;
    mount_healthy_cluster(&server).await;
    Mock::given(method("GET"))
        .and(path("/settings/rbac/users/local/Administrator"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "Administrator", "name": "", "roles": [{"role": "admin"}], "groups": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/settings/rbac/users/local/Administrator"))
        .and(header("authorization", ADMIN_AUTH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/settings/rbac/users/local/BOB"))
        .and(header("authorization", ROTATED_ADMIN_AUTH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let db = initialized(&server, true).await;
    let response = db.update_user(change_password("Administrator", "fresh")).await.unwrap();
    assert_eq!(response.rotated_root, Some(RotatedRoot::AdminPassword(SecretString::new("fresh"))));
    assert_eq!(db.producer().state().await, ProducerState::Closed);

    db.delete_user(DeleteUserRequest { username: "BOB".into(), ..Default::default() }).await.unwrap();
    assert_eq!(db.producer().state().await, ProducerState::Connected);
}

#[tokio::test]
async fn deleting_an_unknown_user_is_not_found() {
    let server = MockServer::start().await;
    mount_healthy_cluster(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/settings/rbac/users/local/NOBODY"))
        .respond_with(ResponseTemplate::new(404).set_body_string("User was not found."))
        .mount(&server)
        .await;

    let db = initialized(&server, false).await;
    let err = db.delete_user(DeleteUserRequest { username: "NOBODY".into(), ..Default::default() });
    assert!(err.await.unwrap_err().is_not_found());
}
