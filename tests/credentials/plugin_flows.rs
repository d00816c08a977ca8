use capella_dbplugin::plugin::{
    apply_rotated_root, CapellaDatabase, ChangePassword, DeleteUserRequest, InitializeRequest,
    NewUserRequest, Statements, UpdateUserRequest, UsernameMetadata,
};
use capella_dbplugin::lifecycle::RotatedRoot;
use capella_dbplugin::secrets::SecretString;
use capella_dbplugin::Error;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::support::{mount_page, users_path, v4_config};

async fn initialized(server: &MockServer) -> CapellaDatabase {
    let db = CapellaDatabase::new();
    db.initialize(InitializeRequest { config: v4_config(server), verify_connection: false })
        .await
        .unwrap();
    db
}

fn new_user(password: &str, statements: Vec<String>) -> NewUserRequest {
    NewUserRequest {
        username_config: UsernameMetadata { display_name: "token".into(), role_name: "readonly".into() },
        statements: Statements { commands: statements },
        password: SecretString::new(password),
        ..Default::default()
    }
}

#[tokio::test]
async fn new_user_creates_generated_upper_case_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(users_path()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let db = initialized(&server).await;
    let response = db.new_user(new_user("Secr3t!", vec!["  ".into()])).await.unwrap();
    assert!(response.username.starts_with("V_TOKEN_READONLY_"), "{}", response.username);
    assert_eq!(response.username, response.username.to_uppercase());

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["name"], response.username.as_str());
    assert_eq!(body["password"], "Secr3t!");
    assert_eq!(body["access"][0]["privileges"], json!(["data_reader"]));
}

#[tokio::test]
async fn failed_create_never_leaks_secrets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(users_path()))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"message":"token SK cannot set password hunter2-long"}"#),
        )
        .mount(&server)
        .await;

    let db = initialized(&server).await;
    let err = db.new_user(new_user("hunter2-long", Vec::new())).await.unwrap_err();
    let text = err.to_string();
    assert!(matches!(err, Error::Remote { status: 400, .. }));
    assert!(!text.contains("hunter2-long"), "{text}");
    assert!(!text.contains("token SK"), "{text}");
}

#[tokio::test]
async fn root_rotation_switches_to_the_issued_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/organizations/org-1/apikeys/AK/rotate"))
        .and(header("authorization", "Bearer SK"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"secretKey": "issued"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 1, &[("u-1", "ALICE")], None).await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/u-1", users_path())))
        .and(header("authorization", "Bearer issued"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let db = initialized(&server).await;
    let request = UpdateUserRequest {
        username: "AK".into(),
        password: Some(ChangePassword { new_password: SecretString::new("requested"), ..Default::default() }),
        ..Default::default()
    };
    let rotated = db.update_user(request).await.unwrap().rotated_root.unwrap();
    assert_eq!(rotated, RotatedRoot::SecretKey(SecretString::new("issued")));
    assert_eq!(db.producer().config().await.unwrap().secret_key.expose_secret(), "issued");

    db.delete_user(DeleteUserRequest { username: "ALICE".into(), ..Default::default() }).await.unwrap();

    let mut persisted = v4_config(&server);
    apply_rotated_root(&mut persisted, &rotated);
    assert_eq!(persisted["secret_key"], "issued");
}

#[tokio::test]
async fn update_without_password_makes_no_calls() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let db = initialized(&server).await;
    let response = db.update_user(UpdateUserRequest { username: "ALICE".into(), ..Default::default() });
    assert!(response.await.unwrap().rotated_root.is_none());
}

#[tokio::test]
async fn reinitialize_with_bad_config_drops_the_old_one() {
    let server = MockServer::start().await;
    let db = initialized(&server).await;

    let mut broken = v4_config(&server);
    broken.remove("cloud_api_clusters_path");
    let err = db.initialize(InitializeRequest { config: broken, verify_connection: false }).await;
    assert!(matches!(err, Err(Error::Validation { .. })));

    let err = db.delete_user(DeleteUserRequest { username: "ALICE".into(), ..Default::default() });
    assert!(matches!(err.await, Err(Error::NotInitialized)));
}

#[tokio::test]
async fn verified_initialize_of_control_plane_config_opens_no_connection() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

    let db = CapellaDatabase::new();
    let response = db
        .initialize(InitializeRequest { config: v4_config(&server), verify_connection: true })
        .await
        .unwrap();
    assert_eq!(response.config["access_key"], "AK");
    assert!(db.producer().read().await.cached().is_none());
}

#[tokio::test]
async fn root_rotation_waits_for_in_flight_create() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(users_path()))
        .and(header("authorization", "Bearer SK"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(800)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/organizations/org-1/apikeys/AK/rotate"))
        .and(header("authorization", "Bearer SK"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"secretKey": "issued"})))
        .expect(1)
        .mount(&server)
        .await;

    let db = initialized(&server).await;
    let create = async {
        db.new_user(new_user("Secr3t!", Vec::new())).await.unwrap();
        Instant::now()
    };
    let rotate = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let request = UpdateUserRequest {
            username: "AK".into(),
            password: Some(ChangePassword { new_password: SecretString::new("requested"), ..Default::default() }),
            ..Default::default()
        };
        db.update_user(request).await.unwrap();
        Instant::now()
    };

    let (created_at, rotated_at) = tokio::join!(create, rotate);
    assert!(rotated_at >= created_at);
    assert_eq!(db.producer().config().await.unwrap().secret_key.expose_secret(), "issued");
}
