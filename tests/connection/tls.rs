use capella_dbplugin::config::{ClusterTlsConfig, ConnectionConfig};
use capella_dbplugin::connection::ProducerState;
use capella_dbplugin::plugin::{CapellaDatabase, InitializeRequest};
use capella_dbplugin::Error;
use serde_json::json;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::support::{direct_config, self_signed_pem};

#[tokio::test]
async fn empty_certificate_fails_before_connecting() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let mut config = direct_config("couchbases://127.0.0.1");
    config.insert("tls".into(), json!(true));
    config.insert("base64pem".into(), json!(""));

    let db = CapellaDatabase::new();
    let err = db.initialize(InitializeRequest { config, verify_connection: true }).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }), "{err}");
    assert_eq!(db.producer().state().await, ProducerState::Uninitialized);
}

#[tokio::test]
async fn undecodable_certificate_fails_verification() {
    let mut config = direct_config("couchbases://127.0.0.1");
    config.insert("tls".into(), json!("true"));
    config.insert("base64pem".into(), json!("!!not-base64!!"));

    let db = CapellaDatabase::new();
    let err = db.initialize(InitializeRequest { config, verify_connection: true }).await.unwrap_err();
    assert!(matches!(err, Error::Tls(_)), "{err}");
    assert_eq!(db.producer().state().await, ProducerState::Uninitialized);
}

#[test]
fn generated_root_builds_a_client_config() {
    let raw = {
        let mut raw = direct_config("couchbases://cb.example.com");
        raw.insert("tls".into(), json!(true));
        raw.insert("base64pem".into(), json!(self_signed_pem()));
        raw
    };
    let config = ConnectionConfig::from_raw(&raw).unwrap().prepare().unwrap();

    let tls = ClusterTlsConfig::from_connection_config(&config).unwrap().unwrap();
    assert_eq!(tls.roots.len(), 1);
    assert!(!tls.skip_verify);
    tls.client_config().unwrap();
}

#[tokio::test]
async fn tls_settings_accepted_without_verification() {
    let mut config = direct_config("couchbases://cb.example.com");
    config.insert("tls".into(), json!(true));
    config.insert("base64pem".into(), json!(self_signed_pem()));

    let db = CapellaDatabase::new();
    db.initialize(InitializeRequest { config, verify_connection: false }).await.unwrap();
    assert_eq!(db.producer().state().await, ProducerState::Initialized);
}
