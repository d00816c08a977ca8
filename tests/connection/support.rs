use base64::{engine::general_purpose::STANDARD, Engine as _};
use capella_dbplugin::plugin::RawConfig;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Security-manager configuration talking to the mock server directly.
pub fn direct_config(hosts: &str) -> RawConfig {
    json!({
        "access_key": "AK",
        "secret_key": "SK",
        "cluster_id": "c-1",
        "credential_api": "security_manager",
        "hosts": hosts,
        "username": "Administrator",
        "password": "admin-pw",
        "bucket_name": "travel-sample",
        "request_timeout_seconds": 5
    })
    .as_object()
    .cloned()
    .unwrap()
}

/// A freshly generated self-signed certificate, base64-encoded PEM.
pub fn self_signed_pem() -> String {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    STANDARD.encode(certified.cert.pem())
}

/// A single healthy node serving `travel-sample`.
pub async fn mount_healthy_cluster(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/pools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"implementationVersion": "7.6.2"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pools/default/buckets/travel-sample"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "travel-sample", "nodes": [{"status": "healthy"}]})),
        )
        .mount(server)
        .await;
}
