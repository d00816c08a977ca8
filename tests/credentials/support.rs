use capella_dbplugin::plugin::RawConfig;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLUSTER_PATH: &str = "/organizations/org-1/projects/p-1/clusters/c-1";

/// Raw v4 configuration pointing at the mock server.
pub fn v4_config(server: &MockServer) -> RawConfig {
    json!({
        "access_key": "AK",
        "secret_key": "SK",
        "cluster_id": "c-1",
        "cloud_api_base_url": server.uri(),
        "cloud_api_clusters_path": CLUSTER_PATH,
        "request_timeout_seconds": 5
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn users_path() -> String {
    format!("{}/users", CLUSTER_PATH)
}

/// Serve one listing page; `next` is the relative link to the following page.
pub async fn mount_page(server: &MockServer, page: u32, users: &[(&str, &str)], next: Option<u32>) {
    let data: Vec<_> = users.iter().map(|(id, name)| json!({"id": id, "name": name})).collect();
    let next_link = next
        .map(|n| format!("{}{}?page={}&perPage=100", server.uri(), users_path(), n))
        .unwrap_or_default();

    Mock::given(method("GET"))
        .and(path(users_path()))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": data,
            "cursor": {"hrefs": {"next": next_link}, "pages": {"page": page, "next": next, "perPage": 100}}
        })))
        .mount(server)
        .await;
}
