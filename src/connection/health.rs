//! Sample-bucket readiness, used when preparing a cluster for integration runs.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::{info, Instrument};

use super::management::ManagementCluster;
use super::retry::Probe;
use crate::errors::{Error, Result};

#[derive(Debug, Deserialize)]
struct SampleBucket {
    name: String,
    #[serde(default)]
    installed: bool,
}

/// Poll `/sampleBuckets` until `bucket` is reported installed.
///
/// A listing that cannot be decoded, or one that does not mention the bucket
/// at all, ends the wait immediately.
pub async fn wait_for_sample_bucket(
    cluster: &ManagementCluster,
    bucket: &str,
    timeout: Duration,
) -> Result<()> {
    let span = tracing::info_span!(parent: cluster.span(), "wait_for_sample_bucket", bucket = %bucket);
    cluster
        .retry()
        .run("sample bucket", timeout, || probe(cluster, bucket))
        .instrument(span)
        .await?;
    info!(parent: cluster.span(), bucket, endpoint = cluster.endpoint(), "Sample bucket installed");
    Ok(())
}

async fn probe(cluster: &ManagementCluster, bucket: &str) -> Probe<()> {
    let url = match cluster.url(&["sampleBuckets"]) {
        Ok(url) => url,
        Err(e) => return Probe::Permanent(e),
    };
    let response = match cluster.request(Method::GET, url).send().await {
        Ok(response) => response,
        Err(e) => return Probe::Retry(e.without_url().to_string()),
    };
    if response.status() != StatusCode::OK {
        return Probe::Retry(format!("status {}", response.status().as_u16()));
    }

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => return Probe::Retry(e.without_url().to_string()),
    };
    let samples: Vec<SampleBucket> = match serde_json::from_slice(&body) {
        Ok(samples) => samples,
        Err(e) => return Probe::Permanent(Error::decode(cluster.endpoint(), e.to_string())),
    };

    match samples.iter().find(|s| s.name == bucket) {
        Some(sample) if sample.installed => Probe::Ready(()),
        Some(_) => Probe::Retry(format!("{} not installed yet", bucket)),
        None => Probe::Permanent(Error::connection(format!("sample bucket '{}' is not offered", bucket))),
    }
}
