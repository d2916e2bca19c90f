//! Active health probing.
//!
//! # Responsibilities
//! - Issue a single HTTP probe against a service's health path
//! - Classify the outcome: success status, non-success, error, timeout
//!
//! The periodic schedule and the resulting state transitions live in the
//! supervisor; a prober only observes.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;
use url::Url;

use crate::orchestrator::descriptor::ProbeSpec;

/// HTTP prober bound to a single service instance.
pub struct HealthProber {
    name: String,
    url: Url,
    timeout: Duration,
    client: Client<HttpConnector, Body>,
}

impl HealthProber {
    pub fn new(name: &str, addr: SocketAddr, spec: &ProbeSpec) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let mut url = Url::parse(&format!("http://{}", addr)).expect("socket addr is a valid URL");
        url.set_path(&spec.path);

        Self {
            name: name.to_string(),
            url,
            timeout: spec.timeout,
            client,
        }
    }

    /// The URL this prober targets.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Issue one probe. Returns true when the service answered with a
    /// success status inside the timeout.
    pub async fn probe_once(&self) -> bool {
        let request = match Request::builder()
            .method("GET")
            .uri(self.url.as_str())
            .header("user-agent", "schema-stack-health-probe")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(service = %self.name, error = %e, "Failed to build probe request");
                return false;
            }
        };

        let response_future = self.client.request(request);

        match time::timeout(self.timeout, response_future).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::warn!(
                        service = %self.name,
                        status = %response.status(),
                        "Probe failed: non-success status"
                    );
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(service = %self.name, error = %e, "Probe failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(service = %self.name, "Probe failed: timeout");
                false
            }
        }
    }
}
