//! Fetching the service catalog from an AREDN node's `sysinfo` endpoint.

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::error::UpstreamError;

/// One entry of the upstream `services` array. Fields beyond the ones used
/// for projection are ignored by `serde`.
#[derive(Clone, Debug, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SysinfoResponse {
    #[serde(default)]
    services: Vec<Service>,
}

/// Polls one of several seed nodes for the current service catalog,
/// filtering by protocol and failing over to the next node on error.
pub struct UpstreamClient {
    nodes: Vec<String>,
    timeout: Duration,
    protocol_filter: String,
    client: reqwest::blocking::Client,
}

impl UpstreamClient {
    pub fn new(nodes: Vec<String>, timeout: Duration, protocol_filter: String) -> Self {
        UpstreamClient {
            nodes,
            timeout,
            protocol_filter,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Fetch and filter the service list, trying each configured node in
    /// order until one succeeds. An empty `services` array from a
    /// reachable node is a successful result, not a fail-over trigger.
    pub fn fetch_services(&self) -> Result<Vec<Service>, UpstreamError> {
        if self.nodes.is_empty() {
            return Err(UpstreamError::NoNodes);
        }

        let mut last_err = None;
        for node in &self.nodes {
            match self.fetch_from(node) {
                Ok(services) => return Ok(self.filter_by_protocol(services)),
                Err(e) => {
                    debug!("upstream node {node} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.expect("nodes is non-empty, so at least one attempt was made"))
    }

    fn fetch_from(&self, node: &str) -> Result<Vec<Service>, UpstreamError> {
        let url = format!("http://{node}/a/sysinfo?services=1");
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|source| UpstreamError::Request {
                node: node.to_string(),
                source,
            })?;
        let body = response.text().map_err(|source| UpstreamError::Request {
            node: node.to_string(),
            source,
        })?;
        let parsed: SysinfoResponse =
            serde_json::from_str(&body).map_err(|source| UpstreamError::InvalidJson {
                node: node.to_string(),
                source,
            })?;
        Ok(parsed.services)
    }

    fn filter_by_protocol(&self, services: Vec<Service>) -> Vec<Service> {
        let wanted = self.protocol_filter.to_lowercase();
        let bracket_tag = format!("[{wanted}]");
        services
            .into_iter()
            .filter(|s| {
                let protocol_matches = s
                    .protocol
                    .as_deref()
                    .is_some_and(|p| p.eq_ignore_ascii_case(&wanted));
                let name_tag_matches = s.name.to_lowercase().contains(&bracket_tag);
                protocol_matches || name_tag_matches
            })
            .collect()
    }
}
