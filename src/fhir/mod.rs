//! HTTP client for the remote clinical data API
//!
//! Thin wrapper over `reqwest` speaking FHIR R4 JSON. Two request shapes are
//! used: a direct patient read (`GET {base}/Patient/{id}`) and a per-type
//! search (`GET {base}/{ResourceType}?patient={id}&_count={n}`) whose bundle
//! entries are unwrapped into plain resource records.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;

/// User agent sent with every FHIR request
pub const AGENT_USER_AGENT: &str = "healthagent-mcp";

/// Abstraction over the clinical data source.
///
/// The aggregator only talks to this trait, so tests can inject fakes with
/// controlled latency and failure behavior.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Retrieve exactly one patient record for the given identifier.
    async fn fetch_patient(&self, patient_id: &str) -> Result<Value, FetchError>;

    /// Retrieve the related records of one resource type for the patient.
    /// An empty list is a valid, non-error result.
    async fn search_resources(
        &self,
        resource_type: &'static str,
        patient_id: &str,
    ) -> Result<Vec<Value>, FetchError>;
}

/// FHIR client with a shared connection pool
#[derive(Clone)]
pub struct FhirClient {
    http: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl FhirClient {
    /// Create a new client against the given FHIR base URL.
    ///
    /// The transport timeout bounds a single hung request so it cannot
    /// silently consume the whole aggregation budget.
    pub fn new(base_url: &str, request_timeout: Duration, page_size: u32) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/fhir+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(AGENT_USER_AGENT));

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build FHIR HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        })
    }

    /// Create a client from the agent configuration.
    pub fn from_config(config: &crate::config::AgentConfig) -> Result<Self> {
        Self::new(
            &config.fhir_base_url,
            config.request_timeout(),
            config.page_size,
        )
    }

    fn patient_url(&self, patient_id: &str) -> String {
        format!("{}/Patient/{}", self.base_url, patient_id)
    }

    fn search_url(&self, resource_type: &str) -> String {
        format!("{}/{}", self.base_url, resource_type)
    }
}

/// Unwrap the `entry` list of a search bundle into plain resource records.
///
/// Total over arbitrary JSON: a missing or malformed `entry` list yields an
/// empty vector, and entries without a `resource` are skipped.
pub fn bundle_resources(bundle: &Value) -> Vec<Value> {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("resource"))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ResourceFetcher for FhirClient {
    async fn fetch_patient(&self, patient_id: &str) -> Result<Value, FetchError> {
        let url = self.patient_url(patient_id);
        debug!("Fetching patient record from {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            debug!("Patient {} did not resolve: HTTP {}", patient_id, status);
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!("HTTP {status}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Unavailable(e.to_string()))
    }

    async fn search_resources(
        &self,
        resource_type: &'static str,
        patient_id: &str,
    ) -> Result<Vec<Value>, FetchError> {
        let url = self.search_url(resource_type);
        debug!("Searching {} records for patient {}", resource_type, patient_id);

        let to_fetch_error = |reason: String| FetchError::ResourceFetch {
            resource_type,
            reason,
        };

        let response = self
            .http
            .get(&url)
            .query(&[
                ("patient", patient_id),
                ("_count", &self.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| to_fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} search returned HTTP {}", resource_type, status);
            return Err(to_fetch_error(format!("HTTP {status}")));
        }

        let bundle = response
            .json::<Value>()
            .await
            .map_err(|e| to_fetch_error(e.to_string()))?;

        Ok(bundle_resources(&bundle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_client() -> FhirClient {
        FhirClient::new("https://example.org/baseR4/", Duration::from_secs(15), 5).unwrap()
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = test_client();
        assert_eq!(
            client.patient_url("599"),
            "https://example.org/baseR4/Patient/599"
        );
        assert_eq!(
            client.search_url("Condition"),
            "https://example.org/baseR4/Condition"
        );
    }

    #[test]
    fn test_bundle_resources_unwraps_entries() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                { "resource": { "resourceType": "Condition", "id": "c1" } },
                { "fullUrl": "urn:uuid:no-resource-here" },
                { "resource": { "resourceType": "Condition", "id": "c2" } }
            ]
        });

        let resources = bundle_resources(&bundle);
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0]["id"], "c1");
        assert_eq!(resources[1]["id"], "c2");
    }

    #[test]
    fn test_bundle_resources_tolerates_malformed_bundles() {
        assert!(bundle_resources(&json!({})).is_empty());
        assert!(bundle_resources(&json!({ "entry": "not-an-array" })).is_empty());
        assert!(bundle_resources(&json!(null)).is_empty());
    }
}
