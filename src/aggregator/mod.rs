//! Concurrent fetch-and-aggregate of a patient's clinical record
//!
//! Given a patient identifier, the aggregator fetches the patient resource
//! and eight related resource collections from the FHIR server, each as an
//! independent task under one shared wall-clock deadline. Completions are
//! polled in bounded increments so the deadline can be checked between
//! polls; at expiry the remaining tasks are cancelled and their sections
//! marked as timed out. The output is always a well-formed report string.

pub mod format;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::SummaryCache;
use crate::config::AgentConfig;
use crate::error::FetchError;
use crate::fhir::ResourceFetcher;

/// Message returned when the patient identifier does not resolve
pub const PATIENT_NOT_FOUND: &str = "❌ Patient not found.";

/// One entry of the fixed resource-type list: FHIR resource type, display
/// label, and the CodeableConcept-bearing field whose `text` is rendered.
#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub resource_type: &'static str,
    pub label: &'static str,
    pub field: &'static str,
}

/// The fixed, ordered resource-type list. The order defines the order of
/// sections in the final report and is stable across runs.
pub const SECTION_SPECS: [SectionSpec; 8] = [
    SectionSpec { resource_type: "Encounter", label: "Encounter", field: "type" },
    SectionSpec { resource_type: "Condition", label: "Condition", field: "code" },
    SectionSpec { resource_type: "Observation", label: "Observation", field: "code" },
    SectionSpec { resource_type: "DiagnosticReport", label: "Diagnostic Report", field: "code" },
    SectionSpec { resource_type: "Procedure", label: "Procedure", field: "code" },
    SectionSpec { resource_type: "MedicationStatement", label: "Medication", field: "medicationCodeableConcept" },
    SectionSpec { resource_type: "AllergyIntolerance", label: "Allergy", field: "code" },
    SectionSpec { resource_type: "FamilyMemberHistory", label: "Family History", field: "relationship" },
];

/// Outcome of one resource-type fetch. Exactly one per resource type after
/// an aggregation completes.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Records retrieved; an empty list means "no such records exist"
    Succeeded(Vec<Value>),
    /// The fetch raised an error; the section degrades to empty
    Failed(String),
    /// The shared deadline elapsed before the fetch completed
    TimedOut,
}

/// Result of one aggregation run
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub patient: Value,
    pub outcomes: HashMap<&'static str, FetchOutcome>,
    pub elapsed: Duration,
}

/// Scheduler for the per-type fan-out with a shared deadline
#[derive(Clone)]
pub struct ClinicalAggregator {
    fetcher: Arc<dyn ResourceFetcher>,
    cache: Option<Arc<SummaryCache>>,
    deadline: Duration,
    poll_interval: Duration,
}

impl ClinicalAggregator {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, deadline: Duration, poll_interval: Duration) -> Self {
        Self {
            fetcher,
            cache: None,
            deadline,
            poll_interval,
        }
    }

    pub fn from_config(fetcher: Arc<dyn ResourceFetcher>, config: &AgentConfig) -> Self {
        Self::new(fetcher, config.aggregation_deadline(), config.poll_interval())
    }

    /// Layer an injected cache over the resource fetches. Only successful
    /// results are cached, so a cache hit can never mask a timeout.
    pub fn with_cache(mut self, cache: Arc<SummaryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Produce the clinical summary for a patient identifier.
    ///
    /// This is the tool-facing entry point: patient-level failures collapse
    /// into the fixed not-found message and no error escapes.
    pub async fn summarize(&self, patient_id: &str) -> String {
        match self.aggregate(patient_id).await {
            Ok(aggregation) => format::render_summary_with_elapsed(
                &aggregation.patient,
                &aggregation.outcomes,
                Some(aggregation.elapsed),
            ),
            Err(e) => {
                warn!("Aggregation for patient {} aborted: {}", patient_id, e);
                PATIENT_NOT_FOUND.to_string()
            }
        }
    }

    /// Run one aggregation: fetch the patient record, then fan out over the
    /// fixed resource-type list. Patient-level errors abort before any
    /// resource fetch starts.
    pub async fn aggregate(&self, patient_id: &str) -> Result<Aggregation, FetchError> {
        let started = Instant::now();

        let patient = self.fetcher.fetch_patient(patient_id).await?;
        debug!("Patient {} resolved, starting resource fan-out", patient_id);

        let outcomes = self.fan_out(patient_id, started).await;
        let elapsed = started.elapsed();

        let timed_out = outcomes
            .values()
            .filter(|o| matches!(o, FetchOutcome::TimedOut))
            .count();
        info!(
            "Aggregated {} resource types for patient {} in {:.1}s ({} timed out)",
            SECTION_SPECS.len(),
            patient_id,
            elapsed.as_secs_f64(),
            timed_out
        );

        Ok(Aggregation {
            patient,
            outcomes,
            elapsed,
        })
    }

    /// Launch one fetch task per resource type and gather completions until
    /// all are done or the deadline (measured from `started`) elapses.
    async fn fan_out(
        &self,
        patient_id: &str,
        started: Instant,
    ) -> HashMap<&'static str, FetchOutcome> {
        let mut outcomes: HashMap<&'static str, FetchOutcome> = HashMap::new();
        let mut tasks: JoinSet<(&'static str, Result<Vec<Value>, FetchError>)> = JoinSet::new();

        for spec in &SECTION_SPECS {
            if let Some(cache) = &self.cache {
                if let Some(records) = cache.get(spec.resource_type, patient_id).await {
                    debug!("Cache hit for {}/{}", spec.resource_type, patient_id);
                    outcomes.insert(spec.resource_type, FetchOutcome::Succeeded(records));
                    continue;
                }
            }

            let fetcher = Arc::clone(&self.fetcher);
            let resource_type = spec.resource_type;
            let patient_id = patient_id.to_string();
            tasks.spawn(async move {
                let result = fetcher.search_resources(resource_type, &patient_id).await;
                (resource_type, result)
            });
        }

        while !tasks.is_empty() {
            let Some(remaining) = self.deadline.checked_sub(started.elapsed()) else {
                break;
            };
            let wait = remaining.min(self.poll_interval);

            match timeout(wait, tasks.join_next()).await {
                Ok(Some(Ok((resource_type, Ok(records))))) => {
                    if let Some(cache) = &self.cache {
                        cache.insert(resource_type, patient_id, records.clone()).await;
                    }
                    outcomes.insert(resource_type, FetchOutcome::Succeeded(records));
                }
                Ok(Some(Ok((resource_type, Err(e))))) => {
                    warn!("Fetch of {} failed: {}", resource_type, e);
                    outcomes.insert(resource_type, FetchOutcome::Failed(e.to_string()));
                }
                Ok(Some(Err(join_error))) => {
                    // A panicked task carries no resource type; its section
                    // falls through to the timed-out marker below.
                    warn!("Resource fetch task aborted: {}", join_error);
                }
                Ok(None) => break,
                // Poll tick elapsed with nothing finished; loop around to
                // re-check the deadline.
                Err(_) => continue,
            }
        }

        // Deadline expired with fetches still pending: cancel them so the
        // connections are released instead of left running unobserved.
        if !tasks.is_empty() {
            debug!("Deadline reached, cancelling {} pending fetches", tasks.len());
            tasks.abort_all();
        }

        for spec in &SECTION_SPECS {
            outcomes
                .entry(spec.resource_type)
                .or_insert(FetchOutcome::TimedOut);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_specs_are_unique_and_complete() {
        let mut seen = std::collections::HashSet::new();
        for spec in &SECTION_SPECS {
            assert!(seen.insert(spec.resource_type), "duplicate {}", spec.resource_type);
        }
        assert_eq!(SECTION_SPECS.len(), 8);
    }

    #[test]
    fn test_section_spec_order_is_stable() {
        let order: Vec<&str> = SECTION_SPECS.iter().map(|s| s.resource_type).collect();
        assert_eq!(
            order,
            vec![
                "Encounter",
                "Condition",
                "Observation",
                "DiagnosticReport",
                "Procedure",
                "MedicationStatement",
                "AllergyIntolerance",
                "FamilyMemberHistory",
            ]
        );
    }
}
