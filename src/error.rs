//! Error taxonomy for clinical data retrieval

use thiserror::Error;

/// Failures surfaced by the FHIR fetch layer.
///
/// Patient-level failures (`NotFound`, `Unavailable`) abort an aggregation
/// before any resource fan-out starts. `ResourceFetch` is recorded per
/// resource type and never propagates past the aggregator.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The patient identifier did not resolve on the FHIR server
    #[error("patient not found")]
    NotFound,

    /// Transport failure, timeout, or server error fetching the patient
    #[error("FHIR server unavailable: {0}")]
    Unavailable(String),

    /// A resource-type search failed; the section degrades to empty
    #[error("failed to fetch {resource_type}: {reason}")]
    ResourceFetch {
        resource_type: &'static str,
        reason: String,
    },
}

impl FetchError {
    /// True when the error should be reported to the user as "not found"
    /// rather than as a degraded summary.
    pub fn is_patient_level(&self) -> bool {
        matches!(self, FetchError::NotFound | FetchError::Unavailable(_))
    }
}
