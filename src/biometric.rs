//! Biometric template comparison.
//!
//! Templates are fixed-length embedding vectors produced at the terminal.
//! Two templates are compared by cosine similarity and accepted when the
//! score reaches the configured threshold.

use serde::{Deserialize, Serialize};

use crate::config::{BiometricMode, Config};
use crate::error::{Error, Result};

/// Default minimum similarity for a biometric match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.80;

/// Cosine similarity of two templates, in `[-1, 1]`.
///
/// Templates of differing length, empty templates, and zero vectors score 0,
/// which never matches a positive threshold.
pub fn score(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });
    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    (dot / denominator).clamp(-1.0, 1.0)
}

/// Does the score reach the threshold?
pub fn matches(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Biometric evidence presented alongside a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum BiometricEvidence {
    /// A freshly captured template, compared against the stored one.
    Sample(Vec<f64>),
    /// The terminal's own verdict, for deployments where matching happens
    /// on the capture device.
    Confirmed(bool),
}

impl BiometricEvidence {
    /// Check this evidence against a stored template under the deployment's
    /// biometric mode. Returns the similarity score when one was computed.
    pub fn check(&self, template: &[f64], config: &Config) -> Result<Option<f64>> {
        match (self, config.biometric_mode()) {
            (Self::Sample(sample), _) => {
                let similarity = score(template, sample);
                if matches(similarity, config.match_threshold()) {
                    Ok(Some(similarity))
                } else {
                    Err(Error::BiometricMismatch(similarity))
                }
            }
            (Self::Confirmed(true), BiometricMode::TerminalConfirmed) => Ok(None),
            (Self::Confirmed(false), BiometricMode::TerminalConfirmed) => {
                Err(Error::BiometricMismatch(0.0))
            }
            (Self::Confirmed(_), BiometricMode::Template) => Err(Error::BadRequest(
                "this deployment requires a biometric sample".to_string(),
            )),
        }
    }
}
