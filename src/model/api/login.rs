use serde::{Deserialize, Serialize};

use crate::{biometric::BiometricEvidence, error::Result};

use super::{require, ApiId};

/// Credentials presented at a terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LoginRequest {
    pub national_id: String,
    pub secret: String,
    pub biometric: BiometricEvidence,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        require("nationalId", &self.national_id)?;
        require("secret", &self.secret)
    }
}

/// A bearer session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
    pub identity_ref: ApiId,
}
