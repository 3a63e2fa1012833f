use serde::{Deserialize, Serialize};

use crate::{
    crypto::normalise_national_id,
    error::{Error, Result},
    ledger::TxRef,
    model::db::Profile,
    Config,
};

use super::{require, ApiId};

/// Minimum length of a voter's secret.
pub const MIN_SECRET_LENGTH: usize = 4;

/// Enrolment data submitted by a registration terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// Raw national ID. Only its commitment is ever stored.
    pub national_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub dob: String,
    pub address: String,
    pub registration_site: String,
    /// Voter-chosen secret. Only its commitment is ever stored.
    pub secret: String,
    pub biometric_template: Vec<f64>,
}

impl RegistrationRequest {
    /// Reject missing or malformed fields.
    pub fn validate(&self, config: &Config) -> Result<()> {
        let national_id = normalise_national_id(&self.national_id);
        if national_id.is_empty() || !national_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::BadRequest(
                "nationalId must be a non-empty alphanumeric value".to_string(),
            ));
        }
        require("name", &self.name)?;
        require("phone", &self.phone)?;
        require("dob", &self.dob)?;
        require("address", &self.address)?;
        require("registrationSite", &self.registration_site)?;
        if !self.email.contains('@') {
            return Err(Error::BadRequest("email is not a valid address".to_string()));
        }
        if self.secret.chars().count() < MIN_SECRET_LENGTH {
            return Err(Error::BadRequest(format!(
                "secret must be at least {MIN_SECRET_LENGTH} characters"
            )));
        }
        if self.biometric_template.len() != config.template_len() {
            return Err(Error::BadRequest(format!(
                "biometricTemplate must have {} values, got {}",
                config.template_len(),
                self.biometric_template.len()
            )));
        }
        if self.biometric_template.iter().any(|v| !v.is_finite())
            || self.biometric_template.iter().all(|v| *v == 0.0)
        {
            return Err(Error::BadRequest(
                "biometricTemplate must be finite and non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn profile(&self) -> Profile {
        Profile {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            dob: self.dob.trim().to_string(),
            address: self.address.trim().to_string(),
        }
    }
}

/// Proof of a settled registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    pub identity_ref: ApiId,
    pub ledger_tx: TxRef,
}
