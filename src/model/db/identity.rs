use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::{crypto::Commitment, model::mongodb::Id};

/// Personal details collected at registration. Never sent to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub dob: String,
    pub address: String,
}

/// Core identity data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityCore {
    /// Hash of the normalised national ID. Unique.
    pub aadhaar_commitment: Commitment,
    /// The identity as known to the ledger. Unique.
    pub identity_commitment: Commitment,
    /// Hash of the voter's secret.
    pub secret_commitment: Commitment,
    /// Enrolled biometric feature vector.
    pub biometric_template: Vec<f64>,
    /// Site the voter enrolled at.
    pub registration_site: String,
    /// Set on the first successful login, never cleared.
    pub verified_once: bool,
    /// Set once a vote has settled on the ledger, never cleared.
    pub has_voted: bool,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// An identity without an ID.
pub type NewIdentity = IdentityCore;

/// An identity from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub identity: IdentityCore,
}

impl Deref for Identity {
    type Target = IdentityCore;

    fn deref(&self) -> &Self::Target {
        &self.identity
    }
}

impl DerefMut for Identity {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.identity
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Profile {
        pub fn example() -> Self {
            Self {
                name: "Asha Verma".to_string(),
                email: "asha@example.com".to_string(),
                phone: "+919800000001".to_string(),
                dob: "1990-04-12".to_string(),
                address: "12 Park Street, Kolkata".to_string(),
            }
        }

        pub fn example2() -> Self {
            Self {
                name: "Ravi Kumar".to_string(),
                email: "ravi@example.com".to_string(),
                phone: "+919800000002".to_string(),
                dob: "1985-09-30".to_string(),
                address: "4 MG Road, Bengaluru".to_string(),
            }
        }
    }
}
