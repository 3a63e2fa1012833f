use serde::{Deserialize, Serialize};

use crate::{
    biometric::BiometricEvidence,
    error::Result,
    ledger::TxRef,
    model::db::{Identity, Profile},
};

use super::{require, ApiId};

/// A vote, with a fresh re-confirmation of the voter's secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct VoteRequest {
    /// Signed so that negative values reach the bounds check rather than
    /// failing deserialization. Values above `i64::MAX` still fail to
    /// deserialize and are answered with 422, not `InvalidCandidate`.
    pub candidate_id: i64,
    pub secret: String,
    /// Required when the deployment re-checks biometrics at vote time.
    #[serde(default)]
    pub biometric: Option<BiometricEvidence>,
}

impl VoteRequest {
    pub fn validate(&self) -> Result<()> {
        require("secret", &self.secret)
    }
}

/// Proof that a vote settled on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub ledger_tx: TxRef,
    pub candidate_id: u64,
    pub candidate_name: String,
}

/// What a voter may see about their own record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterStatus {
    pub identity_ref: ApiId,
    pub registration_site: String,
    pub verified_once: bool,
    pub has_voted: bool,
    #[serde(flatten)]
    pub profile: Profile,
}

impl From<Identity> for VoterStatus {
    fn from(identity: Identity) -> Self {
        Self {
            identity_ref: identity.id.into(),
            registration_site: identity.identity.registration_site,
            verified_once: identity.identity.verified_once,
            has_voted: identity.identity.has_voted,
            profile: identity.identity.profile,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl VoteRequest {
        pub fn example(candidate_id: i64) -> Self {
            Self {
                candidate_id,
                secret: "123456".to_string(),
                biometric: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::from_str;

    use super::*;

    #[test]
    fn candidate_id_range() {
        let negative: VoteRequest = from_str(r#"{"candidateId":-1,"secret":"123456"}"#).unwrap();
        assert_eq!(negative.candidate_id, -1);

        let too_large = from_str::<VoteRequest>(
            r#"{"candidateId":9223372036854775808,"secret":"123456"}"#,
        );
        assert!(too_large.is_err());
    }
}
