use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    ledger::TxRef,
    model::db::{Candidate, NewParty, Party, DEFAULT_PARTY_SYMBOL},
};

use super::require;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CandidateRequest {
    pub name: String,
    /// Name of an existing party.
    #[serde(default)]
    pub party: Option<String>,
}

impl CandidateRequest {
    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        if let Some(party) = &self.party {
            require("party", party)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub candidate_id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    pub ledger_tx: TxRef,
}

impl From<Candidate> for CandidateView {
    fn from(candidate: Candidate) -> Self {
        let candidate = candidate.candidate;
        Self {
            candidate_id: candidate.candidate_id,
            name: candidate.name,
            party: candidate.party,
            ledger_tx: candidate.ledger_tx,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PartyRequest {
    pub name: String,
    pub leader: String,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl PartyRequest {
    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require("leader", &self.leader)
    }
}

impl From<PartyRequest> for NewParty {
    fn from(request: PartyRequest) -> Self {
        Self {
            name: request.name.trim().to_string(),
            leader: request.leader.trim().to_string(),
            symbol: request
                .symbol
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_PARTY_SYMBOL.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyView {
    pub name: String,
    pub leader: String,
    pub symbol: String,
}

impl From<Party> for PartyView {
    fn from(party: Party) -> Self {
        Self {
            name: party.party.name,
            leader: party.party.leader,
            symbol: party.party.symbol,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateRequest {
        pub fn example(name: &str) -> Self {
            Self {
                name: name.to_string(),
                party: None,
            }
        }
    }

    impl PartyRequest {
        pub fn example() -> Self {
            Self {
                name: "People's Front".to_string(),
                leader: "M. Iyer".to_string(),
                symbol: None,
            }
        }
    }
}
