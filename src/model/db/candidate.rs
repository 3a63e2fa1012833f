use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::{ledger::TxRef, model::mongodb::Id};

/// Local mirror of a ledger candidate. `candidate_id` is the ledger's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub candidate_id: u64,
    pub name: String,
    pub party: Option<String>,
    pub ledger_tx: TxRef,
}

pub type NewCandidate = CandidateCore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}
