use serde::{Deserialize, Serialize};

use crate::model::store::TallyRow;

/// Vote count for one candidate, optionally at one casting site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub candidate_id: u64,
    pub candidate_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casting_site: Option<String>,
    pub votes: u64,
}

impl From<TallyRow> for CandidateResult {
    fn from(row: TallyRow) -> Self {
        Self {
            candidate_id: row.candidate_id,
            candidate_name: row.candidate_name,
            casting_site: row.casting_site,
            votes: row.votes,
        }
    }
}

/// Locally recorded results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Results {
    pub by_site: bool,
    pub total_votes: u64,
    pub rows: Vec<CandidateResult>,
}
