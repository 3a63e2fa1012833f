use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::{ledger::TxRef, model::mongodb::Id};

/// Local record of a vote that has settled on the ledger.
///
/// One per identity, enforced by a unique index on `identity_ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotCore {
    pub identity_ref: Id,
    pub candidate_id: u64,
    pub candidate_name: String,
    pub casting_site: String,
    pub ledger_tx: TxRef,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A ballot without an ID.
pub type NewBallot = BallotCore;

/// A ballot from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ballot: BallotCore,
}

impl Deref for Ballot {
    type Target = BallotCore;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}
