//! Storage capabilities used by the workflows.
//!
//! Each trait is implemented on the matching [`Coll`](crate::model::mongodb::Coll),
//! and by an in-memory store for tests.

use serde::{Deserialize, Serialize};

use crate::{
    crypto::Commitment,
    error::Result,
    model::{
        db::{
            Ballot, Candidate, Identity, NewAuditEntry, NewBallot, NewCandidate, NewIdentity,
            NewParty, Party,
        },
        mongodb::Id,
    },
};

#[cfg(test)]
mod memory;
mod mongo;

#[cfg(test)]
pub use memory::MemoryStore;

#[rocket::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a new identity. Fails with `DuplicateIdentity` if either of
    /// its commitments is already taken.
    async fn create(&self, identity: NewIdentity) -> Result<Identity>;

    async fn find_by_aadhaar_commitment(&self, aadhaar: &Commitment) -> Result<Option<Identity>>;

    /// Find an identity sharing either contact detail.
    async fn find_by_contact(&self, email: &str, phone: &str) -> Result<Option<Identity>>;

    async fn find_by_ref(&self, identity_ref: Id) -> Result<Option<Identity>>;

    async fn mark_verified_once(&self, identity_ref: Id) -> Result<()>;

    /// Flip `has_voted` from false to true. Fails with `AlreadyVoted` if it
    /// was already set.
    async fn mark_voted(&self, identity_ref: Id) -> Result<()>;

    async fn all(&self) -> Result<Vec<Identity>>;
}

#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    /// Record a ballot. Fails with `AlreadyVoted` if the identity already
    /// has one.
    async fn insert(&self, ballot: NewBallot) -> Result<Ballot>;

    async fn find_by_identity(&self, identity_ref: Id) -> Result<Option<Ballot>>;

    /// Count ballots per candidate, and per casting site if `by_site`.
    /// Rows are ordered by candidate ID, then site.
    async fn tally(&self, by_site: bool) -> Result<Vec<TallyRow>>;
}

#[rocket::async_trait]
pub trait CandidateStore: Send + Sync {
    async fn insert(&self, candidate: NewCandidate) -> Result<Candidate>;

    async fn find(&self, candidate_id: u64) -> Result<Option<Candidate>>;

    /// All candidates, ordered by candidate ID.
    async fn list(&self) -> Result<Vec<Candidate>>;

    async fn count(&self) -> Result<u64>;
}

#[rocket::async_trait]
pub trait PartyStore: Send + Sync {
    /// Fails with `BadRequest` if the name is taken.
    async fn insert(&self, party: NewParty) -> Result<Party>;

    async fn find(&self, name: &str) -> Result<Option<Party>>;

    async fn list(&self) -> Result<Vec<Party>>;
}

#[rocket::async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: NewAuditEntry) -> Result<()>;
}

/// A ballot count for one candidate, optionally at one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyRow {
    pub candidate_id: u64,
    pub candidate_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casting_site: Option<String>,
    pub votes: u64,
}
