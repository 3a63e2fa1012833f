use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    crypto::Commitment,
    error::{Error, Result},
    model::{
        db::{
            AuditEntry, Ballot, Candidate, Identity, NewAuditEntry, NewBallot, NewCandidate,
            NewIdentity, NewParty, Party,
        },
        mongodb::Id,
    },
};

use super::{AuditLog, BallotStore, CandidateStore, IdentityStore, PartyStore, TallyRow};

/// Every store in one place, with the same uniqueness rules as the indexed
/// MongoDB collections.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    identities: Vec<Identity>,
    ballots: Vec<Ballot>,
    candidates: Vec<Candidate>,
    parties: Vec<Party>,
    audit: Vec<AuditEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every audit entry recorded so far.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner().audit.clone()
    }

    /// Every ballot recorded so far.
    pub fn ballots(&self) -> Vec<Ballot> {
        self.inner().ballots.clone()
    }

    /// Overwrite an identity, bypassing every check.
    pub fn put_identity(&self, identity: Identity) {
        let mut inner = self.inner();
        inner.identities.retain(|i| i.id != identity.id);
        inner.identities.push(identity);
    }
}

#[rocket::async_trait]
impl IdentityStore for MemoryStore {
    async fn create(&self, identity: NewIdentity) -> Result<Identity> {
        let mut inner = self.inner();
        let taken = inner.identities.iter().any(|i| {
            i.aadhaar_commitment == identity.aadhaar_commitment
                || i.identity_commitment == identity.identity_commitment
        });
        if taken {
            return Err(Error::DuplicateIdentity(
                "an identity with these commitments already exists".to_string(),
            ));
        }
        let identity = Identity {
            id: Id::new(),
            identity,
        };
        inner.identities.push(identity.clone());
        Ok(identity)
    }

    async fn find_by_aadhaar_commitment(&self, aadhaar: &Commitment) -> Result<Option<Identity>> {
        Ok(self
            .inner()
            .identities
            .iter()
            .find(|i| &i.aadhaar_commitment == aadhaar)
            .cloned())
    }

    async fn find_by_contact(&self, email: &str, phone: &str) -> Result<Option<Identity>> {
        Ok(self
            .inner()
            .identities
            .iter()
            .find(|i| i.profile.email == email || i.profile.phone == phone)
            .cloned())
    }

    async fn find_by_ref(&self, identity_ref: Id) -> Result<Option<Identity>> {
        Ok(self
            .inner()
            .identities
            .iter()
            .find(|i| i.id == identity_ref)
            .cloned())
    }

    async fn mark_verified_once(&self, identity_ref: Id) -> Result<()> {
        let mut inner = self.inner();
        let identity = inner
            .identities
            .iter_mut()
            .find(|i| i.id == identity_ref)
            .ok_or(Error::NotRegistered)?;
        identity.verified_once = true;
        Ok(())
    }

    async fn mark_voted(&self, identity_ref: Id) -> Result<()> {
        let mut inner = self.inner();
        let identity = inner
            .identities
            .iter_mut()
            .find(|i| i.id == identity_ref)
            .ok_or(Error::NotRegistered)?;
        if identity.has_voted {
            return Err(Error::AlreadyVoted);
        }
        identity.has_voted = true;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Identity>> {
        Ok(self.inner().identities.clone())
    }
}

#[rocket::async_trait]
impl BallotStore for MemoryStore {
    async fn insert(&self, ballot: NewBallot) -> Result<Ballot> {
        let mut inner = self.inner();
        if inner
            .ballots
            .iter()
            .any(|b| b.identity_ref == ballot.identity_ref)
        {
            return Err(Error::AlreadyVoted);
        }
        let ballot = Ballot {
            id: Id::new(),
            ballot,
        };
        inner.ballots.push(ballot.clone());
        Ok(ballot)
    }

    async fn find_by_identity(&self, identity_ref: Id) -> Result<Option<Ballot>> {
        Ok(self
            .inner()
            .ballots
            .iter()
            .find(|b| b.identity_ref == identity_ref)
            .cloned())
    }

    async fn tally(&self, by_site: bool) -> Result<Vec<TallyRow>> {
        let mut groups: BTreeMap<(u64, Option<String>), (String, u64)> = BTreeMap::new();
        for ballot in &self.inner().ballots {
            let site = by_site.then(|| ballot.casting_site.clone());
            groups
                .entry((ballot.candidate_id, site))
                .or_insert_with(|| (ballot.candidate_name.clone(), 0))
                .1 += 1;
        }
        Ok(groups
            .into_iter()
            .map(|((candidate_id, casting_site), (candidate_name, votes))| TallyRow {
                candidate_id,
                candidate_name,
                casting_site,
                votes,
            })
            .collect())
    }
}

#[rocket::async_trait]
impl CandidateStore for MemoryStore {
    async fn insert(&self, candidate: NewCandidate) -> Result<Candidate> {
        let mut inner = self.inner();
        if inner
            .candidates
            .iter()
            .any(|c| c.candidate_id == candidate.candidate_id)
        {
            return Err(Error::BadRequest(format!(
                "candidate {} is already mirrored locally",
                candidate.candidate_id
            )));
        }
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        inner.candidates.push(candidate.clone());
        Ok(candidate)
    }

    async fn find(&self, candidate_id: u64) -> Result<Option<Candidate>> {
        Ok(self
            .inner()
            .candidates
            .iter()
            .find(|c| c.candidate_id == candidate_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Candidate>> {
        let mut candidates = self.inner().candidates.clone();
        candidates.sort_by_key(|c| c.candidate_id);
        Ok(candidates)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.inner().candidates.len() as u64)
    }
}

#[rocket::async_trait]
impl PartyStore for MemoryStore {
    async fn insert(&self, party: NewParty) -> Result<Party> {
        let mut inner = self.inner();
        if inner.parties.iter().any(|p| p.name == party.name) {
            return Err(Error::BadRequest(format!(
                "party {:?} already exists",
                party.name
            )));
        }
        let party = Party { id: Id::new(), party };
        inner.parties.push(party.clone());
        Ok(party)
    }

    async fn find(&self, name: &str) -> Result<Option<Party>> {
        Ok(self
            .inner()
            .parties
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Party>> {
        let mut parties = self.inner().parties.clone();
        parties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(parties)
    }
}

#[rocket::async_trait]
impl AuditLog for MemoryStore {
    async fn record(&self, entry: NewAuditEntry) -> Result<()> {
        self.inner().audit.push(AuditEntry {
            id: Id::new(),
            entry,
        });
        Ok(())
    }
}
