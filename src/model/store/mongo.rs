use mongodb::{
    bson::{doc, from_document},
    options::FindOptions,
};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

use crate::{
    crypto::Commitment,
    error::{Error, Result},
    model::{
        db::{
            AuditEntry, Ballot, Candidate, Identity, NewAuditEntry, NewBallot, NewCandidate,
            NewIdentity, NewParty, Party,
        },
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
};

use super::{AuditLog, BallotStore, CandidateStore, IdentityStore, PartyStore, TallyRow};

#[rocket::async_trait]
impl IdentityStore for Coll<Identity> {
    async fn create(&self, identity: NewIdentity) -> Result<Identity> {
        let identity = Identity {
            id: Id::new(),
            identity,
        };
        match self.insert_one(&identity, None).await {
            Ok(_) => Ok(identity),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::DuplicateIdentity(
                "an identity with these commitments already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_aadhaar_commitment(&self, aadhaar: &Commitment) -> Result<Option<Identity>> {
        let filter = doc! { "aadhaar_commitment": aadhaar };
        Ok(self.find_one(filter, None).await?)
    }

    async fn find_by_contact(&self, email: &str, phone: &str) -> Result<Option<Identity>> {
        let filter = doc! {
            "$or": [
                { "email": email },
                { "phone": phone },
            ]
        };
        Ok(self.find_one(filter, None).await?)
    }

    async fn find_by_ref(&self, identity_ref: Id) -> Result<Option<Identity>> {
        Ok(self.find_one(identity_ref.as_doc(), None).await?)
    }

    async fn mark_verified_once(&self, identity_ref: Id) -> Result<()> {
        let result = self
            .update_one(
                identity_ref.as_doc(),
                doc! { "$set": { "verified_once": true } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(Error::NotRegistered);
        }
        Ok(())
    }

    async fn mark_voted(&self, identity_ref: Id) -> Result<()> {
        let filter = doc! {
            "_id": identity_ref,
            "has_voted": false,
        };
        let result = self
            .update_one(filter, doc! { "$set": { "has_voted": true } }, None)
            .await?;
        if result.matched_count == 0 {
            // Either it doesn't exist, or the flag was already set.
            return match self.find_by_ref(identity_ref).await? {
                Some(_) => Err(Error::AlreadyVoted),
                None => Err(Error::NotRegistered),
            };
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Identity>> {
        Ok((**self).find(None, None).await?.try_collect().await?)
    }
}

/// Shape of a `$group` stage output in [`BallotStore::tally`].
#[derive(Deserialize)]
struct TallyGroup {
    #[serde(rename = "_id")]
    key: TallyKey,
    votes: u64,
}

#[derive(Deserialize)]
struct TallyKey {
    candidate_id: u64,
    candidate_name: String,
    #[serde(default)]
    casting_site: Option<String>,
}

#[rocket::async_trait]
impl BallotStore for Coll<Ballot> {
    async fn insert(&self, ballot: NewBallot) -> Result<Ballot> {
        let ballot = Ballot {
            id: Id::new(),
            ballot,
        };
        match self.insert_one(&ballot, None).await {
            Ok(_) => Ok(ballot),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::AlreadyVoted),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_identity(&self, identity_ref: Id) -> Result<Option<Ballot>> {
        Ok(self
            .find_one(doc! { "identity_ref": identity_ref }, None)
            .await?)
    }

    async fn tally(&self, by_site: bool) -> Result<Vec<TallyRow>> {
        let key = if by_site {
            doc! {
                "candidate_id": "$candidate_id",
                "candidate_name": "$candidate_name",
                "casting_site": "$casting_site",
            }
        } else {
            doc! {
                "candidate_id": "$candidate_id",
                "candidate_name": "$candidate_name",
            }
        };
        let pipeline = vec![
            doc! { "$group": { "_id": key, "votes": { "$sum": 1 } } },
            doc! { "$sort": { "_id.candidate_id": 1, "_id.casting_site": 1 } },
        ];

        let mut rows = Vec::new();
        let mut cursor = self.aggregate(pipeline, None).await?;
        while let Some(group) = cursor.try_next().await? {
            let group: TallyGroup = from_document(group).map_err(|e| Error::Db(e.into()))?;
            rows.push(TallyRow {
                candidate_id: group.key.candidate_id,
                candidate_name: group.key.candidate_name,
                casting_site: group.key.casting_site,
                votes: group.votes,
            });
        }
        Ok(rows)
    }
}

#[rocket::async_trait]
impl CandidateStore for Coll<Candidate> {
    async fn insert(&self, candidate: NewCandidate) -> Result<Candidate> {
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        match self.insert_one(&candidate, None).await {
            Ok(_) => Ok(candidate),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::BadRequest(format!(
                "candidate {} is already mirrored locally",
                candidate.candidate_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(&self, candidate_id: u64) -> Result<Option<Candidate>> {
        Ok(self
            .find_one(doc! { "candidate_id": candidate_id as i64 }, None)
            .await?)
    }

    async fn list(&self) -> Result<Vec<Candidate>> {
        let options = FindOptions::builder()
            .sort(doc! { "candidate_id": 1 })
            .build();
        Ok((**self).find(None, options).await?.try_collect().await?)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.count_documents(None, None).await?)
    }
}

#[rocket::async_trait]
impl PartyStore for Coll<Party> {
    async fn insert(&self, party: NewParty) -> Result<Party> {
        let party = Party {
            id: Id::new(),
            party,
        };
        match self.insert_one(&party, None).await {
            Ok(_) => Ok(party),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::BadRequest(format!(
                "party {:?} already exists",
                party.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(&self, name: &str) -> Result<Option<Party>> {
        Ok(self.find_one(doc! { "name": name }, None).await?)
    }

    async fn list(&self) -> Result<Vec<Party>> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        Ok((**self).find(None, options).await?.try_collect().await?)
    }
}

#[rocket::async_trait]
impl AuditLog for Coll<AuditEntry> {
    async fn record(&self, entry: NewAuditEntry) -> Result<()> {
        let entry = AuditEntry {
            id: Id::new(),
            entry,
        };
        self.insert_one(&entry, None).await?;
        Ok(())
    }
}
