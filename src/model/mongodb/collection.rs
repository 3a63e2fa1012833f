use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{AuditEntry, Ballot, Candidate, Identity, Party};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<&State<Database>>().await {
            request::Outcome::Success(db) => request::Outcome::Success(Coll::from_db(db)),
            _ => request::Outcome::Failure((Status::InternalServerError, ())),
        }
    }
}

// Identity collections
const VOTERS: &str = "voters";
impl MongoCollection for Identity {
    const NAME: &'static str = VOTERS;
}

// Ballot collections
const BALLOTS: &str = "ballots";
impl MongoCollection for Ballot {
    const NAME: &'static str = BALLOTS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}

// Party collections
const PARTIES: &str = "parties";
impl MongoCollection for Party {
    const NAME: &'static str = PARTIES;
}

// Audit collections
const AUDIT: &str = "audit";
impl MongoCollection for AuditEntry {
    const NAME: &'static str = AUDIT;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    let unique_index = |field: &str| {
        IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(unique.clone())
            .build()
    };

    // Identity collection.
    let identities = Coll::<Identity>::from_db(db);
    identities
        .create_index(unique_index("aadhaar_commitment"), None)
        .await?;
    identities
        .create_index(unique_index("identity_commitment"), None)
        .await?;

    // Ballot collection: at most one ballot per identity.
    Coll::<Ballot>::from_db(db)
        .create_index(unique_index("identity_ref"), None)
        .await?;

    // Candidate collection.
    Coll::<Candidate>::from_db(db)
        .create_index(unique_index("candidate_id"), None)
        .await?;

    // Party collection.
    Coll::<Party>::from_db(db)
        .create_index(unique_index("name"), None)
        .await?;

    Ok(())
}
