//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Commitments are serialised as `0x`-prefixed hex strings.

mod audit;
pub use audit::{AuditAction, AuditEntry, NewAuditEntry};

mod ballot;
pub use ballot::{Ballot, NewBallot};

mod candidate;
pub use candidate::{Candidate, NewCandidate};

mod identity;
pub use identity::{Identity, IdentityCore, NewIdentity, Profile};

mod party;
pub use party::{NewParty, Party, DEFAULT_PARTY_SYMBOL};
