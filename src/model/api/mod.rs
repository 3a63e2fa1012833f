//! API-friendly request and response types.
//!
//! Requests reject unknown fields and are checked with `validate()` before
//! anything touches a store or the ledger.

pub mod auth;

mod candidate;
pub use candidate::{CandidateRequest, CandidateView, PartyRequest, PartyView};

mod id;
pub use id::ApiId;

mod login;
pub use login::{LoginRequest, SessionGrant};

mod registration;
pub use registration::{RegistrationReceipt, RegistrationRequest};

mod results;
pub use results::{CandidateResult, Results};

mod vote;
pub use vote::{VoteReceipt, VoteRequest, VoterStatus};

use crate::error::{Error, Result};

/// Reject a required field that is empty once trimmed.
fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest(format!("{field} is required")));
    }
    Ok(())
}
