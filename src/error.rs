use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a request can fail.
///
/// Validation and uniqueness failures are raised before any ledger call is
/// made. Ledger failures are passed through as-is and never retried here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Duplicate identity: {0}")]
    DuplicateIdentity(String),
    #[error("This national ID is already registered")]
    AlreadyRegistered,
    #[error("No identity is registered for these credentials")]
    NotRegistered,
    #[error("Biometric sample does not match (similarity {0:.3})")]
    BiometricMismatch(f64),
    #[error("Secret does not match")]
    SecretMismatch,
    #[error("Identity is not registered on the ledger")]
    NotOnLedger,
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("Ledger rejected the transaction: {0}")]
    LedgerRejected(String),
    #[error("This identity has already voted")]
    AlreadyVoted,
    #[error("Candidate {0} is outside the ledger's candidate range")]
    InvalidCandidate(i64),
    #[error("Candidate {0} not found")]
    CandidateNotFound(u64),
    #[error("Session invalid or expired: {0}")]
    SessionInvalidOrExpired(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

impl Error {
    /// Stable machine-readable name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateIdentity(_) => "DuplicateIdentity",
            Self::AlreadyRegistered => "AlreadyRegistered",
            Self::NotRegistered => "NotRegistered",
            Self::BiometricMismatch(_) => "BiometricMismatch",
            Self::SecretMismatch => "SecretMismatch",
            Self::NotOnLedger => "NotOnLedger",
            Self::LedgerUnavailable(_) => "LedgerUnavailable",
            Self::LedgerRejected(_) => "LedgerRejected",
            Self::AlreadyVoted => "AlreadyVoted",
            Self::InvalidCandidate(_) => "InvalidCandidate",
            Self::CandidateNotFound(_) => "CandidateNotFound",
            Self::SessionInvalidOrExpired(_) => "SessionInvalidOrExpired",
            Self::Unauthorized(_) => "Unauthorized",
            Self::BadRequest(_) => "BadRequest",
            Self::Db(_) | Self::Jwt(_) => "Internal",
        }
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) | Self::InvalidCandidate(_) => Status::BadRequest,
            Self::SessionInvalidOrExpired(_) | Self::Unauthorized(_) => Status::Unauthorized,
            Self::BiometricMismatch(_) | Self::SecretMismatch | Self::NotOnLedger => {
                Status::Forbidden
            }
            Self::NotRegistered | Self::CandidateNotFound(_) => Status::NotFound,
            Self::DuplicateIdentity(_) | Self::AlreadyRegistered | Self::AlreadyVoted => {
                Status::Conflict
            }
            Self::LedgerRejected(_) => Status::BadGateway,
            Self::LedgerUnavailable(_) => Status::ServiceUnavailable,
            Self::Db(_) | Self::Jwt(_) => Status::InternalServerError,
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let message = if status.class() == StatusClass::ServerError {
            error!("{self}");
            // Don't leak database internals.
            match &self {
                Self::Db(_) | Self::Jwt(_) => "Internal server error".to_string(),
                _ => self.to_string(),
            }
        } else {
            debug!("Request failed: {self}");
            self.to_string()
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
        };
        (status, Json(body)).respond_to(req)
    }
}
