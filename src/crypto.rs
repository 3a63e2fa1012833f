//! Deterministic commitments over identity and secret material.
//!
//! A [`Commitment`] is a SHA-256 digest. It is rendered as a `0x`-prefixed
//! lowercase hex string everywhere it leaves the process: in the database,
//! in API responses, and in ledger calls, where it is the `bytes32` key of
//! the identity registry.

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const COMMITMENT_LEN: usize = 32;

/// A one-way commitment to some input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Commitment([u8; COMMITMENT_LEN]);

impl Commitment {
    pub fn as_bytes(&self) -> &[u8; COMMITMENT_LEN] {
        &self.0
    }
}

impl Display for Commitment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", HEXLOWER.encode(&self.0))
    }
}

impl Debug for Commitment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Commitment({self})")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitmentParseError {
    #[error("commitment is not valid hex")]
    NotHex,
    #[error("commitment must be {COMMITMENT_LEN} bytes, got {0}")]
    WrongLength(usize),
}

impl FromStr for Commitment {
    type Err = CommitmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        let bytes = HEXLOWER_PERMISSIVE
            .decode(hex.as_bytes())
            .map_err(|_| CommitmentParseError::NotHex)?;
        let bytes: [u8; COMMITMENT_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CommitmentParseError::WrongLength(b.len()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Commitment {
    type Error = CommitmentParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Commitment> for String {
    fn from(commitment: Commitment) -> Self {
        commitment.to_string()
    }
}

impl From<Commitment> for Bson {
    fn from(commitment: Commitment) -> Self {
        Bson::String(commitment.to_string())
    }
}

/// Commit to an arbitrary byte string.
pub fn commit(bytes: impl AsRef<[u8]>) -> Commitment {
    Commitment(Sha256::digest(bytes.as_ref()).into())
}

/// Commit to a national ID number. Whitespace and dashes are not significant,
/// so `1234 5678 9012` and `1234-5678-9012` commit identically.
pub fn commit_national_id(national_id: &str) -> Commitment {
    commit(normalise_national_id(national_id))
}

/// Strip formatting characters from a national ID.
pub fn normalise_national_id(national_id: &str) -> String {
    national_id
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Derive the ledger identity key from `salt|aadhaarCommitment|secret`.
///
/// The secret is only ever held transiently; registration and login derive
/// the same key from the same secret, and nothing else can reproduce it.
pub fn derive_identity_commitment(
    server_salt: &str,
    aadhaar_commitment: &Commitment,
    secret: &str,
) -> Commitment {
    commit(format!("{server_salt}|{aadhaar_commitment}|{secret}"))
}

/// Check a raw secret against its stored commitment.
pub fn verify_secret(secret: &str, expected: &Commitment) -> bool {
    // Compare every byte regardless of where the first difference is.
    let actual = commit(secret);
    actual
        .0
        .iter()
        .zip(expected.0.iter())
        .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
