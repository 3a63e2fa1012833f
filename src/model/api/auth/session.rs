use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::{
    crypto::Commitment,
    error::{Error, Result},
    model::mongodb::Id,
    Config,
};

/// A session credential issued at login, bound to one identity.
///
/// Stateless: there is no revocation list, it simply expires after
/// `auth_ttl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    #[serde(rename = "sub")]
    identity_ref: Id,
    #[serde(rename = "adh")]
    aadhaar_commitment: Commitment,
}

impl SessionToken {
    pub fn new(identity_ref: Id, aadhaar_commitment: Commitment) -> Self {
        Self {
            identity_ref,
            aadhaar_commitment,
        }
    }

    pub fn identity_ref(&self) -> Id {
        self.identity_ref
    }

    pub fn aadhaar_commitment(&self) -> &Commitment {
        &self.aadhaar_commitment
    }

    /// Sign this token into a bearer credential valid for `auth_ttl`.
    pub fn issue(self, config: &Config) -> Result<String> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    /// Check a bearer credential's signature and expiry.
    pub fn verify(credential: &str, config: &Config) -> Result<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(
            credential,
            &DecodingKey::from_secret(config.jwt_secret()),
            &validation,
        )
        .map(|data| data.claims.token)
        .map_err(|e| Error::SessionInvalidOrExpired(e.to_string()))
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: SessionToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionToken {
    type Error = Error;

    /// Read and verify the `Authorization: Bearer` credential.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<Config>>().await {
            request::Outcome::Success(config) => config,
            _ => {
                return request::Outcome::Failure((
                    Status::InternalServerError,
                    Error::Unauthorized("configuration unavailable".to_string()),
                ))
            }
        };
        let credential = match req
            .headers()
            .get_one("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(credential) => credential.trim(),
            None => {
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::SessionInvalidOrExpired("missing bearer credential".to_string()),
                ))
            }
        };
        match Self::verify(credential, config) {
            Ok(token) => request::Outcome::Success(token),
            Err(e) => request::Outcome::Failure((Status::Unauthorized, e)),
        }
    }
}
