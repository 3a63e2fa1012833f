use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request, State,
};

use crate::{error::Error, Config};

use super::API_KEY_HEADER;

/// Proof that the caller holds the static admin API key.
#[derive(Debug)]
pub struct AdminKey(());

impl AdminKey {
    /// Verify a presented key against the configured argon2 hash.
    pub fn verify(key: &str, config: &Config) -> Result<Self, Error> {
        match argon2::verify_encoded(config.admin_key_hash(), key.as_bytes()) {
            Ok(true) => Ok(Self(())),
            Ok(false) => Err(Error::Unauthorized("invalid API key".to_string())),
            Err(e) => {
                error!("Admin key hash could not be checked: {e}");
                Err(Error::Unauthorized("invalid API key".to_string()))
            }
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminKey {
    type Error = Error;

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
        let key = match req.headers().get_one(API_KEY_HEADER) {
            Some(key) => key,
            None => {
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized(format!("missing {API_KEY_HEADER} header")),
                ))
            }
        };
        match Self::verify(key, config) {
            Ok(admin) => request::Outcome::Success(admin),
            Err(e) => request::Outcome::Failure((Status::Unauthorized, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_key_accepted() {
        assert!(AdminKey::verify("coordinator", &Config::example()).is_ok());
    }

    #[test]
    fn wrong_key_rejected() {
        assert!(matches!(
            AdminKey::verify("coordinator2", &Config::example()),
            Err(Error::Unauthorized(_))
        ));
    }
}
