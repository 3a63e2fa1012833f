use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request,
};

use crate::{
    error::{Error, Result},
    Config,
};

use super::TERMINAL_HEADER;

/// A call made from a controlled terminal (fog node or election centre).
/// The terminal ID is recorded as the casting site of any ballot it submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    site: String,
}

impl Terminal {
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// Check this terminal against the configured allow-list.
    pub fn ensure_allowed(&self, config: &Config) -> Result<()> {
        let allowed = config.terminals();
        if !allowed.is_empty() && !allowed.iter().any(|t| t == &self.site) {
            return Err(Error::Unauthorized(format!(
                "terminal {:?} is not permitted",
                self.site
            )));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Terminal {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.headers().get_one(TERMINAL_HEADER).map(str::trim) {
            Some(site) if !site.is_empty() => request::Outcome::Success(Terminal::new(site)),
            _ => request::Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized(format!("missing {TERMINAL_HEADER} header")),
            )),
        }
    }
}
