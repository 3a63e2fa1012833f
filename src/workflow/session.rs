use mongodb::bson::doc;

use crate::{
    crypto::{commit_national_id, derive_identity_commitment, verify_secret},
    error::{Error, Result},
    model::{
        api::{
            auth::{SessionToken, Terminal},
            LoginRequest, SessionGrant, VoterStatus,
        },
        db::{AuditAction, NewAuditEntry},
    },
};

use super::Context;

impl Context {
    /// Authenticate a voter at a terminal and issue a session credential.
    ///
    /// Local checks (biometric, then secret) come before the ledger check,
    /// which is made even though a local record exists.
    pub async fn login(&self, request: LoginRequest, terminal: &Terminal) -> Result<SessionGrant> {
        terminal.ensure_allowed(&self.config)?;
        request.validate()?;

        let aadhaar_commitment = commit_national_id(&request.national_id);
        let identity = self
            .identities
            .find_by_aadhaar_commitment(&aadhaar_commitment)
            .await?
            .ok_or(Error::NotRegistered)?;

        let similarity = request
            .biometric
            .check(&identity.biometric_template, &self.config)?;
        if !verify_secret(&request.secret, &identity.secret_commitment) {
            return Err(Error::SecretMismatch);
        }

        let identity_commitment = derive_identity_commitment(
            self.config.server_salt(),
            &aadhaar_commitment,
            &request.secret,
        );
        if identity_commitment != identity.identity_commitment {
            // Only possible if the server salt changed since registration.
            error!(
                "Identity commitment for {} does not match its stored value",
                identity.id
            );
            return Err(Error::NotOnLedger);
        }
        if !self.ledger.is_registered(&identity_commitment).await? {
            warn!("Identity {} is stored locally but not on the ledger", identity.id);
            return Err(Error::NotOnLedger);
        }

        self.identities.mark_verified_once(identity.id).await?;
        let token = SessionToken::new(identity.id, aadhaar_commitment).issue(&self.config)?;
        info!("Session issued for {} at {}", identity.id, terminal.site());

        let mut details = doc! { "terminal": terminal.site() };
        if let Some(similarity) = similarity {
            details.insert("similarity", similarity);
        }
        self.record_audit(NewAuditEntry::new(AuditAction::Login, identity.id, details))
            .await;

        Ok(SessionGrant {
            token,
            expires_in: self.config.auth_ttl().num_seconds(),
            identity_ref: identity.id.into(),
        })
    }

    /// The session holder's own record.
    pub async fn voter_status(&self, token: &SessionToken) -> Result<VoterStatus> {
        let identity = self
            .identities
            .find_by_ref(token.identity_ref())
            .await?
            .ok_or(Error::NotRegistered)?;
        if &identity.aadhaar_commitment != token.aadhaar_commitment() {
            return Err(Error::SessionInvalidOrExpired(
                "credential does not belong to this identity".to_string(),
            ));
        }
        Ok(identity.into())
    }
}
