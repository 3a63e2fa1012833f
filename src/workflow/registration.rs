use chrono::Utc;
use mongodb::bson::doc;

use crate::{
    crypto::{commit, commit_national_id, derive_identity_commitment},
    error::{Error, Result},
    model::{
        api::{RegistrationReceipt, RegistrationRequest},
        db::{AuditAction, NewAuditEntry, NewIdentity},
    },
};

use super::Context;

impl Context {
    /// Enrol a voter: settle their identity commitment on the ledger, then
    /// store the identity record.
    ///
    /// Nothing is stored locally unless the ledger accepted the identity.
    pub async fn register(&self, request: RegistrationRequest) -> Result<RegistrationReceipt> {
        request.validate(&self.config)?;

        let aadhaar_commitment = commit_national_id(&request.national_id);
        // Held until the local record exists, so a concurrent registration of
        // the same national ID sees it and never reaches the ledger.
        let _pass = self.registration_gate.enter(aadhaar_commitment).await;
        if self
            .identities
            .find_by_aadhaar_commitment(&aadhaar_commitment)
            .await?
            .is_some()
        {
            return Err(Error::AlreadyRegistered);
        }
        let profile = request.profile();
        if self.config.unique_contact()
            && self
                .identities
                .find_by_contact(&profile.email, &profile.phone)
                .await?
                .is_some()
        {
            return Err(Error::DuplicateIdentity(
                "email or phone number is already registered".to_string(),
            ));
        }

        let secret_commitment = commit(&request.secret);
        let identity_commitment = derive_identity_commitment(
            self.config.server_salt(),
            &aadhaar_commitment,
            &request.secret,
        );

        let ledger_tx = self.ledger.register_identity(&identity_commitment).await?;
        info!("Identity {identity_commitment} registered on the ledger in {ledger_tx}");

        let identity = NewIdentity {
            aadhaar_commitment,
            identity_commitment,
            secret_commitment,
            biometric_template: request.biometric_template,
            registration_site: request.registration_site.trim().to_string(),
            verified_once: false,
            has_voted: false,
            profile,
            created_at: Utc::now(),
        };
        let identity = match self.identities.create(identity).await {
            Ok(identity) => identity,
            Err(e) => {
                error!(
                    "Identity {identity_commitment} is on the ledger ({ledger_tx}) \
                     but could not be stored locally: {e}"
                );
                return Err(e);
            }
        };

        self.record_audit(NewAuditEntry::new(
            AuditAction::Register,
            identity.id,
            doc! {
                "registration_site": identity.registration_site.as_str(),
                "ledger_tx": ledger_tx.as_str(),
            },
        ))
        .await;

        Ok(RegistrationReceipt {
            identity_ref: identity.id.into(),
            ledger_tx,
        })
    }
}
