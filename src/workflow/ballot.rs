use chrono::Utc;
use mongodb::bson::doc;

use crate::{
    crypto::{derive_identity_commitment, verify_secret},
    error::{Error, Result},
    model::{
        api::{
            auth::{SessionToken, Terminal},
            VoteReceipt, VoteRequest,
        },
        db::{AuditAction, NewAuditEntry, NewBallot},
    },
};

use super::Context;

impl Context {
    /// Cast the session holder's vote.
    ///
    /// At most one attempt per identity runs at a time. The ledger vote is
    /// settled before `has_voted` is set and the ballot is recorded.
    pub async fn cast_vote(
        &self,
        token: &SessionToken,
        terminal: &Terminal,
        request: VoteRequest,
    ) -> Result<VoteReceipt> {
        terminal.ensure_allowed(&self.config)?;
        request.validate()?;

        let _pass = self.vote_gate.enter(token.identity_ref()).await;

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
        if !identity.verified_once {
            return Err(Error::Unauthorized(
                "identity has not been verified at a terminal".to_string(),
            ));
        }

        // Fresh re-confirmation, independent of the login-time checks.
        if !verify_secret(&request.secret, &identity.secret_commitment) {
            return Err(Error::SecretMismatch);
        }
        match &request.biometric {
            Some(evidence) => {
                evidence.check(&identity.biometric_template, &self.config)?;
            }
            None if self.config.vote_recheck_biometric() => {
                return Err(Error::BadRequest(
                    "biometric re-confirmation is required to vote".to_string(),
                ));
            }
            None => {}
        }

        if identity.has_voted {
            return Err(Error::AlreadyVoted);
        }

        let candidate_count = self.ledger.candidate_count().await?;
        let candidate_id = u64::try_from(request.candidate_id)
            .ok()
            .filter(|id| *id < candidate_count)
            .ok_or(Error::InvalidCandidate(request.candidate_id))?;
        let candidate = self
            .candidates
            .find(candidate_id)
            .await?
            .ok_or(Error::CandidateNotFound(candidate_id))?;

        let identity_commitment = derive_identity_commitment(
            self.config.server_salt(),
            &identity.aadhaar_commitment,
            &request.secret,
        );
        let ledger_tx = self
            .ledger
            .cast_vote(candidate_id, &identity_commitment)
            .await?;
        info!(
            "Vote by {} for candidate {candidate_id} settled in {ledger_tx}",
            identity.id
        );

        if let Err(e) = self.identities.mark_voted(identity.id).await {
            error!(
                "Vote by {} settled in {ledger_tx} but could not be marked locally: {e}",
                identity.id
            );
            return Err(e);
        }
        let ballot = NewBallot {
            identity_ref: identity.id,
            candidate_id,
            candidate_name: candidate.name.clone(),
            casting_site: terminal.site().to_string(),
            ledger_tx: ledger_tx.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.ballots.insert(ballot).await {
            error!(
                "Vote by {} settled in {ledger_tx} but its ballot could not be stored: {e}",
                identity.id
            );
            return Err(e);
        }

        self.record_audit(NewAuditEntry::new(
            AuditAction::Vote,
            identity.id,
            doc! {
                "candidate_id": candidate_id as i64,
                "casting_site": terminal.site(),
                "ledger_tx": ledger_tx.as_str(),
            },
        ))
        .await;

        Ok(VoteReceipt {
            ledger_tx,
            candidate_id,
            candidate_name: candidate.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::futures::future::join_all;

    use crate::{
        biometric::BiometricEvidence,
        config::Config,
        ledger::MemoryLedger,
        model::{api::RegistrationRequest, store::IdentityStore},
        workflow::testing,
    };

    use super::*;

    #[rocket::async_test]
    async fn register_login_vote_then_repeat() {
        let (context, store, ledger) = testing::context(Config::example());
        testing::with_candidates(&context, &["Nila", "Arjun"]).await;
        let (receipt, _, token) = testing::registered_and_logged_in(&context).await;

        let vote = context
            .cast_vote(&token, &testing::terminal(), VoteRequest::example(0))
            .await
            .unwrap();
        assert_eq!(vote.candidate_id, 0);
        assert_eq!(vote.candidate_name, "Nila");

        let identity = store.find_by_ref(*receipt.identity_ref).await.unwrap().unwrap();
        assert!(identity.has_voted);
        let ballots = store.ballots();
        assert_eq!(ballots.len(), 1);
        assert_eq!(ballots[0].casting_site, "CENTER-001");
        assert_eq!(ballots[0].ledger_tx, vote.ledger_tx);
        assert_eq!(ledger.tally(), vec![1, 0]);

        let submissions = ledger.submissions();
        let repeat = context
            .cast_vote(&token, &testing::terminal(), VoteRequest::example(1))
            .await;
        assert!(matches!(repeat, Err(Error::AlreadyVoted)));
        assert_eq!(ledger.submissions(), submissions);
        assert_eq!(ledger.tally(), vec![1, 0]);
    }

    #[rocket::async_test]
    async fn candidate_bounds_checked_before_ledger() {
        let (context, store, ledger) = testing::context(Config::example());
        testing::with_candidates(&context, &["Nila", "Arjun"]).await;
        let (_, _, token) = testing::registered_and_logged_in(&context).await;
        let submissions = ledger.submissions();

        for candidate_id in [2, -1, i64::MAX, i64::MIN] {
            let result = context
                .cast_vote(
                    &token,
                    &testing::terminal(),
                    VoteRequest::example(candidate_id),
                )
                .await;
            assert!(
                matches!(result, Err(Error::InvalidCandidate(id)) if id == candidate_id),
                "candidate {candidate_id}"
            );
        }
        assert_eq!(ledger.submissions(), submissions);
        assert!(store.ballots().is_empty());
    }

    #[rocket::async_test]
    async fn wrong_secret_at_vote_time() {
        let (context, store, ledger) = testing::context(Config::example());
        testing::with_candidates(&context, &["Nila"]).await;
        let (_, _, token) = testing::registered_and_logged_in(&context).await;
        let submissions = ledger.submissions();

        let mut request = VoteRequest::example(0);
        request.secret = "000000".to_string();
        let result = context
            .cast_vote(&token, &testing::terminal(), request)
            .await;
        assert!(matches!(result, Err(Error::SecretMismatch)));
        assert_eq!(ledger.submissions(), submissions);
        assert!(store.ballots().is_empty());
    }

    #[rocket::async_test]
    async fn unverified_identity_cannot_vote() {
        let (context, _, _) = testing::context(Config::example());
        testing::with_candidates(&context, &["Nila"]).await;
        let receipt = context
            .register(RegistrationRequest::example())
            .await
            .unwrap();
        let token = SessionToken::new(
            *receipt.identity_ref,
            crate::crypto::commit_national_id("123456789012"),
        );

        let result = context
            .cast_vote(&token, &testing::terminal(), VoteRequest::example(0))
            .await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[rocket::async_test]
    async fn ledger_is_the_judge_of_double_votes() {
        let (context, store, _) = testing::context(Config::example());
        testing::with_candidates(&context, &["Nila", "Arjun"]).await;
        let (receipt, _, token) = testing::registered_and_logged_in(&context).await;
        context
            .cast_vote(&token, &testing::terminal(), VoteRequest::example(0))
            .await
            .unwrap();

        // Forget the vote locally, as if the local write had been lost.
        let mut identity = store.find_by_ref(*receipt.identity_ref).await.unwrap().unwrap();
        identity.has_voted = false;
        store.put_identity(identity);

        let result = context
            .cast_vote(&token, &testing::terminal(), VoteRequest::example(1))
            .await;
        assert!(matches!(result, Err(Error::LedgerRejected(_))));
        assert_eq!(store.ballots().len(), 1);
    }

    #[rocket::async_test]
    async fn missing_local_candidate() {
        let (context, _, _) = testing::context(Config::example());
        testing::with_candidates(&context, &["Nila"]).await;
        // Added on the ledger only, as if mirroring had failed.
        context.ledger().add_candidate("Arjun").await.unwrap();
        let (_, _, token) = testing::registered_and_logged_in(&context).await;

        let result = context
            .cast_vote(&token, &testing::terminal(), VoteRequest::example(1))
            .await;
        assert!(matches!(result, Err(Error::CandidateNotFound(1))));
    }

    #[rocket::async_test]
    async fn biometric_recheck_when_configured() {
        let (context, _, _) = testing::context(Config::example_strict());
        testing::with_candidates(&context, &["Nila"]).await;
        let (_, _, token) = testing::registered_and_logged_in(&context).await;

        let result = context
            .cast_vote(&token, &testing::terminal(), VoteRequest::example(0))
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));

        let mut request = VoteRequest::example(0);
        let mut far = vec![0.0; 8];
        far[0] = 1.0;
        request.biometric = Some(BiometricEvidence::Sample(far));
        let result = context
            .cast_vote(&token, &testing::terminal(), request)
            .await;
        assert!(matches!(result, Err(Error::BiometricMismatch(_))));

        let mut request = VoteRequest::example(0);
        request.biometric = Some(BiometricEvidence::Sample(RegistrationRequest::template()));
        assert!(context
            .cast_vote(&token, &testing::terminal(), request)
            .await
            .is_ok());
    }

    #[rocket::async_test]
    async fn concurrent_votes_have_one_winner() {
        // Each vote waits a poll for settlement, so the attempts overlap.
        let (context, store, ledger) = testing::context_with_ledger(
            Config::example(),
            MemoryLedger::new().with_confirmation_delay(2),
        );
        testing::with_candidates(&context, &["Nila", "Arjun"]).await;
        let (_, _, token) = testing::registered_and_logged_in(&context).await;

        let context = Arc::new(context);
        let attempts = (0..8).map(|i| {
            let context = context.clone();
            let token = token.clone();
            async move {
                context
                    .cast_vote(&token, &testing::terminal(), VoteRequest::example(i % 2))
                    .await
            }
        });
        let results = join_all(attempts).await;

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let already_voted = results
            .iter()
            .filter(|r| matches!(r, Err(Error::AlreadyVoted)))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(already_voted, 7);
        assert_eq!(store.ballots().len(), 1);
        assert_eq!(ledger.tally().iter().sum::<u64>(), 1);
    }

    #[rocket::async_test]
    async fn session_for_other_identity_rejected() {
        let (context, _, _) = testing::context(Config::example());
        testing::with_candidates(&context, &["Nila"]).await;
        let (receipt, _, _) = testing::registered_and_logged_in(&context).await;

        let forged = SessionToken::new(
            *receipt.identity_ref,
            crate::crypto::commit_national_id("999999999999"),
        );
        let result = context
            .cast_vote(&forged, &testing::terminal(), VoteRequest::example(0))
            .await;
        assert!(matches!(result, Err(Error::SessionInvalidOrExpired(_))));
    }
}
