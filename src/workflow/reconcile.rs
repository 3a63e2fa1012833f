use std::collections::HashSet;

use mongodb::bson::doc;
use serde::Serialize;

use crate::{
    crypto::Commitment,
    error::{Error, Result},
    ledger::JournalSweep,
    model::{
        api::ApiId,
        db::{AuditAction, NewAuditEntry},
    },
};

use super::Context;

/// Differences found between the ledger and the local stores.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// Registered on the ledger with no local record. These cannot be
    /// rebuilt: the profile and biometric template were never on the ledger.
    pub ledger_orphans: Vec<Commitment>,
    /// Local identities the ledger registry doesn't know.
    pub missing_on_ledger: Vec<ApiId>,
    /// Voted on the ledger but not locally. `has_voted` has now been set.
    pub backfilled_votes: Vec<ApiId>,
    /// Voted on the ledger with no local ballot record.
    pub missing_ballots: Vec<ApiId>,
    /// Marked as voted locally with no vote on the ledger.
    pub unconfirmed_votes: Vec<ApiId>,
    /// Pending transactions re-checked during this run.
    pub journal: JournalSweep,
    pub ledger_candidates: u64,
    pub local_candidates: u64,
}

impl ReconciliationReport {
    /// True if nothing needed attention.
    pub fn is_consistent(&self) -> bool {
        self.ledger_orphans.is_empty()
            && self.missing_on_ledger.is_empty()
            && self.backfilled_votes.is_empty()
            && self.missing_ballots.is_empty()
            && self.unconfirmed_votes.is_empty()
            && self.journal.pending.is_empty()
            && self.ledger_candidates == self.local_candidates
    }
}

impl Context {
    /// Compare ledger state against the local stores, backfill what can be
    /// backfilled, and report the rest.
    pub async fn reconcile(&self) -> Result<ReconciliationReport> {
        let mut report = ReconciliationReport {
            journal: self.ledger.sweep_journal().await,
            ..Default::default()
        };

        let registry: HashSet<Commitment> = self
            .ledger
            .registered_identities()
            .await?
            .into_iter()
            .collect();
        let identities = self.identities.all().await?;
        let local: HashSet<Commitment> = identities
            .iter()
            .map(|identity| identity.identity_commitment)
            .collect();

        report.ledger_orphans = registry.difference(&local).copied().collect();
        report.ledger_orphans.sort();

        for identity in &identities {
            let id = ApiId::from(identity.id);
            if !registry.contains(&identity.identity_commitment) {
                report.missing_on_ledger.push(id);
                continue;
            }

            let voted_on_ledger = self.ledger.has_voted(&identity.identity_commitment).await?;
            match (voted_on_ledger, identity.has_voted) {
                (true, false) => {
                    match self.identities.mark_voted(identity.id).await {
                        Ok(()) | Err(Error::AlreadyVoted) => {}
                        Err(e) => return Err(e),
                    }
                    report.backfilled_votes.push(id);
                }
                (false, true) => report.unconfirmed_votes.push(id),
                _ => {}
            }
            if voted_on_ledger
                && self
                    .ballots
                    .find_by_identity(identity.id)
                    .await?
                    .is_none()
            {
                report.missing_ballots.push(id);
            }
        }

        report.ledger_candidates = self.ledger.candidate_count().await?;
        report.local_candidates = self.candidates.count().await?;

        if report.is_consistent() {
            info!("Reconciliation found no differences");
        } else {
            warn!(
                "Reconciliation: {} ledger orphans, {} missing on ledger, {} votes backfilled, \
                 {} missing ballots, {} unconfirmed votes, {} transactions still pending, \
                 {}/{} candidates (ledger/local)",
                report.ledger_orphans.len(),
                report.missing_on_ledger.len(),
                report.backfilled_votes.len(),
                report.missing_ballots.len(),
                report.unconfirmed_votes.len(),
                report.journal.pending.len(),
                report.ledger_candidates,
                report.local_candidates,
            );
        }

        self.record_audit(NewAuditEntry::new(
            AuditAction::Reconcile,
            "admin",
            doc! {
                "ledger_orphans": report.ledger_orphans.len() as i64,
                "missing_on_ledger": report.missing_on_ledger.len() as i64,
                "backfilled_votes": report.backfilled_votes.len() as i64,
                "missing_ballots": report.missing_ballots.len() as i64,
                "unconfirmed_votes": report.unconfirmed_votes.len() as i64,
            },
        ))
        .await;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::Config,
        model::{
            api::{RegistrationRequest, VoteRequest},
            store::IdentityStore,
        },
        workflow::testing,
    };

    use super::*;

    #[rocket::async_test]
    async fn consistent_state() {
        let (context, _, _) = testing::context(Config::example());
        testing::with_candidates(&context, &["Nila"]).await;
        let (_, _, token) = testing::registered_and_logged_in(&context).await;
        context
            .cast_vote(&token, &testing::terminal(), VoteRequest::example(0))
            .await
            .unwrap();

        let report = context.reconcile().await.unwrap();
        assert!(report.is_consistent(), "{report:?}");
        assert_eq!(report.ledger_candidates, 1);
    }

    #[rocket::async_test]
    async fn orphans_and_backfill() {
        let (context, store, ledger) = testing::context(Config::example());
        testing::with_candidates(&context, &["Nila"]).await;
        let (receipt, _, token) = testing::registered_and_logged_in(&context).await;

        // A ledger registration whose local record was never written.
        let orphan = crate::crypto::commit("orphan");
        context.ledger().register_identity(&orphan).await.unwrap();

        // A vote that settled on the ledger but was lost locally.
        context
            .cast_vote(&token, &testing::terminal(), VoteRequest::example(0))
            .await
            .unwrap();
        let mut identity = store.find_by_ref(*receipt.identity_ref).await.unwrap().unwrap();
        identity.has_voted = false;
        store.put_identity(identity);

        // A candidate only on the ledger.
        context.ledger().add_candidate("Arjun").await.unwrap();

        let report = context.reconcile().await.unwrap();
        assert_eq!(report.ledger_orphans, vec![orphan]);
        assert_eq!(report.backfilled_votes, vec![receipt.identity_ref]);
        assert!(report.missing_ballots.is_empty());
        assert_eq!(report.ledger_candidates, 2);
        assert_eq!(report.local_candidates, 1);
        assert!(!report.is_consistent());

        let identity = store.find_by_ref(*receipt.identity_ref).await.unwrap().unwrap();
        assert!(identity.has_voted);
        assert_eq!(ledger.tally(), vec![1, 0]);
    }

    #[rocket::async_test]
    async fn local_identity_missing_on_ledger() {
        let (registering, store, _) = testing::context(Config::example());
        registering
            .register(RegistrationRequest::example())
            .await
            .unwrap();
        let identity = store.all().await.unwrap().remove(0);

        let (context, other_store, _) = testing::context(Config::example());
        other_store.put_identity(identity.clone());

        let report = context.reconcile().await.unwrap();
        assert_eq!(report.missing_on_ledger, vec![ApiId::from(identity.id)]);
        assert!(report.ledger_orphans.is_empty());
    }
}
