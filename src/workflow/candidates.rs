use mongodb::bson::doc;

use crate::{
    error::{Error, Result},
    model::{
        api::{CandidateRequest, CandidateResult, CandidateView, PartyRequest, PartyView, Results},
        db::{AuditAction, NewAuditEntry, NewCandidate, NewParty},
    },
};

use super::Context;

const ADMIN_ACTOR: &str = "admin";

impl Context {
    /// Add a candidate to the ledger, then mirror it locally under the
    /// index the ledger assigned.
    pub async fn add_candidate(&self, request: CandidateRequest) -> Result<CandidateView> {
        request.validate()?;
        let name = request.name.trim().to_string();
        let party = match request.party {
            Some(party) => {
                let party = party.trim();
                if self.parties.find(party).await?.is_none() {
                    return Err(Error::BadRequest(format!("party {party:?} does not exist")));
                }
                Some(party.to_string())
            }
            None => None,
        };

        let (candidate_id, ledger_tx) = self.ledger.add_candidate(&name).await?;
        info!("Candidate {name:?} added to the ledger as {candidate_id} in {ledger_tx}");

        let candidate = NewCandidate {
            candidate_id,
            name,
            party,
            ledger_tx: ledger_tx.clone(),
        };
        let candidate = match self.candidates.insert(candidate).await {
            Ok(candidate) => candidate,
            Err(e) => {
                error!(
                    "Candidate {candidate_id} is on the ledger ({ledger_tx}) \
                     but could not be mirrored locally: {e}"
                );
                return Err(e);
            }
        };

        self.record_audit(NewAuditEntry::new(
            AuditAction::AddCandidate,
            ADMIN_ACTOR,
            doc! {
                "candidate_id": candidate_id as i64,
                "name": candidate.name.as_str(),
                "ledger_tx": ledger_tx.as_str(),
            },
        ))
        .await;

        Ok(candidate.into())
    }

    pub async fn list_candidates(&self) -> Result<Vec<CandidateView>> {
        Ok(self
            .candidates
            .list()
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub async fn add_party(&self, request: PartyRequest) -> Result<PartyView> {
        request.validate()?;
        let party = self.parties.insert(NewParty::from(request)).await?;
        info!("Party {:?} added", party.name);

        self.record_audit(NewAuditEntry::new(
            AuditAction::AddParty,
            ADMIN_ACTOR,
            doc! { "name": party.name.as_str(), "leader": party.leader.as_str() },
        ))
        .await;

        Ok(party.into())
    }

    pub async fn list_parties(&self) -> Result<Vec<PartyView>> {
        Ok(self
            .parties
            .list()
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Count locally recorded ballots. Without `by_site`, every candidate
    /// appears, including those with no votes.
    pub async fn results(&self, by_site: bool) -> Result<Results> {
        let tally = self.ballots.tally(by_site).await?;
        let rows: Vec<CandidateResult> = if by_site {
            tally.into_iter().map(Into::into).collect()
        } else {
            self.candidates
                .list()
                .await?
                .into_iter()
                .map(|candidate| CandidateResult {
                    candidate_id: candidate.candidate_id,
                    candidate_name: candidate.name.clone(),
                    casting_site: None,
                    votes: tally
                        .iter()
                        .find(|row| row.candidate_id == candidate.candidate_id)
                        .map_or(0, |row| row.votes),
                })
                .collect()
        };
        let total_votes = rows.iter().map(|row| row.votes).sum();
        Ok(Results {
            by_site,
            total_votes,
            rows,
        })
    }
}
