use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::api::{auth::AdminKey, CandidateRequest, CandidateView, PartyRequest, PartyView},
    workflow::{Context, ReconciliationReport},
};

pub fn routes() -> Vec<Route> {
    routes![
        add_candidate,
        list_candidates,
        add_party,
        list_parties,
        reconcile,
    ]
}

type AdminGuard = std::result::Result<AdminKey, Error>;

#[post("/admin/candidates", data = "<request>", format = "json")]
pub async fn add_candidate(
    admin: AdminGuard,
    request: Json<CandidateRequest>,
    context: &State<Context>,
) -> Result<Json<CandidateView>> {
    admin?;
    Ok(Json(context.add_candidate(request.into_inner()).await?))
}

#[get("/admin/candidates")]
pub async fn list_candidates(
    admin: AdminGuard,
    context: &State<Context>,
) -> Result<Json<Vec<CandidateView>>> {
    admin?;
    Ok(Json(context.list_candidates().await?))
}

#[post("/admin/parties", data = "<request>", format = "json")]
pub async fn add_party(
    admin: AdminGuard,
    request: Json<PartyRequest>,
    context: &State<Context>,
) -> Result<Json<PartyView>> {
    admin?;
    Ok(Json(context.add_party(request.into_inner()).await?))
}

#[get("/admin/parties")]
pub async fn list_parties(
    admin: AdminGuard,
    context: &State<Context>,
) -> Result<Json<Vec<PartyView>>> {
    admin?;
    Ok(Json(context.list_parties().await?))
}

#[post("/admin/reconcile")]
pub async fn reconcile(
    admin: AdminGuard,
    context: &State<Context>,
) -> Result<Json<ReconciliationReport>> {
    admin?;
    Ok(Json(context.reconcile().await?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
        serde::json::{json, serde_json},
    };

    use crate::model::{api::auth::API_KEY_HEADER, db::Candidate, mongodb::Coll};

    use super::*;

    #[backend_test]
    async fn api_key_required(client: Client, candidates: Coll<Candidate>) {
        for key in [None, Some("wrong key")] {
            let mut request = client
                .post(uri!("/api", add_candidate))
                .header(ContentType::JSON)
                .body(json!(CandidateRequest::example("Nila")).to_string());
            if let Some(key) = key {
                request = request.header(Header::new(API_KEY_HEADER, key));
            }
            let response = request.dispatch().await;
            assert_eq!(Status::Unauthorized, response.status());
        }
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn candidates_and_parties(client: Client) {
        let admin = Header::new(API_KEY_HEADER, "coordinator");

        let response = client
            .post(uri!("/api", add_party))
            .header(ContentType::JSON)
            .header(admin.clone())
            .body(json!(PartyRequest::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .post(uri!("/api", add_candidate))
            .header(ContentType::JSON)
            .header(admin.clone())
            .body(
                json!({ "name": "Nila", "party": PartyRequest::example().name }).to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let candidate: CandidateView =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(candidate.candidate_id, 0);

        let response = client
            .get(uri!("/api", list_parties))
            .header(admin.clone())
            .dispatch()
            .await;
        let parties: Vec<PartyView> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(parties.len(), 1);

        let response = client
            .post(uri!("/api", reconcile))
            .header(admin)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let report: serde_json::Value =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(report["ledgerCandidates"], 1);
        assert_eq!(report["localCandidates"], 1);
    }
}
