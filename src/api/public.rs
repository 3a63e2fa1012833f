use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::api::{CandidateView, Results},
    workflow::Context,
};

pub fn routes() -> Vec<Route> {
    routes![candidates, results]
}

/// The ballot, for terminals to render.
#[get("/candidates")]
pub async fn candidates(context: &State<Context>) -> Result<Json<Vec<CandidateView>>> {
    Ok(Json(context.list_candidates().await?))
}

#[get("/results?<by_site>")]
pub async fn results(by_site: Option<bool>, context: &State<Context>) -> Result<Json<Results>> {
    Ok(Json(context.results(by_site.unwrap_or(false)).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
        serde::json::{json, serde_json},
    };

    use crate::model::api::{auth::API_KEY_HEADER, CandidateRequest};

    use super::*;

    #[backend_test]
    async fn empty_results(client: Client) {
        for name in ["Nila", "Arjun"] {
            client
                .post("/api/admin/candidates")
                .header(ContentType::JSON)
                .header(Header::new(API_KEY_HEADER, "coordinator"))
                .body(json!(CandidateRequest::example(name)).to_string())
                .dispatch()
                .await;
        }

        let response = client.get(uri!("/api", candidates)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let candidates: Vec<CandidateView> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].name, "Arjun");

        let response = client.get("/api/results?by_site=false").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let results: Results =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(results.total_votes, 0);
        assert_eq!(results.rows.len(), 2);

        let response = client.get("/api/results?by_site=true").dispatch().await;
        let results: Results =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(results.rows.is_empty());
    }
}
