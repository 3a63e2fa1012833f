use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::api::{
        auth::{SessionToken, Terminal},
        VoteReceipt, VoteRequest, VoterStatus,
    },
    workflow::Context,
};

pub fn routes() -> Vec<Route> {
    routes![vote, me]
}

#[post("/vote", data = "<request>", format = "json")]
pub async fn vote(
    token: std::result::Result<SessionToken, Error>,
    terminal: std::result::Result<Terminal, Error>,
    request: Json<VoteRequest>,
    context: &State<Context>,
) -> Result<Json<VoteReceipt>> {
    let receipt = context
        .cast_vote(&token?, &terminal?, request.into_inner())
        .await?;
    Ok(Json(receipt))
}

#[get("/voter/me")]
pub async fn me(
    token: std::result::Result<SessionToken, Error>,
    context: &State<Context>,
) -> Result<Json<VoterStatus>> {
    let status = context.voter_status(&token?).await?;
    Ok(Json(status))
}
