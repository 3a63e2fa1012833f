use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::api::{
        auth::Terminal, LoginRequest, RegistrationReceipt, RegistrationRequest, SessionGrant,
    },
    workflow::Context,
};

pub fn routes() -> Vec<Route> {
    routes![register, login]
}

#[post("/register", data = "<request>", format = "json")]
pub async fn register(
    request: Json<RegistrationRequest>,
    context: &State<Context>,
) -> Result<Json<RegistrationReceipt>> {
    let receipt = context.register(request.into_inner()).await?;
    Ok(Json(receipt))
}

#[post("/auth/login", data = "<request>", format = "json")]
pub async fn login(
    terminal: std::result::Result<Terminal, Error>,
    request: Json<LoginRequest>,
    context: &State<Context>,
) -> Result<Json<SessionGrant>> {
    let grant = context.login(request.into_inner(), &terminal?).await?;
    Ok(Json(grant))
}
