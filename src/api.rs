use rocket::{
    http::Status,
    serde::json::Json,
    Catcher, Request, Route,
};

use crate::error::ErrorBody;

mod admin;
mod auth;
mod public;
mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(auth::routes());
    routes.extend(voter::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Render failures that never reached a handler (malformed bodies, unknown
/// routes, failed guards) in the same shape as handler errors.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let error = match status.code {
        400 | 422 => "BadRequest",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "NotFound",
        _ => "Internal",
    };
    let body = ErrorBody {
        error,
        message: status.reason_lossy().to_string(),
    };
    (status, Json(body))
}
