use super::{lock, SharedShield};
use crate::monitor::WindowState;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginError {
    /// Error code reported by the login handler, e.g. `incorrect_password`.
    pub code: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct Recorded {
    pub counted: bool,
    pub hits: u64,
    pub window: WindowState,
}

#[utoipa::path(
    post,
    path= "/v1/login-errors",
    request_body = LoginError,
    responses (
        (status = 202, description = "Failed login recorded", body = Recorded),
        (status = 400, description = "Missing payload"),
    ),
    tag = "login",
)]
#[instrument(skip(shield))]
pub async fn login_errors(
    shield: Extension<SharedShield>,
    payload: Option<Json<LoginError>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let shield = lock(&shield);
    let counted = shield.on_login_error(&payload.code);

    (
        StatusCode::ACCEPTED,
        Json(Recorded {
            counted,
            hits: shield.monitor().hits(),
            window: shield.monitor().state(),
        }),
    )
        .into_response()
}

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct LoginUrlQuery {
    /// URL that may reference the real login handler.
    pub url: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginUrl {
    pub url: String,
}

#[utoipa::path(
    get,
    path= "/v1/login-url",
    params(LoginUrlQuery),
    responses (
        (status = 200, description = "URL pointing at the active secret path", body = LoginUrl),
    ),
    tag = "login",
)]
pub async fn login_url(
    shield: Extension<SharedShield>,
    query: Option<Query<LoginUrlQuery>>,
) -> impl IntoResponse {
    let Some(Query(query)) = query else {
        return (StatusCode::BAD_REQUEST, "Missing url".to_string()).into_response();
    };

    let url = lock(&shield).login_url(&query.url);

    Json(LoginUrl { url }).into_response()
}
