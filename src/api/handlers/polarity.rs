use super::{failure, lock, SharedShield};
use crate::{
    rewrite::Outcome,
    shield::{Diagnostic, Status},
};
use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::instrument;
use utoipa::ToSchema;

#[utoipa::path(
    get,
    path= "/v1/status",
    responses (
        (status = 200, description = "Polarity, attack window and rules file state", body = Status),
    ),
    tag = "polarity",
)]
pub async fn status(shield: Extension<SharedShield>) -> impl IntoResponse {
    Json(lock(&shield).status())
}

#[derive(ToSchema, Serialize, Debug)]
pub struct Section {
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// Padded section, marker lines included.
    pub lines: Vec<String>,
}

#[utoipa::path(
    get,
    path= "/v1/section",
    responses (
        (status = 200, description = "Rule section for the current policy", body = Section),
    ),
    tag = "polarity",
)]
pub async fn section(shield: Extension<SharedShield>) -> impl IntoResponse {
    let shield = lock(&shield);
    let rewrite = shield.polarity().rewrite();

    Json(Section {
        path: rewrite.path().to_path_buf(),
        lines: rewrite.section(&shield.polarity().current_policy()),
    })
}

#[utoipa::path(
    get,
    path= "/v1/diagnostics",
    responses (
        (status = 200, description = "Configuration problems, empty when healthy", body = [Diagnostic]),
    ),
    tag = "polarity",
)]
pub async fn diagnostics(shield: Extension<SharedShield>) -> impl IntoResponse {
    Json(lock(&shield).diagnostics())
}

#[derive(ToSchema, Serialize, Debug)]
pub struct Checked {
    pub outcome: Outcome,
}

#[utoipa::path(
    post,
    path= "/v1/check",
    responses (
        (status = 200, description = "Rules reconciled with the current policy", body = Checked),
        (status = 500, description = "Rules file could not be written", body = super::ErrorBody),
    ),
    tag = "polarity",
)]
#[instrument(skip(shield))]
pub async fn check(shield: Extension<SharedShield>) -> impl IntoResponse {
    match lock(&shield).on_request() {
        Ok(outcome) => Json(Checked { outcome }).into_response(),
        Err(err) => failure(&err),
    }
}
