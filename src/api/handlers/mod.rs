pub mod health;
pub mod login;
pub mod polarity;

use crate::{error::Error, ForceField};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::error;
use utoipa::ToSchema;

/// The one instance every handler and the ticker share. Operations run one at a
/// time so read-modify-write on the rules file never interleaves.
pub type SharedShield = Arc<Mutex<ForceField>>;

pub(crate) fn lock(shield: &SharedShield) -> MutexGuard<'_, ForceField> {
    shield.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

pub(crate) fn failure(err: &Error) -> Response {
    error!("{err}");

    let status = match err {
        Error::ConfigurationInvalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}
