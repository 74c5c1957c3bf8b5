use crate::{
    api::handlers::{self, health, login, polarity},
    monitor::WindowState,
    polarity::{Mode, PolarityState},
    rewrite::{Installation, Outcome},
    shield::{Diagnostic, DiagnosticKind, Status},
};
use utoipa::{
    openapi::{License, Tag},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        polarity::status,
        polarity::section,
        polarity::diagnostics,
        polarity::check,
        login::login_errors,
        login::login_url,
    ),
    components(schemas(
        health::Health,
        handlers::ErrorBody,
        polarity::Section,
        polarity::Checked,
        login::LoginError,
        login::Recorded,
        login::LoginUrl,
        Status,
        PolarityState,
        Mode,
        WindowState,
        Installation,
        Outcome,
        Diagnostic,
        DiagnosticKind,
    ))
)]
struct ApiDoc;

/// `OpenAPI` document with Cargo metadata as its info block.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = Some(env!("CARGO_PKG_DESCRIPTION").to_string());
    doc.info.license = Some(License::new(env!("CARGO_PKG_LICENSE")));

    let mut polarity_tag = Tag::new("polarity");
    polarity_tag.description = Some("Login path state and rewrite rules".to_string());
    let mut login_tag = Tag::new("login");
    login_tag.description = Some("Failed login reporting and URL rewriting".to_string());
    doc.tags = Some(vec![Tag::new("health"), polarity_tag, login_tag]);

    doc
}
