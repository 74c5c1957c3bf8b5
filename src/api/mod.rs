use crate::api::handlers::{health, login, lock, polarity};
use anyhow::Result;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderName, HeaderValue, Request},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tokio::{net::TcpListener, task::JoinHandle, time::MissedTickBehavior};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, debug_span, error, info, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use self::handlers::SharedShield;
pub use self::openapi::openapi;

/// All daemon routes with request ids and tracing applied.
#[must_use]
pub fn router(shield: SharedShield) -> Router {
    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/v1/status", get(polarity::status))
        .route("/v1/section", get(polarity::section))
        .route("/v1/diagnostics", get(polarity::diagnostics))
        .route("/v1/check", post(polarity::check))
        .route("/v1/login-errors", post(login::login_errors))
        .route("/v1/login-url", get(login::login_url))
        .route("/openapi.json", get(openapi_json))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(shield)),
        )
}

async fn openapi_json() -> impl IntoResponse {
    Json(openapi())
}

/// Deliver due tasks and reconcile the rules every `tick`.
pub fn spawn_ticker(shield: SharedShield, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            tick_once(&shield);
        }
    })
}

fn tick_once(shield: &SharedShield) {
    let shield = lock(shield);

    match shield.run_due() {
        Ok(delivered) if !delivered.is_empty() => debug!("delivered {delivered:?}"),
        Ok(_) => {}
        Err(err) => error!("scheduled task failed: {err}"),
    }

    if let Err(err) = shield.on_request() {
        error!("reconcile failed: {err}");
    }
}

/// Serve the daemon until interrupted.
/// # Errors
/// Returns an error if the listener can't be bound or the server fails
pub async fn new(port: u16, shield: SharedShield, tick: Duration) -> Result<()> {
    tick_once(&shield);
    let ticker = spawn_ticker(shield.clone(), tick);

    let app = router(shield);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("unable to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    ticker.abort();

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
