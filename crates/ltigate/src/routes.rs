//! HTTP endpoints for the tool side of the launch.
//!
//! Every refusal is answered with the same `401` body; the cause and its
//! kind go to the log only.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use tracing::{error, warn};

use crate::launch::{CallbackRequest, LaunchService, LoginRequest};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub launches: Arc<LaunchService>,
}

const REFUSED: &str = "LTI launch refused";

fn refused() -> Response {
    (StatusCode::UNAUTHORIZED, REFUSED).into_response()
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        .route("/lti/login", get(login_query).post(login_form))
        .route("/lti/callback", post(callback))
        .with_state(state)
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /lti/login`: login initiation with query parameters.
pub async fn login_query(
    State(state): State<AppState>,
    Query(request): Query<LoginRequest>,
) -> Response {
    login(&state, &request).await
}

/// `POST /lti/login`: login initiation with a form body.
pub async fn login_form(
    State(state): State<AppState>,
    Form(request): Form<LoginRequest>,
) -> Response {
    login(&state, &request).await
}

async fn login(state: &AppState, request: &LoginRequest) -> Response {
    let response = match state.launches.login(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(kind = %e.kind(), error = %e, "Login initiation refused");
            return refused();
        }
    };
    match response.redirect_url() {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            error!(error = %e, launch_id = %response.launch_id, "Cannot build platform redirect");
            refused()
        }
    }
}

/// `POST /lti/callback`: the platform's `form_post` authentication response.
pub async fn callback(
    State(state): State<AppState>,
    Form(request): Form<CallbackRequest>,
) -> Response {
    match state.launches.callback(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            warn!(kind = %e.kind(), error = %e, "Launch callback refused");
            refused()
        }
    }
}
