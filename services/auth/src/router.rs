use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use gatekeep_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    health::{healthz, readyz},
    login::login,
    mfa::{resend_code, verify_mfa},
    password_reset::{complete_password_reset, request_password_reset},
    rate_limit::api_rate_limit,
    sessions::{list_sessions, logout, revoke_all_sessions, revoke_session},
    unlock::unlock,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let auth = Router::new()
        // Login + MFA
        .route("/auth/login", post(login))
        .route("/auth/mfa/verify", post(verify_mfa))
        .route("/auth/mfa/resend", post(resend_code))
        // Lockout
        .route("/auth/unlock", post(unlock))
        // Password reset
        .route(
            "/auth/password-reset",
            post(request_password_reset).patch(complete_password_reset),
        )
        // Sessions
        .route(
            "/auth/sessions",
            get(list_sessions).delete(revoke_all_sessions),
        )
        .route("/auth/sessions/{session_id}", delete(revoke_session))
        .route("/auth/session", delete(logout))
        .layer(from_fn_with_state(state.clone(), api_rate_limit));

    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(auth)
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer()),
        )
        .with_state(state)
}
