use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

use crate::error::AuthServiceError;
use crate::handlers::client::ClientInfo;
use crate::state::AppState;
use crate::usecase::rate_limit::RateLimitPolicy;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// General per-IP throttle for every route. Use with
/// `axum::middleware::from_fn_with_state`.
pub async fn api_rate_limit(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, AuthServiceError> {
    let policy = RateLimitPolicy::api();
    let limit = policy.max_requests;
    let decision = state.limiter(policy).enforce(&client, None).await?;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(decision.reset_time.timestamp()),
    );
    Ok(response)
}
