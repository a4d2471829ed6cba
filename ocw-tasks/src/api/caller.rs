//! Bearer-token caller extractor
//!
//! Resolves the `Authorization: Bearer <token>` header through the
//! configured authorization gate. Handlers that take [`AuthenticatedCaller`]
//! reject unauthenticated requests with 401 before running.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::TaskError;
use crate::services::Caller;
use crate::AppState;

pub struct AuthenticatedCaller(pub Caller);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedCaller {
    type Rejection = TaskError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = state.tasks.gate().identify(bearer_token(parts))?;
        Ok(AuthenticatedCaller(caller))
    }
}
