use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use uuid::Uuid;

use crate::{gate::GateContext, models::Role};

/// AuthUser
///
/// The resolved identity of an authenticated request, as seen by handlers.
/// Authorization happened earlier, at the access gate; this struct is the
/// single-sourced result of that resolution. Handlers never re-parse tokens or
/// re-query the role store.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a function
/// argument in any handler behind the gate. It reads the `GateContext` the gate
/// attached to the request; it performs no token parsing and no database access.
///
/// Rejection: Returns StatusCode::UNAUTHORIZED (401) when no context is present —
/// which only happens for handlers reachable without the gate having resolved a
/// session (e.g. `/me` called anonymously), or for routes mistakenly mounted
/// outside the gate.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<GateContext>()
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            id: ctx.user_id,
            role: ctx.role,
            email: ctx.email.clone(),
        })
    }
}
