use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints reachable without a session. The access gate still runs on
/// these paths: it redirects signed-in callers off the auth pages and attaches
/// caller context when a valid session happens to be present, but it never blocks
/// an anonymous request here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /login
        // The login page payload and the password sign-in flow. The gate bounces
        // unauthenticated callers of protected pages here, carrying the original
        // path in the `redirectTo` query parameter.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // GET/POST /register
        // Account creation via the external auth provider plus the local mirror row.
        .route(
            "/register",
            get(handlers::register_page).post(handlers::register),
        )
        // POST /logout
        // Clears session cookies and publishes the SignedOut lifecycle event.
        .route("/logout", post(handlers::logout))
        // GET /account-suspended
        // Target of the gate's suspended-account redirect.
        .route("/account-suspended", get(handlers::suspended_page))
        // GET /me
        // The caller's own profile, answered from the context the gate attached.
        .route("/me", get(handlers::get_me))
}
