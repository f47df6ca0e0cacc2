use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Accountant Router Module
///
/// Routes nested under the `/accountant` prefix, classified accountant-only by
/// the access gate.
pub fn accountant_routes() -> Router<AppState> {
    Router::new()
        // GET /accountant/dashboard
        // Payment totals aggregated in a single repository pass.
        .route("/dashboard", get(handlers::accountant_dashboard))
        // GET /accountant/payments
        // The full payment ledger, newest first.
        .route("/payments", get(handlers::accountant_payments))
}
