use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Instructor Router Module
///
/// Routes nested under the `/instructor` prefix, classified instructor-only by
/// the access gate.
pub fn instructor_routes() -> Router<AppState> {
    Router::new()
        // GET /instructor/dashboard
        // Landing page: teaching slots plus aggregated student feedback.
        .route("/dashboard", get(handlers::instructor_dashboard))
        // GET /instructor/schedule
        .route("/schedule", get(handlers::instructor_schedule))
        // GET /instructor/ratings
        .route("/ratings", get(handlers::instructor_ratings))
}
