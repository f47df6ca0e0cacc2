use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Student Router Module
///
/// Routes nested under the `/student` prefix, classified student-only by the
/// access gate. All handlers answer for the caller resolved by the gate; there is
/// no way to address another student's data from this portal.
pub fn student_routes() -> Router<AppState> {
    Router::new()
        // GET /student/dashboard
        // Landing page: upcoming lessons and recent payments in one payload.
        .route("/dashboard", get(handlers::student_dashboard))
        // GET /student/schedule
        .route("/schedule", get(handlers::student_schedule))
        // GET /student/payments
        .route("/payments", get(handlers::student_payments))
}
