use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Defines the routes nested under the `/admin` prefix, which the access gate
/// classifies as admin-only. A request reaching any handler here has already been
/// authenticated, refreshed, and role-matched; handlers still re-check the role
/// from the forwarded context as a second layer.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/dashboard
        // Core portal statistics (student/instructor counts, active accounts,
        // pending payments).
        .route("/dashboard", get(handlers::admin_dashboard))
        // GET /admin/students
        // Every student account, for the roster and suspension screens.
        .route("/students", get(handlers::list_students))
        // GET /admin/instructors
        // Every instructor account.
        .route("/instructors", get(handlers::list_instructors))
        // PUT /admin/users/{id}/active
        // The suspension toggle. The gate enforces the new flag on the account's
        // next request.
        .route("/users/{id}/active", put(handlers::set_user_active))
}
