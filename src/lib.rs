use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod events;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;

// Module for routing segregation (one module per role portal, plus public).
pub mod routes;
use routes::{accountant, admin, instructor, public, student};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::AppConfig;
pub use events::SessionEvents;
pub use gate::AccessGate;
pub use repository::{PostgresRepository, RepositoryState};
pub use session::{JwtSessionResolver, SessionState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the application.
/// It aggregates all API paths and data schemas decorated with the
/// `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::register_page, handlers::suspended_page,
        handlers::login, handlers::register, handlers::logout, handlers::get_me,
        handlers::admin_dashboard, handlers::list_students, handlers::list_instructors,
        handlers::set_user_active, handlers::student_dashboard, handlers::student_schedule,
        handlers::student_payments, handlers::instructor_dashboard,
        handlers::instructor_schedule, handlers::instructor_ratings,
        handlers::accountant_dashboard, handlers::accountant_payments
    ),
    components(
        schemas(
            models::Role, models::User, models::UserProfile, models::Schedule,
            models::Payment, models::Rating, models::RegisterRequest, models::LoginRequest,
            models::SetActiveRequest, models::AdminDashboardStats, models::PaymentSummary,
            models::InstructorRatingSummary, models::StudentDashboard,
            models::InstructorDashboard,
        )
    ),
    tags(
        (name = "drive-portal", description = "Driving School Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**. This is the single, thread-safe, and
/// immutable container holding all essential application services and configuration.
/// The application state is shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: role store plus domain queries, behind the trait object.
    pub repo: RepositoryState,
    /// Session Layer: resolves and refreshes transport credentials.
    pub sessions: SessionState,
    /// The access gate's decision engine (route table plus lookup budgets).
    pub gate: Arc<AccessGate>,
    /// Session lifecycle broadcast hub.
    pub events: SessionEvents,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow handlers to selectively pull components from the
// shared AppState, which is the dependency-injection seam for tests.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for SessionEvents {
    fn from_ref(app_state: &AppState) -> SessionEvents {
        app_state.events.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies the access gate
/// and the global observability middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    // Every role portal is nested under its classified prefix; the prefixes here
    // must stay in lockstep with the gate's RouteTable.
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/admin", admin::admin_routes())
        .nest("/student", student::student_routes())
        .nest("/instructor", instructor::instructor_routes())
        .nest("/accountant", accountant::accountant_routes())
        // The Access Gate: one evaluation per inbound request, before any handler.
        // Unlisted prefixes pass through untouched, so this layer wraps the whole
        // router rather than individual portals.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::access_gate,
        ))
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: Generates a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: Wraps the entire request/response lifecycle in a
                // tracing span, correlated by the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: Ensures the generated x-request-id header is
                // returned to the client and injected into subsequent service calls.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Helper function used by `TraceLayer` to customize the tracing span creation.
/// It extracts the `x-request-id` header (if present) and includes it in the
/// structured logging metadata alongside the HTTP method and URI, so every log
/// line for a single request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
