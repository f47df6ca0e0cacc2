use crate::{
    AppState,
    auth::AuthUser,
    events::AuthEvent,
    models::{
        AdminDashboardStats, InstructorDashboard, LoginRequest, Payment, PaymentSummary, Rating,
        RegisterRequest, Role, Schedule, SetActiveRequest, StudentDashboard, User, UserProfile,
    },
    session::{REFRESH_COOKIE, SESSION_COOKIE, SessionCredential},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// AuthPageQuery
///
/// Query parameters accepted by the public auth pages. `redirectTo` is the return
/// path the gate attached when it bounced an unauthenticated caller to login.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct AuthPageQuery {
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

/// Shape of the token payload the hosted auth service returns for signup and
/// password grants.
#[derive(Deserialize)]
struct AuthTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    user: AuthUserInfo,
}

#[derive(Deserialize)]
struct AuthUserInfo {
    id: Uuid,
}

/// Minimal struct to deserialize the response from the external signup endpoint,
/// specifically capturing the newly created user's UUID.
#[derive(Deserialize)]
struct SignupResponse {
    id: Uuid,
}

// --- Public Handlers ---

/// login_page
///
/// [Public Route] Placeholder payload for the login page; the SPA renders the
/// form. Echoes the return path so the client can navigate back after sign-in.
#[utoipa::path(
    get,
    path = "/login",
    params(AuthPageQuery),
    responses((status = 200, description = "Login page payload"))
)]
pub async fn login_page(Query(query): Query<AuthPageQuery>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "page": "login",
        "redirectTo": query.redirect_to,
    }))
}

/// register_page
///
/// [Public Route] Placeholder payload for the registration page.
#[utoipa::path(
    get,
    path = "/register",
    responses((status = 200, description = "Register page payload"))
)]
pub async fn register_page() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "page": "register" }))
}

/// suspended_page
///
/// [Public Route] Target of the gate's suspended-account redirect. Static notice;
/// reinstatement goes through an administrator.
#[utoipa::path(
    get,
    path = "/account-suspended",
    responses((status = 200, description = "Suspension notice"))
)]
pub async fn suspended_page() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "page": "account-suspended",
        "message": "This account has been suspended. Contact the school office.",
    }))
}

/// login
///
/// [Public Route] Password sign-in against the hosted auth service.
///
/// *Flow*: Exchanges the credentials at the password-grant endpoint, verifies a
/// mirrored account row exists locally, sets the session cookies, and publishes
/// the SignedIn lifecycle event. The password passes through to the provider and
/// is never persisted or logged here.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = UserProfile),
        (status = 401, description = "Rejected credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let client = reqwest::Client::new();
    let token_url = format!(
        "{}/auth/v1/token?grant_type=password",
        state.config.auth_url
    );

    let response = client
        .post(token_url)
        .header("apikey", &state.config.auth_api_key)
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("auth service unreachable during login: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !response.status().is_success() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let tokens = response
        .json::<AuthTokenResponse>()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // A token without a mirrored account row cannot be authorized by the gate;
    // reject at the door rather than letting the caller bounce between redirects.
    let user = state
        .repo
        .get_user(tokens.user.id)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    state.events.publish(AuthEvent::SignedIn { user_id: user.id });

    let mut cookies = vec![(
        SET_COOKIE,
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, tokens.access_token
        ),
    )];
    if let Some(refresh) = &tokens.refresh_token {
        cookies.push((
            SET_COOKIE,
            format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                REFRESH_COOKIE, refresh
            ),
        ));
    }

    Ok((
        AppendHeaders(cookies),
        Json(UserProfile {
            id: user.id,
            email: Some(user.email),
            role: user.role,
        }),
    ))
}

/// register
///
/// [Public Route] Handles initial account creation via the external auth service.
///
/// *Flow*: Calls the signup endpoint, retrieves the provider-assigned UUID, and
/// then uses that ID to create the corresponding record in the application's local
/// `public.users` table. This keeps the primary key synchronized between the
/// external auth system and our local schema.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = User),
        (status = 400, description = "Rejected by the auth provider")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, StatusCode> {
    let client = reqwest::Client::new();
    let signup_url = format!("{}/auth/v1/signup", state.config.auth_url);

    let response = client
        .post(signup_url)
        .header("apikey", &state.config.auth_api_key)
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("auth service unreachable during signup: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !response.status().is_success() {
        // The provider rejected the account (e.g., email already exists, weak password).
        return Err(StatusCode::BAD_REQUEST);
    }

    let created = response
        .json::<SignupResponse>()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user = state
        .repo
        .create_user(User {
            id: created.id,
            email: payload.email,
            name: payload.name,
            role: payload.role,
            active: true,
            created_at: chrono::Utc::now(),
        })
        .await
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(user))
}

/// logout
///
/// [Public Route] Clears the session cookies and publishes the SignedOut event.
/// Safe to call without a session; the response is identical either way.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 204, description = "Signed out"))
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(credential) = SessionCredential::from_headers(&headers) {
        if let Some(identity) = state.sessions.resolve(&credential).await {
            state
                .events
                .publish(AuthEvent::SignedOut {
                    user_id: identity.id,
                });
        }
    }

    let expire = |name: &str| {
        (
            SET_COOKIE,
            format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name),
        )
    };

    (
        StatusCode::NO_CONTENT,
        AppendHeaders([expire(SESSION_COOKIE), expire(REFRESH_COOKIE)]),
    )
}

/// get_me
///
/// [Public Route, context-dependent] Provides the caller's own profile. The gate
/// attaches context on any path whenever a valid session resolves, so this works
/// without a role prefix; anonymous callers get 401 from the extractor.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "No session")
    )
)]
pub async fn get_me(AuthUser { id, role, email }: AuthUser) -> Json<UserProfile> {
    Json(UserProfile { id, email, role })
}

// --- Admin Handlers ---

/// admin_dashboard
///
/// [Admin Route] Retrieves core portal statistics for the admin dashboard.
///
/// *Authorization*: The gate only forwards admin-role sessions here; the explicit
/// role check is kept as the second layer of Defense-in-Depth.
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    responses((status = 200, description = "Stats", body = AdminDashboardStats))
)]
pub async fn admin_dashboard(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.get_stats().await))
}

/// list_students
///
/// [Admin Route] Lists every student account for the admin students screen.
#[utoipa::path(
    get,
    path = "/admin/students",
    responses((status = 200, description = "Students", body = [User]))
)]
pub async fn list_students(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.list_users_by_role(Role::Student).await))
}

/// list_instructors
///
/// [Admin Route] Lists every instructor account for the admin instructors screen.
#[utoipa::path(
    get,
    path = "/admin/instructors",
    responses((status = 200, description = "Instructors", body = [User]))
)]
pub async fn list_instructors(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.list_users_by_role(Role::Instructor).await))
}

/// set_user_active
///
/// [Admin Route] Toggles an account's suspension flag. The gate enforces the flag
/// on the suspended account's next request; no session invalidation happens here.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/active",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn set_user_active(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> StatusCode {
    if role != Role::Admin {
        return StatusCode::FORBIDDEN;
    }
    if state.repo.set_user_active(id, payload.active).await {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Student Handlers ---

/// student_dashboard
///
/// [Student Route] The student landing page: booked lessons plus recent payments.
#[utoipa::path(
    get,
    path = "/student/dashboard",
    responses((status = 200, description = "Dashboard", body = StudentDashboard))
)]
pub async fn student_dashboard(
    AuthUser { id, role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<StudentDashboard>, StatusCode> {
    if role != Role::Student {
        return Err(StatusCode::FORBIDDEN);
    }
    let upcoming_lessons = state.repo.schedules_for_student(id).await;
    let recent_payments = state.repo.payments_for_student(id).await;
    Ok(Json(StudentDashboard {
        upcoming_lessons,
        recent_payments,
    }))
}

/// student_schedule
///
/// [Student Route] The student's full lesson schedule.
#[utoipa::path(
    get,
    path = "/student/schedule",
    responses((status = 200, description = "Schedule", body = [Schedule]))
)]
pub async fn student_schedule(
    AuthUser { id, role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Schedule>>, StatusCode> {
    if role != Role::Student {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.schedules_for_student(id).await))
}

/// student_payments
///
/// [Student Route] The student's payment history.
#[utoipa::path(
    get,
    path = "/student/payments",
    responses((status = 200, description = "Payments", body = [Payment]))
)]
pub async fn student_payments(
    AuthUser { id, role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Payment>>, StatusCode> {
    if role != Role::Student {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.payments_for_student(id).await))
}

// --- Instructor Handlers ---

/// instructor_dashboard
///
/// [Instructor Route] The instructor landing page: teaching slots plus the
/// aggregate of student feedback.
#[utoipa::path(
    get,
    path = "/instructor/dashboard",
    responses((status = 200, description = "Dashboard", body = InstructorDashboard))
)]
pub async fn instructor_dashboard(
    AuthUser { id, role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<InstructorDashboard>, StatusCode> {
    if role != Role::Instructor {
        return Err(StatusCode::FORBIDDEN);
    }
    let upcoming_lessons = state.repo.schedules_for_instructor(id).await;
    let ratings = state.repo.rating_summary(id).await;
    Ok(Json(InstructorDashboard {
        upcoming_lessons,
        ratings,
    }))
}

/// instructor_schedule
///
/// [Instructor Route] The instructor's teaching schedule.
#[utoipa::path(
    get,
    path = "/instructor/schedule",
    responses((status = 200, description = "Schedule", body = [Schedule]))
)]
pub async fn instructor_schedule(
    AuthUser { id, role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Schedule>>, StatusCode> {
    if role != Role::Instructor {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.schedules_for_instructor(id).await))
}

/// instructor_ratings
///
/// [Instructor Route] Individual feedback entries left by students.
#[utoipa::path(
    get,
    path = "/instructor/ratings",
    responses((status = 200, description = "Ratings", body = [Rating]))
)]
pub async fn instructor_ratings(
    AuthUser { id, role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Rating>>, StatusCode> {
    if role != Role::Instructor {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.ratings_for_instructor(id).await))
}

// --- Accountant Handlers ---

/// accountant_dashboard
///
/// [Accountant Route] Aggregated payment totals, computed in the repository
/// rather than summed client-side.
#[utoipa::path(
    get,
    path = "/accountant/dashboard",
    responses((status = 200, description = "Summary", body = PaymentSummary))
)]
pub async fn accountant_dashboard(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PaymentSummary>, StatusCode> {
    if role != Role::Accountant {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.payment_summary().await))
}

/// accountant_payments
///
/// [Accountant Route] Every payment record, newest first.
#[utoipa::path(
    get,
    path = "/accountant/payments",
    responses((status = 200, description = "Payments", body = [Payment]))
)]
pub async fn accountant_payments(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Payment>>, StatusCode> {
    if role != Role::Accountant {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.list_payments().await))
}
