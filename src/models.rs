use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The closed set of authorization tags a portal account can carry. The access gate
/// compares this tag against the role required by the requested path prefix, so the
/// set is deliberately a Rust enum rather than a free-form string: an unrecognized
/// tag in the database cannot be represented here and is treated as "no role" by the
/// lookup layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Student,
    Instructor,
    Accountant,
}

impl Role {
    /// Parses the database/wire representation. Returns None for anything outside
    /// the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "student" => Some(Role::Student),
            "instructor" => Some(Role::Instructor),
            "accountant" => Some(Role::Accountant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Accountant => "accountant",
        }
    }

    /// The landing page for an account of this role. Used by the gate when a caller
    /// requests a path scoped to a different role.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Student => "/student/dashboard",
            Role::Instructor => "/instructor/dashboard",
            Role::Accountant => "/accountant/dashboard",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RoleRecord
///
/// The role-store lookup result consumed by the access gate: the account's role tag
/// plus its active flag. Suspended accounts keep their role but are denied access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleRecord {
    pub role: Role,
    pub active: bool,
}

/// User
///
/// The canonical account record stored in the `public.users` table. The `id` mirrors
/// the external auth provider's user id so that a resolved session maps directly to
/// this row.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Suspension flag. The gate redirects inactive accounts away from every
    /// protected page.
    pub active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Schedule
///
/// A driving lesson slot from the `public.schedules` table. Either side of the
/// booking may still be unassigned, hence the optional ids.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Schedule {
    pub id: i64,
    #[ts(type = "string")]
    pub date: NaiveDate,
    pub time_slot: String,
    pub instructor_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub vehicle_id: Option<String>,
    // "scheduled" | "completed" | "cancelled"
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Payment
///
/// A tuition payment record from the `public.payments` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Payment {
    pub id: i64,
    pub student_id: Uuid,
    pub amount: f64,
    // "pending" | "paid" | "overdue" | "refunded"
    pub status: String,
    pub method: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Rating
///
/// Student feedback for an instructor, from the `public.ratings` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Rating {
    pub id: i64,
    pub student_id: Uuid,
    pub instructor_id: Uuid,
    pub schedule_id: Option<i64>,
    pub rating: i32,
    pub comment: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// Note: The password is only passed through to the external auth provider and never
/// persisted or logged internally by this application.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

/// LoginRequest
///
/// Input payload for the password sign-in endpoint (POST /login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// SetActiveRequest
///
/// Admin payload toggling an account's suspension flag (PUT /admin/users/{id}/active).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// --- Dashboard & Profile Schemas (Output) ---

/// UserProfile
///
/// Output schema for the authenticated caller's own profile (GET /me) and the
/// login response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Role,
}

/// AdminDashboardStats
///
/// Output schema for the administrative dashboard (GET /admin/dashboard).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_students: i64,
    pub total_instructors: i64,
    /// Accounts with `active = true`, any role.
    pub active_users: i64,
    pub pending_payments: i64,
}

/// PaymentSummary
///
/// Aggregated payment totals for the accountant dashboard (GET /accountant/dashboard).
/// The aggregation runs in a single SQL pass rather than being recomputed per client.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PaymentSummary {
    pub total_collected: f64,
    pub total_pending: f64,
    pub total_overdue: f64,
}

/// InstructorRatingSummary
///
/// Aggregate feedback view for the instructor dashboard (GET /instructor/dashboard).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct InstructorRatingSummary {
    pub average_rating: f64,
    pub total_ratings: i64,
}

/// StudentDashboard
///
/// Combined landing-page payload for a student: their booked lessons and recent
/// payments in one response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StudentDashboard {
    pub upcoming_lessons: Vec<Schedule>,
    pub recent_payments: Vec<Payment>,
}

/// InstructorDashboard
///
/// Combined landing-page payload for an instructor: their teaching slots and the
/// aggregate of student feedback.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct InstructorDashboard {
    pub upcoming_lessons: Vec<Schedule>,
    pub ratings: InstructorRatingSummary,
}
