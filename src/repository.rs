use crate::models::{
    AdminDashboardStats, InstructorRatingSummary, Payment, PaymentSummary, Rating, Role,
    RoleRecord, Schedule, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core
/// of the Repository Abstraction pattern, allowing handlers and the access gate to
/// interact with the data layer without knowing the specific implementation
/// (Postgres, Mock, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable and usable across Axum's asynchronous
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Role Store ---
    // The access gate's single lookup: role tag plus suspension flag for an
    // identity. Must return None for unknown identities AND for rows whose role
    // tag is outside the closed set, so ambiguity resolves to denial upstream.
    async fn get_role(&self, user_id: Uuid) -> Option<RoleRecord>;

    // --- Accounts ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    // Mirrors the externally-created auth account into `public.users`.
    async fn create_user(&self, user: User) -> Option<User>;
    // Admin listing pages (students, instructors).
    async fn list_users_by_role(&self, role: Role) -> Vec<User>;
    // Admin suspension toggle. Returns false when the account does not exist.
    async fn set_user_active(&self, id: Uuid, active: bool) -> bool;

    // --- Dashboards ---
    async fn get_stats(&self) -> AdminDashboardStats;
    async fn payment_summary(&self) -> PaymentSummary;
    async fn rating_summary(&self, instructor_id: Uuid) -> InstructorRatingSummary;

    // --- Schedules ---
    async fn schedules_for_student(&self, student_id: Uuid) -> Vec<Schedule>;
    async fn schedules_for_instructor(&self, instructor_id: Uuid) -> Vec<Schedule>;

    // --- Payments & Ratings ---
    async fn payments_for_student(&self, student_id: Uuid) -> Vec<Payment>;
    // Accountant view: every payment record, newest first.
    async fn list_payments(&self) -> Vec<Payment>;
    async fn ratings_for_instructor(&self, instructor_id: Uuid) -> Vec<Rating>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Raw `public.users` row. The role column is TEXT and is parsed through
/// `Role::parse` at this boundary; rows carrying a tag outside the closed set are
/// dropped rather than surfaced.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    role: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Option<User> {
        let role = Role::parse(&self.role)?;
        Some(User {
            id: self.id,
            email: self.email,
            name: self.name,
            role,
            active: self.active,
            created_at: self.created_at,
        })
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL
/// database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_role
    ///
    /// The gate-facing lookup. Selects only the two columns the decision needs.
    /// Database errors degrade to None: the gate treats that as a failed lookup
    /// and denies, which is the required fail-closed behavior.
    async fn get_role(&self, user_id: Uuid) -> Option<RoleRecord> {
        let row: Option<(String, bool)> =
            sqlx::query_as("SELECT role, active FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("get_role error: {:?}", e);
                    None
                });

        let (role_str, active) = row?;
        let role = Role::parse(&role_str)?;
        Some(RoleRecord { role, active })
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, name, role, active, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user error: {:?}", e);
            None
        });

        row.and_then(UserRow::into_user)
    }

    /// create_user
    ///
    /// Creates the mirroring account record in `public.users` after external auth
    /// success. New accounts start active.
    async fn create_user(&self, user: User) -> Option<User> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, name, role, active, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, email, name, role, active, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.active)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_user error: {:?}", e);
            None
        });

        row.and_then(UserRow::into_user)
    }

    async fn list_users_by_role(&self, role: Role) -> Vec<User> {
        let rows: Vec<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, name, role, active, created_at
            FROM users
            WHERE role = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_users_by_role error: {:?}", e);
            vec![]
        });

        rows.into_iter().filter_map(UserRow::into_user).collect()
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> bool {
        match sqlx::query("UPDATE users SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("set_user_active error: {:?}", e);
                false
            }
        }
    }

    /// get_stats
    ///
    /// Compiles all counters for the administrative dashboard in one round trip.
    async fn get_stats(&self) -> AdminDashboardStats {
        let row: Result<(i64, i64, i64, i64), _> = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE role = 'student'),
                (SELECT COUNT(*) FROM users WHERE role = 'instructor'),
                (SELECT COUNT(*) FROM users WHERE active = true),
                (SELECT COUNT(*) FROM payments WHERE status = 'pending')
            "#,
        )
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok((total_students, total_instructors, active_users, pending_payments)) => {
                AdminDashboardStats {
                    total_students,
                    total_instructors,
                    active_users,
                    pending_payments,
                }
            }
            Err(e) => {
                tracing::error!("get_stats error: {:?}", e);
                AdminDashboardStats::default()
            }
        }
    }

    /// payment_summary
    ///
    /// The accountant dashboard aggregation, computed in a single SQL pass instead
    /// of being summed caller-side per request.
    async fn payment_summary(&self) -> PaymentSummary {
        let row: Result<(f64, f64, f64), _> = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0)::FLOAT8,
                COALESCE(SUM(amount) FILTER (WHERE status = 'pending'), 0)::FLOAT8,
                COALESCE(SUM(amount) FILTER (WHERE status = 'overdue'), 0)::FLOAT8
            FROM payments
            "#,
        )
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok((total_collected, total_pending, total_overdue)) => PaymentSummary {
                total_collected,
                total_pending,
                total_overdue,
            },
            Err(e) => {
                tracing::error!("payment_summary error: {:?}", e);
                PaymentSummary::default()
            }
        }
    }

    async fn rating_summary(&self, instructor_id: Uuid) -> InstructorRatingSummary {
        let row: Result<(f64, i64), _> = sqlx::query_as(
            r#"
            SELECT COALESCE(AVG(rating), 0)::FLOAT8, COUNT(*)
            FROM ratings
            WHERE instructor_id = $1
            "#,
        )
        .bind(instructor_id)
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok((average_rating, total_ratings)) => InstructorRatingSummary {
                average_rating,
                total_ratings,
            },
            Err(e) => {
                tracing::error!("rating_summary error: {:?}", e);
                InstructorRatingSummary::default()
            }
        }
    }

    async fn schedules_for_student(&self, student_id: Uuid) -> Vec<Schedule> {
        sqlx::query_as(
            r#"
            SELECT id, date, time_slot, instructor_id, student_id, vehicle_id, status, created_at
            FROM schedules
            WHERE student_id = $1
            ORDER BY date ASC, time_slot ASC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("schedules_for_student error: {:?}", e);
            vec![]
        })
    }

    async fn schedules_for_instructor(&self, instructor_id: Uuid) -> Vec<Schedule> {
        sqlx::query_as(
            r#"
            SELECT id, date, time_slot, instructor_id, student_id, vehicle_id, status, created_at
            FROM schedules
            WHERE instructor_id = $1
            ORDER BY date ASC, time_slot ASC
            "#,
        )
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("schedules_for_instructor error: {:?}", e);
            vec![]
        })
    }

    async fn payments_for_student(&self, student_id: Uuid) -> Vec<Payment> {
        sqlx::query_as(
            r#"
            SELECT id, student_id, amount::FLOAT8 as amount, status, method, created_at
            FROM payments
            WHERE student_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("payments_for_student error: {:?}", e);
            vec![]
        })
    }

    async fn list_payments(&self) -> Vec<Payment> {
        sqlx::query_as(
            r#"
            SELECT id, student_id, amount::FLOAT8 as amount, status, method, created_at
            FROM payments
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_payments error: {:?}", e);
            vec![]
        })
    }

    async fn ratings_for_instructor(&self, instructor_id: Uuid) -> Vec<Rating> {
        sqlx::query_as(
            r#"
            SELECT id, student_id, instructor_id, schedule_id, rating, comment, created_at
            FROM ratings
            WHERE instructor_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("ratings_for_instructor error: {:?}", e);
            vec![]
        })
    }
}
