use async_trait::async_trait;
use drive_portal::{
    config::AppConfig,
    events::{AuthEvent, SessionEvents},
    gate::{AccessGate, Decision, RouteTable},
    models::{
        AdminDashboardStats, InstructorRatingSummary, Payment, PaymentSummary, Rating, Role,
        RoleRecord, Schedule, User,
    },
    repository::Repository,
    session::{Identity, SessionCredential, SessionError, SessionResolver},
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

// --- Mock Session Resolver ---

/// Resolver backed by a token -> identity map, with switches for the failure
/// modes the gate must fold into denials.
#[derive(Default)]
struct MockResolver {
    identities: HashMap<String, Identity>,
    fail_refresh: bool,
    // Rotates every refreshed credential to this token, to exercise the
    // TokenRefreshed event path.
    rotate_to: Option<String>,
    delay: Option<Duration>,
}

#[async_trait]
impl SessionResolver for MockResolver {
    async fn resolve(&self, credential: &SessionCredential) -> Option<Identity> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.identities.get(&credential.access_token).cloned()
    }

    async fn refresh(
        &self,
        credential: &SessionCredential,
    ) -> Result<SessionCredential, SessionError> {
        if self.fail_refresh {
            return Err(SessionError::Rejected("mock refresh failure".to_string()));
        }
        match &self.rotate_to {
            Some(token) => Ok(SessionCredential::bearer(token.clone())),
            None => Ok(credential.clone()),
        }
    }
}

// --- Mock Role Store ---

#[derive(Default)]
struct MockRoleStore {
    // Mutex so a test can change a role record between evaluations, standing in
    // for an admin flipping the suspension flag.
    roles: Mutex<HashMap<Uuid, RoleRecord>>,
    delay: Option<Duration>,
}

#[async_trait]
impl Repository for MockRoleStore {
    async fn get_role(&self, user_id: Uuid) -> Option<RoleRecord> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.roles.lock().unwrap().get(&user_id).copied()
    }

    // The gate only touches get_role; the rest are inert placeholders.
    async fn get_user(&self, _id: Uuid) -> Option<User> {
        None
    }
    async fn create_user(&self, _user: User) -> Option<User> {
        None
    }
    async fn list_users_by_role(&self, _role: Role) -> Vec<User> {
        vec![]
    }
    async fn set_user_active(&self, _id: Uuid, _active: bool) -> bool {
        false
    }
    async fn get_stats(&self) -> AdminDashboardStats {
        AdminDashboardStats::default()
    }
    async fn payment_summary(&self) -> PaymentSummary {
        PaymentSummary::default()
    }
    async fn rating_summary(&self, _instructor_id: Uuid) -> InstructorRatingSummary {
        InstructorRatingSummary::default()
    }
    async fn schedules_for_student(&self, _student_id: Uuid) -> Vec<Schedule> {
        vec![]
    }
    async fn schedules_for_instructor(&self, _instructor_id: Uuid) -> Vec<Schedule> {
        vec![]
    }
    async fn payments_for_student(&self, _student_id: Uuid) -> Vec<Payment> {
        vec![]
    }
    async fn list_payments(&self) -> Vec<Payment> {
        vec![]
    }
    async fn ratings_for_instructor(&self, _instructor_id: Uuid) -> Vec<Rating> {
        vec![]
    }
}

// --- Helpers ---

fn test_gate() -> AccessGate {
    let mut config = AppConfig::default();
    config.session_timeout = Duration::from_millis(100);
    config.role_lookup_timeout = Duration::from_millis(100);
    AccessGate::new(&config)
}

/// One signed-in account wired through both mocks.
fn signed_in(token: &str, role: Role, active: bool) -> (MockResolver, MockRoleStore, Uuid) {
    let user_id = Uuid::new_v4();
    let mut resolver = MockResolver::default();
    resolver.identities.insert(
        token.to_string(),
        Identity {
            id: user_id,
            email: Some("caller@drive.school".to_string()),
        },
    );
    let store = MockRoleStore::default();
    store
        .roles
        .lock()
        .unwrap()
        .insert(user_id, RoleRecord { role, active });
    (resolver, store, user_id)
}

// --- Public Path Properties ---

#[tokio::test]
async fn public_path_proceeds_without_credential() {
    let gate = test_gate();
    let events = SessionEvents::new();

    let decision = gate
        .evaluate(
            "/health",
            None,
            &MockResolver::default(),
            &MockRoleStore::default(),
            &events,
        )
        .await;

    assert_eq!(decision, Decision::Proceed { context: None });
}

#[tokio::test]
async fn public_path_proceeds_with_garbage_credential() {
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("not-a-real-token");

    let decision = gate
        .evaluate(
            "/health",
            Some(&credential),
            &MockResolver::default(),
            &MockRoleStore::default(),
            &events,
        )
        .await;

    assert_eq!(decision, Decision::Proceed { context: None });
}

#[tokio::test]
async fn unlisted_prefix_is_not_classified_by_substring() {
    // "/admins" shares a string prefix with "/admin" but is a different segment.
    let routes = RouteTable::portal_defaults();
    assert_eq!(routes.classify("/admin"), Some(Role::Admin));
    assert_eq!(routes.classify("/admin/dashboard"), Some(Role::Admin));
    assert_eq!(routes.classify("/admins"), None);
    assert_eq!(routes.classify("/administrator/dashboard"), None);
}

// --- Unauthenticated Properties ---

#[tokio::test]
async fn protected_path_without_credential_redirects_to_login_with_return_path() {
    let gate = test_gate();
    let events = SessionEvents::new();

    let decision = gate
        .evaluate(
            "/admin/dashboard",
            None,
            &MockResolver::default(),
            &MockRoleStore::default(),
            &events,
        )
        .await;

    assert_eq!(
        decision,
        Decision::RedirectLogin {
            return_to: Some("/admin/dashboard".to_string())
        }
    );
    assert_eq!(
        decision.redirect_path().unwrap(),
        "/login?redirectTo=%2Fadmin%2Fdashboard"
    );
}

#[tokio::test]
async fn protected_path_with_unresolvable_credential_redirects_to_login() {
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("expired-or-forged");

    let decision = gate
        .evaluate(
            "/student/schedule",
            Some(&credential),
            &MockResolver::default(),
            &MockRoleStore::default(),
            &events,
        )
        .await;

    assert!(matches!(decision, Decision::RedirectLogin { .. }));
}

// --- Authenticated Properties ---

#[tokio::test]
async fn matching_role_proceeds_with_context() {
    let (resolver, store, user_id) = signed_in("tok", Role::Accountant, true);
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate(
            "/accountant/payments",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;

    match decision {
        Decision::Proceed { context: Some(ctx) } => {
            assert_eq!(ctx.user_id, user_id);
            assert_eq!(ctx.role, Role::Accountant);
            assert_eq!(ctx.email.as_deref(), Some("caller@drive.school"));
        }
        other => panic!("expected Proceed with context, got {:?}", other),
    }
}

#[tokio::test]
async fn mismatched_role_redirects_to_callers_own_home() {
    let (resolver, store, _) = signed_in("tok", Role::Instructor, true);
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate(
            "/student/schedule",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;

    // The caller lands on THEIR dashboard, not the requested prefix's.
    assert_eq!(decision, Decision::RedirectHome(Role::Instructor));
    assert_eq!(
        decision.redirect_path().unwrap(),
        "/instructor/dashboard"
    );
}

#[tokio::test]
async fn suspended_account_redirects_to_suspended_page_even_on_role_match() {
    let (resolver, store, _) = signed_in("tok", Role::Instructor, false);
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate(
            "/instructor/dashboard",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;

    assert_eq!(decision, Decision::RedirectSuspended);
    assert_eq!(decision.redirect_path().unwrap(), "/account-suspended");
}

#[tokio::test]
async fn suspension_outranks_role_mismatch() {
    let (resolver, store, _) = signed_in("tok", Role::Student, false);
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate(
            "/admin/dashboard",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;

    assert_eq!(decision, Decision::RedirectSuspended);
}

// --- Fail-Closed Properties ---

#[tokio::test]
async fn role_lookup_miss_redirects_to_login() {
    // Session resolves, but the role store has no row for the identity.
    let mut resolver = MockResolver::default();
    resolver.identities.insert(
        "tok".to_string(),
        Identity {
            id: Uuid::new_v4(),
            email: None,
        },
    );
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate(
            "/admin/dashboard",
            Some(&credential),
            &resolver,
            &MockRoleStore::default(),
            &events,
        )
        .await;

    assert!(matches!(decision, Decision::RedirectLogin { .. }));
}

#[tokio::test]
async fn slow_role_lookup_times_out_and_redirects_to_login() {
    let (resolver, mut store, _) = signed_in("tok", Role::Admin, true);
    store.delay = Some(Duration::from_millis(400));
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate(
            "/admin/dashboard",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;

    assert!(matches!(decision, Decision::RedirectLogin { .. }));
}

#[tokio::test]
async fn slow_session_resolution_times_out_and_redirects_to_login() {
    let (mut resolver, store, _) = signed_in("tok", Role::Admin, true);
    resolver.delay = Some(Duration::from_millis(400));
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate(
            "/admin/dashboard",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;

    assert!(matches!(decision, Decision::RedirectLogin { .. }));
}

#[tokio::test]
async fn refresh_failure_redirects_to_login() {
    let (mut resolver, store, _) = signed_in("tok", Role::Admin, true);
    resolver.fail_refresh = true;
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate(
            "/admin/dashboard",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;

    assert!(matches!(decision, Decision::RedirectLogin { .. }));
}

// --- Refresh Side Effect ---

#[tokio::test]
async fn rotated_credential_publishes_token_refreshed() {
    let (mut resolver, store, user_id) = signed_in("tok", Role::Admin, true);
    resolver.rotate_to = Some("fresh-tok".to_string());
    let gate = test_gate();
    let events = SessionEvents::new();
    let mut rx = events.subscribe();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate(
            "/admin/dashboard",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;

    assert!(matches!(decision, Decision::Proceed { context: Some(_) }));
    assert_eq!(rx.try_recv().unwrap(), AuthEvent::TokenRefreshed { user_id });
}

// --- Auth Page Rule ---

#[tokio::test]
async fn signed_in_caller_on_login_page_redirects_home() {
    let (resolver, store, _) = signed_in("tok", Role::Student, true);
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate("/login", Some(&credential), &resolver, &store, &events)
        .await;

    assert_eq!(decision, Decision::RedirectHome(Role::Student));
    assert_eq!(decision.redirect_path().unwrap(), "/student/dashboard");
}

#[tokio::test]
async fn anonymous_caller_on_login_page_proceeds() {
    let gate = test_gate();
    let events = SessionEvents::new();

    let decision = gate
        .evaluate(
            "/login",
            None,
            &MockResolver::default(),
            &MockRoleStore::default(),
            &events,
        )
        .await;

    assert_eq!(decision, Decision::Proceed { context: None });
}

#[tokio::test]
async fn suspended_caller_on_login_page_proceeds_without_context() {
    // Redirecting a suspended account "home" would bounce straight back through
    // the gate; public auth pages stay reachable instead.
    let (resolver, store, _) = signed_in("tok", Role::Student, false);
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate("/login", Some(&credential), &resolver, &store, &events)
        .await;

    assert_eq!(decision, Decision::Proceed { context: None });
}

// --- Idempotence ---

#[tokio::test]
async fn same_request_and_store_state_yields_same_decision() {
    let (resolver, store, _) = signed_in("tok", Role::Instructor, true);
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let first = gate
        .evaluate(
            "/student/schedule",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;
    let second = gate
        .evaluate(
            "/student/schedule",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn suspension_toggle_takes_effect_on_next_evaluation() {
    let (resolver, store, user_id) = signed_in("tok", Role::Student, true);
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let before = gate
        .evaluate(
            "/student/dashboard",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;
    assert!(matches!(before, Decision::Proceed { context: Some(_) }));

    // Admin flips the flag; the change is visible one lookup later.
    store.roles.lock().unwrap().insert(
        user_id,
        RoleRecord {
            role: Role::Student,
            active: false,
        },
    );

    let after = gate
        .evaluate(
            "/student/dashboard",
            Some(&credential),
            &resolver,
            &store,
            &events,
        )
        .await;
    assert_eq!(after, Decision::RedirectSuspended);
}

// --- Context Attachment on Public Paths ---

#[tokio::test]
async fn valid_session_on_public_path_attaches_context() {
    let (resolver, store, user_id) = signed_in("tok", Role::Student, true);
    let gate = test_gate();
    let events = SessionEvents::new();
    let credential = SessionCredential::bearer("tok");

    let decision = gate
        .evaluate("/me", Some(&credential), &resolver, &store, &events)
        .await;

    match decision {
        Decision::Proceed { context: Some(ctx) } => {
            assert_eq!(ctx.user_id, user_id);
            assert_eq!(ctx.role, Role::Student);
        }
        other => panic!("expected Proceed with context, got {:?}", other),
    }
}
