use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tokio::time::timeout;
use uuid::Uuid;

use crate::{
    AppState,
    config::AppConfig,
    events::{AuthEvent, SessionEvents},
    models::Role,
    repository::Repository,
    session::{SessionCredential, SessionResolver},
};

/// Request headers mirroring the resolved caller for downstream page code,
/// matching what the frontend expects from its previous gateway.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const USER_ROLE_HEADER: HeaderName = HeaderName::from_static("x-user-role");
pub const USER_EMAIL_HEADER: HeaderName = HeaderName::from_static("x-user-email");

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const SUSPENDED_PATH: &str = "/account-suspended";
/// Query parameter carrying the originally requested path through the login flow.
pub const RETURN_TO_PARAM: &str = "redirectTo";

/// RouteTable
///
/// The static classification from URL path prefix to required role. Each protected
/// prefix maps to exactly one role; unlisted prefixes are public. The auth pages are
/// listed separately: they are public, but a signed-in caller is redirected off them
/// to their own dashboard.
///
/// This is operator configuration, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<(String, Role)>,
    auth_pages: Vec<String>,
}

impl RouteTable {
    pub fn new(rules: Vec<(String, Role)>, auth_pages: Vec<String>) -> Self {
        Self { rules, auth_pages }
    }

    /// The portal's default classification: one prefix per role portal.
    pub fn portal_defaults() -> Self {
        Self::new(
            vec![
                ("/admin".to_string(), Role::Admin),
                ("/student".to_string(), Role::Student),
                ("/instructor".to_string(), Role::Instructor),
                ("/accountant".to_string(), Role::Accountant),
            ],
            vec![LOGIN_PATH.to_string(), REGISTER_PATH.to_string()],
        )
    }

    /// Classifies a path. Matching is on whole path segments: `/admin` and
    /// `/admin/dashboard` are admin-scoped, `/administrator` is not.
    pub fn classify(&self, path: &str) -> Option<Role> {
        self.rules
            .iter()
            .find(|(prefix, _)| {
                path == prefix.as_str()
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(|(_, role)| *role)
    }

    pub fn is_auth_page(&self, path: &str) -> bool {
        self.auth_pages.iter().any(|p| p == path)
    }
}

/// GateContext
///
/// The resolved caller attached to a request that the gate allowed through.
/// Page handlers read this (via the `AuthUser` extractor) instead of re-resolving
/// the session themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateContext {
    pub user_id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

/// Decision
///
/// The gate's sole output for a request: proceed (optionally carrying the resolved
/// caller), or one of three redirects. Nothing is persisted; the decision is
/// computed fresh per request from the credential and the two external stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed { context: Option<GateContext> },
    RedirectLogin { return_to: Option<String> },
    RedirectHome(Role),
    RedirectSuspended,
}

impl Decision {
    /// The redirect target for non-Proceed decisions.
    pub fn redirect_path(&self) -> Option<String> {
        match self {
            Decision::Proceed { .. } => None,
            Decision::RedirectLogin { return_to } => Some(match return_to {
                Some(path) => format!(
                    "{}?{}={}",
                    LOGIN_PATH,
                    RETURN_TO_PARAM,
                    urlencoding::encode(path)
                ),
                None => LOGIN_PATH.to_string(),
            }),
            Decision::RedirectHome(role) => Some(role.home_path().to_string()),
            Decision::RedirectSuspended => Some(SUSPENDED_PATH.to_string()),
        }
    }
}

/// The failure causes the gate folds into its terminal decisions. Only ever
/// surfaced through tracing; the caller sees a redirect, never an error body.
#[derive(Debug)]
enum DenyCause {
    NoCredential,
    ExpiredOrInvalidCredential,
    SessionRefreshFailure,
    RoleLookupFailure,
    RoleLookupNotFound,
    AccountSuspended,
    RoleMismatch { required: Role, actual: Role },
}

/// AccessGate
///
/// The per-request authorization filter. For every inbound request it classifies
/// the path, resolves the caller's session and role through its two external
/// collaborators, and produces exactly one `Decision`. It holds no mutable state:
/// evaluating the same request twice against the same store state yields the same
/// decision.
pub struct AccessGate {
    routes: RouteTable,
    session_timeout: Duration,
    role_lookup_timeout: Duration,
}

impl AccessGate {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_routes(config, RouteTable::portal_defaults())
    }

    pub fn with_routes(config: &AppConfig, routes: RouteTable) -> Self {
        Self {
            routes,
            session_timeout: config.session_timeout,
            role_lookup_timeout: config.role_lookup_timeout,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// evaluate
    ///
    /// The decision function. Both external calls are bounded by the configured
    /// timeouts; an elapsed timeout is indistinguishable from a failed lookup and
    /// resolves to denial. No retries happen here.
    pub async fn evaluate(
        &self,
        path: &str,
        credential: Option<&SessionCredential>,
        sessions: &dyn SessionResolver,
        roles: &dyn Repository,
        events: &SessionEvents,
    ) -> Decision {
        match self.routes.classify(path) {
            Some(required) => {
                self.evaluate_protected(path, required, credential, sessions, roles, events)
                    .await
            }
            None => self.evaluate_public(path, credential, sessions, roles).await,
        }
    }

    /// Protected prefix: authenticate, refresh, authorize — in that order, each
    /// step fail-closed.
    async fn evaluate_protected(
        &self,
        path: &str,
        required: Role,
        credential: Option<&SessionCredential>,
        sessions: &dyn SessionResolver,
        roles: &dyn Repository,
        events: &SessionEvents,
    ) -> Decision {
        let return_to = Some(path.to_string());

        let Some(credential) = credential else {
            return self.deny_login(path, DenyCause::NoCredential, return_to);
        };

        let identity = match timeout(self.session_timeout, sessions.resolve(credential)).await {
            Ok(Some(identity)) => identity,
            // Resolution returned none/expired, or the resolver ran past its
            // budget. Either way there is no usable session.
            Ok(None) | Err(_) => {
                return self.deny_login(path, DenyCause::ExpiredOrInvalidCredential, return_to);
            }
        };

        // Side effect of resolving a live session: extend its validity window.
        // A refresh failure means the session cannot be kept alive, which the
        // strict policy treats as "no valid session".
        match timeout(self.session_timeout, sessions.refresh(credential)).await {
            Ok(Ok(refreshed)) => {
                if refreshed != *credential {
                    events.publish(AuthEvent::TokenRefreshed {
                        user_id: identity.id,
                    });
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(path, error = %e, "session refresh failed");
                return self.deny_login(path, DenyCause::SessionRefreshFailure, return_to);
            }
            Err(_) => {
                return self.deny_login(path, DenyCause::SessionRefreshFailure, return_to);
            }
        }

        let record = match timeout(self.role_lookup_timeout, roles.get_role(identity.id)).await {
            Ok(Some(record)) => record,
            // Identity unknown to the role store, unrecognized role tag, store
            // error, or budget exceeded: ambiguity never grants access.
            Ok(None) => {
                return self.deny_login(path, DenyCause::RoleLookupNotFound, return_to);
            }
            Err(_) => {
                return self.deny_login(path, DenyCause::RoleLookupFailure, return_to);
            }
        };

        if !record.active {
            tracing::info!(
                path,
                user_id = %identity.id,
                cause = ?DenyCause::AccountSuspended,
                "access denied"
            );
            return Decision::RedirectSuspended;
        }

        if record.role != required {
            tracing::debug!(
                path,
                user_id = %identity.id,
                cause = ?DenyCause::RoleMismatch { required, actual: record.role },
                "access denied"
            );
            // Never the requested page, never an error page: the caller lands on
            // their own dashboard.
            return Decision::RedirectHome(record.role);
        }

        Decision::Proceed {
            context: Some(GateContext {
                user_id: identity.id,
                role: record.role,
                email: identity.email,
            }),
        }
    }

    /// Public prefix: always proceeds, with two refinements. A signed-in caller on
    /// an auth page is sent to their own dashboard, and any valid session has its
    /// context attached so handlers like `/me` can answer without re-resolving.
    /// Failures here never block the request — public pages never hard-fail.
    async fn evaluate_public(
        &self,
        path: &str,
        credential: Option<&SessionCredential>,
        sessions: &dyn SessionResolver,
        roles: &dyn Repository,
    ) -> Decision {
        let Some(credential) = credential else {
            return Decision::Proceed { context: None };
        };

        let identity = match timeout(self.session_timeout, sessions.resolve(credential)).await {
            Ok(Some(identity)) => identity,
            Ok(None) | Err(_) => return Decision::Proceed { context: None },
        };

        let record = match timeout(self.role_lookup_timeout, roles.get_role(identity.id)).await {
            Ok(Some(record)) => record,
            Ok(None) | Err(_) => return Decision::Proceed { context: None },
        };

        if self.routes.is_auth_page(path) && record.active {
            return Decision::RedirectHome(record.role);
        }

        let context = record.active.then(|| GateContext {
            user_id: identity.id,
            role: record.role,
            email: identity.email,
        });
        Decision::Proceed { context }
    }

    fn deny_login(&self, path: &str, cause: DenyCause, return_to: Option<String>) -> Decision {
        tracing::debug!(path, cause = ?cause, "access denied");
        Decision::RedirectLogin { return_to }
    }
}

/// access_gate
///
/// The axum middleware wrapping the whole router. It extracts the transport
/// credential, asks the `AccessGate` for a decision, and either forwards the
/// request (annotated with the resolved caller) or answers with a redirect.
///
/// If the client aborts, axum drops this future and the in-flight lookups with
/// it; no partial state escapes because the gate holds none.
pub async fn access_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let credential = SessionCredential::from_headers(request.headers());
    let path = request.uri().path().to_string();

    let decision = state
        .gate
        .evaluate(
            &path,
            credential.as_ref(),
            state.sessions.as_ref(),
            state.repo.as_ref(),
            &state.events,
        )
        .await;

    match decision {
        Decision::Proceed { context } => {
            if let Some(ctx) = context {
                annotate_request(&mut request, &ctx);
                request.extensions_mut().insert(ctx);
            }
            next.run(request).await
        }
        redirect => {
            // redirect_path is Some for every non-Proceed variant.
            let target = redirect
                .redirect_path()
                .unwrap_or_else(|| LOGIN_PATH.to_string());
            Redirect::temporary(&target).into_response()
        }
    }
}

/// Mirrors the resolved caller into request headers so downstream code that only
/// sees headers (templates, proxied services) observes the same identity as the
/// `AuthUser` extractor.
fn annotate_request(request: &mut Request, ctx: &GateContext) {
    let headers = request.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&ctx.user_id.to_string()) {
        headers.insert(USER_ID_HEADER, v);
    }
    headers.insert(USER_ROLE_HEADER, HeaderValue::from_static(ctx.role.as_str()));
    if let Some(email) = &ctx.email {
        if let Ok(v) = HeaderValue::from_str(email) {
            headers.insert(USER_EMAIL_HEADER, v);
        }
    }
}
