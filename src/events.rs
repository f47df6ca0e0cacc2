use tokio::sync::broadcast;
use uuid::Uuid;

/// AuthEvent
///
/// A session lifecycle transition observed by the portal: a caller signing in,
/// signing out, or having their token silently refreshed by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: Uuid },
    SignedOut { user_id: Uuid },
    TokenRefreshed { user_id: Uuid },
}

/// AuthState
///
/// The per-subscriber view of a session's lifecycle, derived by folding events.
/// There is deliberately no process-wide "current user" cell; each consumer folds
/// the event stream it subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn {
        user_id: Uuid,
    },
}

impl AuthState {
    /// Applies one event to the state machine. Transitions outside the machine are
    /// ignored: a TokenRefreshed while SignedOut does not conjure a session, and a
    /// SignedOut for a different user does not tear down the current one.
    pub fn apply(self, event: AuthEvent) -> Self {
        match (self, event) {
            (_, AuthEvent::SignedIn { user_id }) => AuthState::SignedIn { user_id },
            (AuthState::SignedIn { user_id }, AuthEvent::SignedOut { user_id: out })
                if user_id == out =>
            {
                AuthState::SignedOut
            }
            (AuthState::SignedIn { user_id }, AuthEvent::TokenRefreshed { user_id: refreshed })
                if user_id == refreshed =>
            {
                AuthState::SignedIn { user_id }
            }
            (state, _) => state,
        }
    }
}

/// SessionEvents
///
/// Broadcast hub for session lifecycle transitions. The login/logout handlers and
/// the gate's refresh side effect publish here; any interested component subscribes
/// and folds the stream through `AuthState::apply`.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        // Slow subscribers lag and skip rather than block publishers.
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. A send with no live subscribers is not an error; the
    /// portal does not require anyone to be listening.
    pub fn publish(&self, event: AuthEvent) {
        let _ = self.tx.send(event);
        tracing::debug!(?event, "session event");
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
