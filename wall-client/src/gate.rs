//! Access Gate: route guarding over session state.
//!
//! Policies are pure functions of a [`Session`] snapshot. Evaluation is
//! synchronous and never touches the network.

use std::sync::Arc;

use crate::nav::Route;
use crate::session::{Session, SessionManager};

/// Guard attached to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Always allowed, even while the session initializes.
    Public,
    /// Requires a non-anonymous caller.
    SignedIn,
    /// Requires a non-anonymous caller with a registered profile.
    ProfileRequired,
}

impl RoutePolicy {
    pub fn for_route(route: Route) -> Self {
        match route {
            Route::Home | Route::About => RoutePolicy::Public,
            Route::Profile => RoutePolicy::SignedIn,
            Route::Messages | Route::MessageDetail(_) | Route::Homeworks => {
                RoutePolicy::ProfileRequired
            }
        }
    }

    /// Whether `session` satisfies this policy.
    ///
    /// Callers must not consult guarded policies while the session is
    /// initializing; [`AccessGate`] withholds the decision instead.
    pub fn allows(&self, session: &Session) -> bool {
        match self {
            RoutePolicy::Public => true,
            RoutePolicy::SignedIn => session.caller_id().is_some() && !session.is_anonymous(),
            RoutePolicy::ProfileRequired => {
                session.caller_id().is_some()
                    && !session.is_anonymous()
                    && session.profile().is_some()
            }
        }
    }
}

/// Result of evaluating a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow(Route),
    Redirect { to: Route },
    /// The session is still initializing; ask again once it settles.
    Pending,
}

/// Evaluate a policy for an already-parsed route.
pub fn evaluate_route(route: Route, session: &Session) -> GateDecision {
    let policy = RoutePolicy::for_route(route);
    if policy == RoutePolicy::Public {
        return GateDecision::Allow(route);
    }
    if session.is_initializing() || !session.is_initialized() {
        return GateDecision::Pending;
    }
    if policy.allows(session) {
        GateDecision::Allow(route)
    } else {
        GateDecision::Redirect {
            to: Route::FALLBACK,
        }
    }
}

/// Route guard bound to the client's session.
#[derive(Debug, Clone)]
pub struct AccessGate {
    session: Arc<SessionManager>,
}

impl AccessGate {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Decide a navigation to `path`. Unmatched paths redirect home.
    pub fn evaluate(&self, path: &str) -> GateDecision {
        match Route::parse(path) {
            Some(route) => self.evaluate_route(route),
            None => {
                tracing::debug!(path, "unmatched path");
                GateDecision::Redirect {
                    to: Route::FALLBACK,
                }
            }
        }
    }

    pub fn evaluate_route(&self, route: Route) -> GateDecision {
        let decision = evaluate_route(route, &self.session.snapshot());
        if let GateDecision::Redirect { to } = decision {
            tracing::debug!(from = %route, to = %to, "navigation denied");
        }
        decision
    }
}
