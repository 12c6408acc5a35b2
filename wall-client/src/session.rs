//! Session Manager.
//!
//! Owns the authenticated-identity lifecycle: obtain a delegated identity,
//! derive the caller principal, build an authorized service handle and load
//! the caller's profile.
//!
//! ```text
//! Uninitialized -> Initializing -> { Anonymous
//!                                  | AuthenticatedNoProfile
//!                                  | AuthenticatedWithProfile }
//! ```
//!
//! `login` and `logout` re-enter `Initializing`. There is no error state:
//! any failure while populating yields an anonymous session without a
//! profile or service handle.
//!
//! Entering `Initializing` drops the service handle. The identity-change
//! hook runs under the snapshot lock both on entry and when the new
//! session is published, so nothing read for the previous caller outlives
//! the transition.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use wall_core::{IdentityError, Principal, Profile, WallError, WallResult};

use crate::identity::{DelegatedIdentity, IdentityOptions, IdentityProvider};
use crate::service::{ServiceConnector, WallService};

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Anonymous,
    AuthenticatedNoProfile,
    AuthenticatedWithProfile,
}

impl SessionPhase {
    fn settled(caller: &Principal, profile: Option<&Profile>) -> Self {
        if caller.is_anonymous() {
            SessionPhase::Anonymous
        } else if profile.is_some() {
            SessionPhase::AuthenticatedWithProfile
        } else {
            SessionPhase::AuthenticatedNoProfile
        }
    }
}

/// Snapshot of the client's authentication state.
///
/// Cheap to clone. Only the [`SessionManager`] produces new snapshots.
#[derive(Clone)]
pub struct Session {
    phase: SessionPhase,
    caller_id: Option<Principal>,
    service: Option<Arc<dyn WallService>>,
    profile: Option<Profile>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            caller_id: None,
            service: None,
            profile: None,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase)
            .field("caller_id", &self.caller_id)
            .field("has_service", &self.service.is_some())
            .field("profile", &self.profile)
            .finish()
    }
}

impl Session {
    fn populated(
        caller: Principal,
        service: Arc<dyn WallService>,
        profile: Option<Profile>,
    ) -> Self {
        Self {
            phase: SessionPhase::settled(&caller, profile.as_ref()),
            caller_id: Some(caller),
            service: Some(service),
            profile,
        }
    }

    /// Result of a failed population.
    fn anonymous_fallback() -> Self {
        Self {
            phase: SessionPhase::Anonymous,
            caller_id: Some(Principal::anonymous()),
            service: None,
            profile: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_initializing(&self) -> bool {
        self.phase == SessionPhase::Initializing
    }

    /// True once the first population has completed.
    pub fn is_initialized(&self) -> bool {
        !matches!(
            self.phase,
            SessionPhase::Uninitialized | SessionPhase::Initializing
        ) || self.caller_id.is_some()
    }

    pub fn caller_id(&self) -> Option<&Principal> {
        self.caller_id.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.caller_id
            .as_ref()
            .is_some_and(Principal::is_anonymous)
    }

    /// A non-anonymous caller holding a service handle.
    pub fn is_authenticated(&self) -> bool {
        self.service.is_some()
            && self
                .caller_id
                .as_ref()
                .is_some_and(|caller| !caller.is_anonymous())
    }

    pub fn service(&self) -> Option<&Arc<dyn WallService>> {
        self.service.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }
}

/// Outcome of an interactive login request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Delegation obtained and the session repopulated.
    Completed,
    /// The user abandoned the provider flow. Nothing changed.
    Cancelled,
    /// `initialize` has not run yet. Nothing changed.
    NotInitialized,
}

type IdentityHook = Box<dyn Fn() + Send + Sync>;

/// Owns the one [`Session`] of a running client.
///
/// Shared through an `Arc` with the access gate and the data access layer.
/// Snapshots are read synchronously; lifecycle transitions are serialized
/// and never hold the snapshot lock across a remote call.
pub struct SessionManager {
    identity: Arc<dyn IdentityProvider>,
    connector: Arc<dyn ServiceConnector>,
    options: IdentityOptions,
    state: RwLock<Session>,
    transitions: Mutex<()>,
    identity_change: Option<IdentityHook>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("options", &self.options)
            .field("session", &self.snapshot())
            .field("has_identity_hook", &self.identity_change.is_some())
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        connector: Arc<dyn ServiceConnector>,
        options: IdentityOptions,
    ) -> Self {
        Self {
            identity,
            connector,
            options,
            state: RwLock::new(Session::default()),
            transitions: Mutex::new(()),
            identity_change: None,
        }
    }

    /// Run `hook` whenever the caller identity may change.
    pub fn on_identity_change(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.identity_change = Some(Box::new(hook));
        self
    }

    /// Current session state.
    pub fn snapshot(&self) -> Session {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Authorized service handle, if the session holds one.
    pub fn service(&self) -> Option<Arc<dyn WallService>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .service
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut Session)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    /// Replace the snapshot, notifying the hook before readers see it.
    fn transition(&self, f: impl FnOnce(&mut Session)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(hook) = &self.identity_change {
            hook();
        }
        f(&mut state);
    }

    fn enter_initializing(&self) {
        self.transition(|session| {
            session.phase = SessionPhase::Initializing;
            session.service = None;
        });
    }

    /// Obtain the stored or a fresh identity and populate the session.
    ///
    /// Later calls repopulate from the provider's stored delegation.
    pub async fn initialize(&self) {
        let _transition = self.transitions.lock().await;
        self.enter_initializing();
        tracing::info!("session initializing");

        let session = match self.identity.restore(&self.options).await {
            Ok(identity) => self.populate(&identity).await,
            Err(err) => {
                tracing::warn!(error = %err, "failed to restore identity, continuing anonymously");
                Session::anonymous_fallback()
            }
        };
        self.settle(session);
    }

    /// Run the interactive login flow and repopulate on success.
    ///
    /// Cancellation by the user is silent and leaves the session untouched.
    pub async fn login(&self) -> WallResult<LoginOutcome> {
        let _transition = self.transitions.lock().await;
        if !self.snapshot().is_initialized() {
            tracing::debug!("login requested before initialization");
            return Ok(LoginOutcome::NotInitialized);
        }

        let identity = match self.identity.login(&self.options).await {
            Ok(identity) => identity,
            Err(IdentityError::Cancelled) => {
                tracing::debug!("login cancelled by user");
                return Ok(LoginOutcome::Cancelled);
            }
            Err(err) => return Err(err.into()),
        };

        self.enter_initializing();
        let session = self.populate(&identity).await;
        self.settle(session);
        Ok(LoginOutcome::Completed)
    }

    /// Drop the delegation and repopulate as the anonymous caller.
    pub async fn logout(&self) {
        let _transition = self.transitions.lock().await;
        if !self.snapshot().is_initialized() {
            return;
        }
        if let Err(err) = self.identity.logout().await {
            tracing::warn!(error = %err, "identity provider logout failed");
        }

        self.enter_initializing();
        let session = self.populate(&DelegatedIdentity::anonymous()).await;
        self.settle(session);
    }

    /// Re-fetch only the caller's profile.
    ///
    /// On a remote failure the cached profile is left as it was and the
    /// failure is returned.
    pub async fn refresh_profile(&self) -> WallResult<Option<Profile>> {
        let _transition = self.transitions.lock().await;
        let current = self.snapshot();
        let service = current.service.clone().ok_or(WallError::Unauthenticated)?;
        if current.is_anonymous() {
            return Ok(None);
        }

        let profile = service.get_own_profile().await?;
        self.update(|session| {
            session.profile = profile.clone();
            if let Some(caller) = &session.caller_id {
                if session.phase != SessionPhase::Initializing {
                    session.phase = SessionPhase::settled(caller, session.profile.as_ref());
                }
            }
        });
        tracing::debug!(has_profile = profile.is_some(), "profile refreshed");
        Ok(profile)
    }

    async fn populate(&self, identity: &DelegatedIdentity) -> Session {
        match self.try_populate(identity).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(
                    principal = %identity.principal(),
                    error = %err,
                    "session population failed, continuing anonymously"
                );
                Session::anonymous_fallback()
            }
        }
    }

    async fn try_populate(&self, identity: &DelegatedIdentity) -> WallResult<Session> {
        let service = self.connector.authenticate(identity).await?;
        let profile = if identity.is_anonymous() {
            None
        } else {
            service.get_own_profile().await?
        };
        Ok(Session::populated(
            identity.principal().clone(),
            service,
            profile,
        ))
    }

    fn settle(&self, session: Session) {
        tracing::info!(
            phase = ?session.phase,
            principal = session.caller_id.as_ref().map(|p| p.as_str()).unwrap_or(""),
            "session settled"
        );
        self.transition(|state| *state = session);
    }
}
