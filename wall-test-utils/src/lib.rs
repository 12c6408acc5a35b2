//! Student Wall Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - An in-memory wall backend with per-operation call counters,
//!   scripted failures and held calls
//! - A scripted identity provider and a connector binding the two
//! - Proptest generators and fixtures for wall entities
//! - Assertions over `WallResult`

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;

pub use wall_client::{
    ClientConfig, DelegatedIdentity, IdentityOptions, IdentityProvider, Network, ServiceConnector,
    WallService,
};
pub use wall_core::{
    Content, Homework, HomeworkEntry, HomeworkId, IdentityError, Message, MessageId, NumericId,
    Principal, Profile, RemoteFailure, RemoteResult, ValidationError, Vote, WallError,
    WallResult, MESSAGES_PER_PAGE,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// Operation names used for call counting and scripted failures.
pub mod ops {
    pub const AUTHENTICATE: &str = "authenticate";
    pub const GET_OWN_PROFILE: &str = "get_own_profile";
    pub const UPDATE_OWN_PROFILE: &str = "update_own_profile";
    pub const GET_PROFILE: &str = "get_profile";
    pub const LIST_OWN_VOTES: &str = "list_own_votes";
    pub const GET_MESSAGE: &str = "get_message";
    pub const GET_MESSAGE_PAGE_COUNT: &str = "get_message_page_count";
    pub const GET_RECENT_PAGE: &str = "get_recent_page";
    pub const GET_RANKED_PAGE: &str = "get_ranked_page";
    pub const POST_MESSAGE: &str = "post_message";
    pub const EDIT_MESSAGE: &str = "edit_message";
    pub const DELETE_MESSAGE: &str = "delete_message";
    pub const UPVOTE: &str = "upvote";
    pub const DOWNVOTE: &str = "downvote";
    pub const LIST_HOMEWORK: &str = "list_homework";
    pub const ADD_HOMEWORK: &str = "add_homework";
    pub const DELETE_HOMEWORK: &str = "delete_homework";
    pub const TOGGLE_HOMEWORK_COMPLETED: &str = "toggle_homework_completed";
}

#[derive(Default)]
struct BackendState {
    profiles: HashMap<Principal, Profile>,
    messages: BTreeMap<MessageId, Message>,
    votes: HashMap<(Principal, MessageId), Vote>,
    homework: HashMap<Principal, BTreeMap<HomeworkId, Homework>>,
    next_message: u64,
    next_homework: u64,
}

/// Shared backend state behind every [`InMemoryWallService`] handle.
///
/// Mirrors the remote wall service closely enough for client tests:
/// anonymous callers cannot write, only creators may edit or delete, and
/// votes are one per caller and message.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, String>>,
    holds: Mutex<HashMap<&'static str, oneshot::Receiver<()>>>,
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("total_calls", &self.total_calls())
            .finish()
    }
}

impl InMemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A service handle acting as `caller`.
    pub fn handle(self: &Arc<Self>, caller: Principal) -> InMemoryWallService {
        InMemoryWallService {
            backend: Arc::clone(self),
            caller,
        }
    }

    pub fn register_profile(&self, principal: &Principal, profile: Profile) {
        lock(&self.state).profiles.insert(principal.clone(), profile);
    }

    /// Insert a message directly, bypassing counters and validation.
    pub fn seed_message(&self, creator: &Principal, content: Content) -> MessageId {
        let mut state = lock(&self.state);
        state.next_message += 1;
        let id = MessageId::new(state.next_message);
        state.messages.insert(
            id,
            Message {
                id,
                creator: creator.clone(),
                content,
                vote: 0,
            },
        );
        id
    }

    pub fn message_count(&self) -> usize {
        lock(&self.state).messages.len()
    }

    pub fn vote_of(&self, caller: &Principal, id: MessageId) -> Option<Vote> {
        lock(&self.state).votes.get(&(caller.clone(), id)).copied()
    }

    /// Make every later call of `op` fail with `payload` until cleared.
    pub fn fail(&self, op: &'static str, payload: impl Into<String>) {
        lock(&self.failures).insert(op, payload.into());
    }

    pub fn clear_failure(&self, op: &'static str) {
        lock(&self.failures).remove(op);
    }

    /// Park the next call of `op` until the returned sender fires or drops.
    pub fn hold(&self, op: &'static str) -> oneshot::Sender<()> {
        let (release, held) = oneshot::channel();
        lock(&self.holds).insert(op, held);
        release
    }

    pub fn calls(&self, op: &'static str) -> usize {
        lock(&self.calls).get(op).copied().unwrap_or(0)
    }

    /// Calls across every operation except `authenticate`.
    pub fn total_calls(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|(op, _)| **op != ops::AUTHENTICATE)
            .map(|(_, count)| count)
            .sum()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    async fn record(&self, op: &'static str) -> RemoteResult<()> {
        let held = lock(&self.holds).remove(op);
        if let Some(held) = held {
            let _ = held.await;
        }
        *lock(&self.calls).entry(op).or_insert(0) += 1;
        match lock(&self.failures).get(op) {
            Some(payload) => Err(RemoteFailure::new(payload.clone())),
            None => Ok(()),
        }
    }

    fn page(messages: Vec<Message>, page: u64) -> Vec<Message> {
        let start = (page.max(1) as usize - 1) * MESSAGES_PER_PAGE;
        messages
            .into_iter()
            .skip(start)
            .take(MESSAGES_PER_PAGE)
            .collect()
    }
}

/// [`WallService`] handle bound to one caller of an [`InMemoryBackend`].
#[derive(Debug, Clone)]
pub struct InMemoryWallService {
    backend: Arc<InMemoryBackend>,
    caller: Principal,
}

impl InMemoryWallService {
    pub fn caller(&self) -> &Principal {
        &self.caller
    }

    fn writer(&self) -> RemoteResult<&Principal> {
        if self.caller.is_anonymous() {
            return Err(RemoteFailure::new("Anonymous callers cannot write"));
        }
        Ok(&self.caller)
    }

    async fn cast(&self, op: &'static str, id: MessageId, vote: Vote) -> RemoteResult<()> {
        self.backend.record(op).await?;
        let caller = self.writer()?.clone();
        let mut state = lock(&self.backend.state);
        if !state.messages.contains_key(&id) {
            return Err(RemoteFailure::new("Message not found"));
        }
        let previous = state.votes.insert((caller, id), vote);
        let delta = match (previous, vote) {
            (Some(before), after) if before == after => 0,
            (None, Vote::Upvote) => 1,
            (None, Vote::Downvote) => -1,
            (Some(_), Vote::Upvote) => 2,
            (Some(_), Vote::Downvote) => -2,
        };
        if let Some(message) = state.messages.get_mut(&id) {
            message.vote += delta;
        }
        Ok(())
    }

    fn owned_message(&self, state: &BackendState, id: MessageId) -> RemoteResult<()> {
        let message = state
            .messages
            .get(&id)
            .ok_or_else(|| RemoteFailure::new("Message not found"))?;
        if message.creator != self.caller {
            return Err(RemoteFailure::new("You are not the creator of this message"));
        }
        Ok(())
    }
}

#[async_trait]
impl WallService for InMemoryWallService {
    async fn get_own_profile(&self) -> RemoteResult<Option<Profile>> {
        self.backend.record(ops::GET_OWN_PROFILE).await?;
        Ok(lock(&self.backend.state).profiles.get(&self.caller).cloned())
    }

    async fn update_own_profile(&self, profile: Profile) -> RemoteResult<()> {
        self.backend.record(ops::UPDATE_OWN_PROFILE).await?;
        let caller = self.writer()?.clone();
        lock(&self.backend.state).profiles.insert(caller, profile);
        Ok(())
    }

    async fn get_profile(&self, principal: &Principal) -> RemoteResult<Profile> {
        self.backend.record(ops::GET_PROFILE).await?;
        lock(&self.backend.state)
            .profiles
            .get(principal)
            .cloned()
            .ok_or_else(|| RemoteFailure::new("Profile not found"))
    }

    async fn list_own_votes(&self) -> RemoteResult<Vec<(MessageId, Vote)>> {
        self.backend.record(ops::LIST_OWN_VOTES).await?;
        let state = lock(&self.backend.state);
        Ok(state
            .votes
            .iter()
            .filter(|((voter, _), _)| *voter == self.caller)
            .map(|((_, id), vote)| (*id, *vote))
            .collect())
    }

    async fn get_message(&self, id: MessageId) -> RemoteResult<Message> {
        self.backend.record(ops::GET_MESSAGE).await?;
        lock(&self.backend.state)
            .messages
            .get(&id)
            .cloned()
            .ok_or_else(|| RemoteFailure::new("Message not found"))
    }

    async fn get_message_page_count(&self) -> RemoteResult<u64> {
        self.backend.record(ops::GET_MESSAGE_PAGE_COUNT).await?;
        let count = lock(&self.backend.state).messages.len();
        Ok(count.div_ceil(MESSAGES_PER_PAGE) as u64)
    }

    async fn get_recent_page(&self, page: u64) -> RemoteResult<Vec<Message>> {
        self.backend.record(ops::GET_RECENT_PAGE).await?;
        let messages: Vec<Message> = lock(&self.backend.state)
            .messages
            .values()
            .rev()
            .cloned()
            .collect();
        Ok(InMemoryBackend::page(messages, page))
    }

    async fn get_ranked_page(&self, page: u64) -> RemoteResult<Vec<Message>> {
        self.backend.record(ops::GET_RANKED_PAGE).await?;
        let mut messages: Vec<Message> = lock(&self.backend.state)
            .messages
            .values()
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.vote.cmp(&a.vote).then(b.id.cmp(&a.id)));
        Ok(InMemoryBackend::page(messages, page))
    }

    async fn post_message(&self, content: Content) -> RemoteResult<MessageId> {
        self.backend.record(ops::POST_MESSAGE).await?;
        let caller = self.writer()?.clone();
        Ok(self.backend.seed_message(&caller, content))
    }

    async fn edit_message(&self, id: MessageId, content: Content) -> RemoteResult<()> {
        self.backend.record(ops::EDIT_MESSAGE).await?;
        self.writer()?;
        let mut state = lock(&self.backend.state);
        self.owned_message(&state, id)?;
        if let Some(message) = state.messages.get_mut(&id) {
            message.content = content;
        }
        Ok(())
    }

    async fn delete_message(&self, id: MessageId) -> RemoteResult<()> {
        self.backend.record(ops::DELETE_MESSAGE).await?;
        self.writer()?;
        let mut state = lock(&self.backend.state);
        self.owned_message(&state, id)?;
        state.messages.remove(&id);
        state.votes.retain(|(_, voted), _| *voted != id);
        Ok(())
    }

    async fn upvote(&self, id: MessageId) -> RemoteResult<()> {
        self.cast(ops::UPVOTE, id, Vote::Upvote).await
    }

    async fn downvote(&self, id: MessageId) -> RemoteResult<()> {
        self.cast(ops::DOWNVOTE, id, Vote::Downvote).await
    }

    async fn list_homework(&self) -> RemoteResult<Vec<HomeworkEntry>> {
        self.backend.record(ops::LIST_HOMEWORK).await?;
        let state = lock(&self.backend.state);
        Ok(state
            .homework
            .get(&self.caller)
            .map(|diary| diary.iter().map(|(id, hw)| (*id, hw.clone())).collect())
            .unwrap_or_default())
    }

    async fn add_homework(&self, homework: Homework) -> RemoteResult<HomeworkId> {
        self.backend.record(ops::ADD_HOMEWORK).await?;
        let caller = self.writer()?.clone();
        let mut state = lock(&self.backend.state);
        state.next_homework += 1;
        let id = HomeworkId::new(state.next_homework);
        state.homework.entry(caller).or_default().insert(id, homework);
        Ok(id)
    }

    async fn delete_homework(&self, id: HomeworkId) -> RemoteResult<()> {
        self.backend.record(ops::DELETE_HOMEWORK).await?;
        let caller = self.writer()?.clone();
        let mut state = lock(&self.backend.state);
        state
            .homework
            .get_mut(&caller)
            .and_then(|diary| diary.remove(&id))
            .map(|_| ())
            .ok_or_else(|| RemoteFailure::new("Homework not found"))
    }

    async fn toggle_homework_completed(&self, id: HomeworkId) -> RemoteResult<()> {
        self.backend.record(ops::TOGGLE_HOMEWORK_COMPLETED).await?;
        let caller = self.writer()?.clone();
        let mut state = lock(&self.backend.state);
        let homework = state
            .homework
            .get_mut(&caller)
            .and_then(|diary| diary.get_mut(&id))
            .ok_or_else(|| RemoteFailure::new("Homework not found"))?;
        homework.completed = !homework.completed;
        Ok(())
    }
}

/// Connector handing out [`InMemoryWallService`] handles.
#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    backend: Arc<InMemoryBackend>,
}

impl InMemoryConnector {
    pub fn new(backend: Arc<InMemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ServiceConnector for InMemoryConnector {
    async fn authenticate(
        &self,
        identity: &DelegatedIdentity,
    ) -> RemoteResult<Arc<dyn WallService>> {
        self.backend.record(ops::AUTHENTICATE).await?;
        Ok(Arc::new(self.backend.handle(identity.principal().clone())))
    }
}

// ============================================================================
// SCRIPTED IDENTITY PROVIDER
// ============================================================================

#[derive(Debug, Default)]
struct ProviderState {
    stored: Option<Principal>,
    logins: VecDeque<Result<Principal, IdentityError>>,
    restore_failure: Option<IdentityError>,
    last_options: Option<IdentityOptions>,
    logouts: usize,
}

/// Identity provider answering logins from a script.
///
/// `login` pops the next scripted result; an empty script behaves like a
/// user closing the login window.
#[derive(Debug, Default)]
pub struct ScriptedIdentityProvider {
    state: Mutex<ProviderState>,
}

impl ScriptedIdentityProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Provider already holding a delegation for `principal`.
    pub fn signed_in(principal: Principal) -> Arc<Self> {
        let provider = Self::default();
        lock(&provider.state).stored = Some(principal);
        Arc::new(provider)
    }

    pub fn push_login(&self, principal: Principal) {
        lock(&self.state).logins.push_back(Ok(principal));
    }

    pub fn push_login_error(&self, error: IdentityError) {
        lock(&self.state).logins.push_back(Err(error));
    }

    pub fn fail_restore(&self, error: IdentityError) {
        lock(&self.state).restore_failure = Some(error);
    }

    pub fn stored(&self) -> Option<Principal> {
        lock(&self.state).stored.clone()
    }

    pub fn last_options(&self) -> Option<IdentityOptions> {
        lock(&self.state).last_options.clone()
    }

    pub fn logouts(&self) -> usize {
        lock(&self.state).logouts
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentityProvider {
    async fn restore(
        &self,
        options: &IdentityOptions,
    ) -> Result<DelegatedIdentity, IdentityError> {
        let mut state = lock(&self.state);
        state.last_options = Some(options.clone());
        if let Some(error) = state.restore_failure.clone() {
            return Err(error);
        }
        Ok(state
            .stored
            .clone()
            .map(DelegatedIdentity::new)
            .unwrap_or_else(DelegatedIdentity::anonymous))
    }

    async fn login(&self, options: &IdentityOptions) -> Result<DelegatedIdentity, IdentityError> {
        let mut state = lock(&self.state);
        state.last_options = Some(options.clone());
        let principal = state
            .logins
            .pop_front()
            .unwrap_or(Err(IdentityError::Cancelled))?;
        state.stored = Some(principal.clone());
        Ok(DelegatedIdentity::new(principal))
    }

    async fn logout(&self) -> Result<(), IdentityError> {
        let mut state = lock(&self.state);
        state.stored = None;
        state.logouts += 1;
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for wall entities.

    use super::*;
    use proptest::prelude::*;

    /// A non-anonymous principal in textual form.
    pub fn arb_principal() -> impl Strategy<Value = Principal> {
        "[a-z2-7]{5}(-[a-z2-7]{5}){2}-cai".prop_map(Principal::from_text)
    }

    pub fn arb_message_id() -> impl Strategy<Value = MessageId> {
        (1u64..10_000).prop_map(MessageId::new)
    }

    pub fn arb_vote() -> impl Strategy<Value = Vote> {
        prop_oneof![Just(Vote::Upvote), Just(Vote::Downvote)]
    }

    /// Text long enough to pass message validation.
    pub fn arb_message_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ]{10,120}"
    }

    /// Text too short for message validation.
    pub fn arb_short_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ]{0,9}"
    }

    pub fn arb_profile() -> impl Strategy<Value = Profile> {
        (
            "[A-Z][a-z]{2,12}",
            "[a-z]{3,10}@[a-z]{3,8}\\.(com|org|dev)",
            proptest::option::of("[A-Z][a-z]{3,10}"),
        )
            .prop_map(|(name, email, team)| Profile {
                name,
                email,
                team,
                graduate: false,
            })
    }

    pub fn arb_homework() -> impl Strategy<Value = Homework> {
        ("[A-Z][a-z]{3,20}", "[a-z ]{10,80}", 1577836800i64..1893456000i64).prop_map(
            |(title, description, secs)| {
                let due = chrono::DateTime::from_timestamp(secs, 0)
                    .unwrap_or_else(chrono::Utc::now);
                Homework::new(title, description, due)
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common scenarios.

    use super::*;
    use wall_client::CacheConfig;

    pub fn student() -> Principal {
        Principal::from_text("rrkah-fqaaa-aaaaa-aaaaq-cai")
    }

    pub fn other_student() -> Principal {
        Principal::from_text("ryjl3-tyaaa-aaaaa-aaaba-cai")
    }

    pub fn profile() -> Profile {
        Profile {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            team: Some("Motoko".to_string()),
            graduate: false,
        }
    }

    pub fn long_text() -> Content {
        Content::text("This message is long enough to post.")
    }

    pub fn homework() -> Homework {
        Homework::new(
            "Motoko basics",
            "Read chapters one to three",
            chrono::Utc::now() + chrono::Duration::days(7),
        )
    }

    /// Local-network config with a long collector interval.
    pub fn local_config() -> ClientConfig {
        ClientConfig {
            network: Network::Local,
            backend_canister_id: "rrkah-fqaaa-aaaaa-aaaaq-cai".to_string(),
            identity_canister_id: Some("rdmx6-jaaaa-aaaaa-aaadq-cai".to_string()),
            local_replica_url: None,
            disable_idle_logout: true,
            log_filter: None,
            log_json: false,
            gc_interval_ms: 60_000,
            cache: CacheConfig::default(),
        }
    }

    /// A backend where [`student`] has a registered profile.
    pub fn backend_with_student() -> Arc<InMemoryBackend> {
        let backend = InMemoryBackend::new();
        backend.register_profile(&student(), profile());
        backend
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `WallResult` error variants.

    use super::*;

    #[track_caller]
    pub fn assert_unauthenticated<T: std::fmt::Debug>(result: &WallResult<T>) {
        match result {
            Err(WallError::Unauthenticated) => {}
            other => panic!("Expected Unauthenticated, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &WallResult<T>) {
        match result {
            Err(WallError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &WallResult<T>, entity: &str) {
        match result {
            Err(WallError::NotFound { entity: found, .. }) => {
                assert_eq!(*found, entity, "Wrong entity in NotFound error");
            }
            other => panic!("Expected NotFound for {}, got: {:?}", entity, other),
        }
    }

    #[track_caller]
    pub fn assert_remote_failure<T: std::fmt::Debug>(result: &WallResult<T>, payload: &str) {
        match result {
            Err(WallError::Remote(failure)) => assert_eq!(failure.payload, payload),
            other => panic!("Expected RemoteFailure({}), got: {:?}", payload, other),
        }
    }
}
