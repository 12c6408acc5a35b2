//! Remote wall service interface.
//!
//! The backend is reached through a signed-request actor bound to one
//! caller identity. Every call answers with a tagged `ok | err` response,
//! modeled here as [`RemoteResult`].

use std::sync::Arc;

use async_trait::async_trait;
use wall_core::{
    Content, Homework, HomeworkEntry, HomeworkId, Message, MessageId, Principal, Profile,
    RemoteResult, Vote,
};

use crate::identity::DelegatedIdentity;

/// Authorized handle to the remote wall service.
///
/// Implementations are bound to the identity they were created for; every
/// call is made on behalf of that caller.
#[async_trait]
pub trait WallService: Send + Sync {
    /// The caller's own profile, `None` when no profile is registered yet.
    async fn get_own_profile(&self) -> RemoteResult<Option<Profile>>;

    async fn update_own_profile(&self, profile: Profile) -> RemoteResult<()>;

    async fn get_profile(&self, principal: &Principal) -> RemoteResult<Profile>;

    /// Votes cast by the caller, one per message.
    async fn list_own_votes(&self) -> RemoteResult<Vec<(MessageId, Vote)>>;

    async fn get_message(&self, id: MessageId) -> RemoteResult<Message>;

    async fn get_message_page_count(&self) -> RemoteResult<u64>;

    /// One page of messages, newest first. Pages start at 1.
    async fn get_recent_page(&self, page: u64) -> RemoteResult<Vec<Message>>;

    /// One page of messages ordered by vote count. Pages start at 1.
    async fn get_ranked_page(&self, page: u64) -> RemoteResult<Vec<Message>>;

    async fn post_message(&self, content: Content) -> RemoteResult<MessageId>;

    async fn edit_message(&self, id: MessageId, content: Content) -> RemoteResult<()>;

    async fn delete_message(&self, id: MessageId) -> RemoteResult<()>;

    async fn upvote(&self, id: MessageId) -> RemoteResult<()>;

    async fn downvote(&self, id: MessageId) -> RemoteResult<()>;

    async fn list_homework(&self) -> RemoteResult<Vec<HomeworkEntry>>;

    async fn add_homework(&self, homework: Homework) -> RemoteResult<HomeworkId>;

    async fn delete_homework(&self, id: HomeworkId) -> RemoteResult<()>;

    async fn toggle_homework_completed(&self, id: HomeworkId) -> RemoteResult<()>;
}

/// Produces service handles bound to a delegated identity.
#[async_trait]
pub trait ServiceConnector: Send + Sync {
    async fn authenticate(&self, identity: &DelegatedIdentity) -> RemoteResult<Arc<dyn WallService>>;
}
