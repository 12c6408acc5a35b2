//! Data Access Layer.
//!
//! Every read goes through the query cache under a key from
//! [`crate::queries`]. Every write validates its input, calls the service
//! once and then applies its [`Mutation`] invalidations. Nothing here
//! retries; remote failures are returned as they arrived.

use std::collections::HashMap;
use std::sync::Arc;

use wall_cache::{CacheRead, QueryCache, Snapshot};
use wall_core::{
    validate_content, validate_homework, validate_profile, Content, Homework, HomeworkEntry,
    HomeworkId, Message, MessageId, NumericId, Principal, Profile, Vote, WallError, WallResult,
};

use crate::invalidation::Mutation;
use crate::nav::Route;
use crate::pager::{Feed, Pager};
use crate::queries::{self, QueryPolicies};
use crate::service::WallService;
use crate::session::SessionManager;

/// The caller's votes keyed by message.
pub type VoteMap = HashMap<MessageId, Vote>;

/// Result of an upvote or downvote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The service recorded the vote.
    Recorded,
    /// The cached vote already matched; nothing was sent.
    Unchanged,
}

/// Query and mutation wrappers around the remote wall service.
#[derive(Debug, Clone)]
pub struct DataAccess {
    session: Arc<SessionManager>,
    cache: QueryCache,
    policies: QueryPolicies,
}

impl DataAccess {
    pub fn new(session: Arc<SessionManager>, cache: QueryCache, policies: QueryPolicies) -> Self {
        Self {
            session,
            cache,
            policies,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn policies(&self) -> &QueryPolicies {
        &self.policies
    }

    fn service(&self) -> WallResult<Arc<dyn WallService>> {
        self.session.service().ok_or(WallError::Unauthenticated)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn list_own_votes(&self) -> WallResult<CacheRead<VoteMap>> {
        let service = self.service()?;
        self.cache
            .query(queries::votes(), self.policies.votes, move || async move {
                let votes = service.list_own_votes().await?;
                Ok::<_, WallError>(votes.into_iter().collect::<VoteMap>())
            })
            .await
    }

    /// A single message. Any remote failure is reported as not found.
    pub async fn message(&self, id: MessageId) -> WallResult<CacheRead<Message>> {
        let service = self.service()?;
        self.cache
            .query(
                queries::message_detail(id),
                self.policies.message_detail,
                move || async move {
                    service.get_message(id).await.map_err(|failure| {
                        tracing::debug!(
                            message_id = %id,
                            payload = %failure.payload,
                            "message lookup failed"
                        );
                        WallError::not_found(MessageId::ENTITY, id)
                    })
                },
            )
            .await
    }

    pub async fn page_count(&self) -> WallResult<CacheRead<u64>> {
        let service = self.service()?;
        self.cache
            .query(queries::page_count(), self.policies.page_count, move || async move {
                Ok::<_, WallError>(service.get_message_page_count().await?)
            })
            .await
    }

    /// Newest-first page `page`.
    pub async fn recent_page(&self, page: u64) -> WallResult<CacheRead<Vec<Message>>> {
        let service = self.service()?;
        self.cache
            .query(queries::recent_page(page), self.policies.pages, move || async move {
                Ok::<_, WallError>(service.get_recent_page(page).await?)
            })
            .await
    }

    /// Vote-ranked page `page`.
    pub async fn ranked_page(&self, page: u64) -> WallResult<CacheRead<Vec<Message>>> {
        let service = self.service()?;
        self.cache
            .query(queries::ranked_page(page), self.policies.pages, move || async move {
                Ok::<_, WallError>(service.get_ranked_page(page).await?)
            })
            .await
    }

    /// The page `pager` points at, in its feed's ordering.
    pub async fn current_page(&self, pager: &Pager) -> WallResult<CacheRead<Vec<Message>>> {
        match pager.feed() {
            Feed::Recent => self.recent_page(pager.page()).await,
            Feed::Ranked => self.ranked_page(pager.page()).await,
        }
    }

    /// What to display for a recent page right now, without fetching.
    ///
    /// While the page loads this is the last resolved recent page, flagged
    /// as a placeholder.
    pub fn recent_page_snapshot(&self, page: u64) -> Option<Snapshot<Vec<Message>>> {
        self.cache
            .snapshot(&queries::recent_page(page), self.policies.pages)
    }

    pub fn ranked_page_snapshot(&self, page: u64) -> Option<Snapshot<Vec<Message>>> {
        self.cache
            .snapshot(&queries::ranked_page(page), self.policies.pages)
    }

    /// Another student's profile. Not issued when `principal` is absent.
    pub async fn profile_by_id(
        &self,
        principal: Option<&Principal>,
    ) -> WallResult<Option<CacheRead<Profile>>> {
        let Some(principal) = principal else {
            return Ok(None);
        };
        let service = self.service()?;
        let owned = principal.clone();
        let read = self
            .cache
            .query(queries::user(principal), self.policies.profiles, move || async move {
                Ok::<_, WallError>(service.get_profile(&owned).await?)
            })
            .await?;
        Ok(Some(read))
    }

    pub async fn list_homework(&self) -> WallResult<CacheRead<Vec<HomeworkEntry>>> {
        let service = self.service()?;
        self.cache
            .query(queries::homework(), self.policies.homework, move || async move {
                Ok::<_, WallError>(service.list_homework().await?)
            })
            .await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn post_message(&self, content: Content) -> WallResult<MessageId> {
        let service = self.service()?;
        validate_content(&content)?;
        let id = service.post_message(content).await?;
        Mutation::PostMessage.apply(&self.cache);
        Ok(id)
    }

    pub async fn edit_message(&self, id: MessageId, content: Content) -> WallResult<()> {
        let service = self.service()?;
        validate_content(&content)?;
        service.edit_message(id, content).await?;
        Mutation::EditMessage.apply(&self.cache);
        Ok(())
    }

    /// Delete a message and return where the caller should navigate next.
    pub async fn delete_message(&self, id: MessageId) -> WallResult<Route> {
        let service = self.service()?;
        service.delete_message(id).await?;
        Mutation::DeleteMessage.apply(&self.cache);
        Ok(Route::Messages)
    }

    pub async fn upvote(&self, id: MessageId) -> WallResult<VoteOutcome> {
        self.cast_vote(id, Vote::Upvote).await
    }

    pub async fn downvote(&self, id: MessageId) -> WallResult<VoteOutcome> {
        self.cast_vote(id, Vote::Downvote).await
    }

    async fn cast_vote(&self, id: MessageId, vote: Vote) -> WallResult<VoteOutcome> {
        let service = self.service()?;
        let cached = self
            .cache
            .peek::<VoteMap>(&queries::votes())
            .and_then(|votes| votes.get(&id).copied());
        if cached == Some(vote) {
            tracing::debug!(message_id = %id, vote = vote.as_str(), "vote unchanged, skipping");
            return Ok(VoteOutcome::Unchanged);
        }

        let mutation = match vote {
            Vote::Upvote => {
                service.upvote(id).await?;
                Mutation::Upvote
            }
            Vote::Downvote => {
                service.downvote(id).await?;
                Mutation::Downvote
            }
        };
        mutation.apply(&self.cache);
        Ok(VoteOutcome::Recorded)
    }

    pub async fn add_homework(&self, homework: Homework) -> WallResult<HomeworkId> {
        let service = self.service()?;
        validate_homework(&homework)?;
        let id = service.add_homework(homework).await?;
        Mutation::AddHomework.apply(&self.cache);
        Ok(id)
    }

    pub async fn delete_homework(&self, id: HomeworkId) -> WallResult<()> {
        let service = self.service()?;
        service.delete_homework(id).await?;
        Mutation::DeleteHomework.apply(&self.cache);
        Ok(())
    }

    pub async fn toggle_homework_completed(&self, id: HomeworkId) -> WallResult<()> {
        let service = self.service()?;
        service.toggle_homework_completed(id).await?;
        Mutation::ToggleHomeworkCompleted.apply(&self.cache);
        Ok(())
    }

    /// Save the caller's profile.
    ///
    /// The session's cached copy is not updated here; follow up with
    /// [`SessionManager::refresh_profile`].
    pub async fn update_profile(&self, profile: Profile) -> WallResult<()> {
        let service = self.service()?;
        validate_profile(&profile)?;
        service.update_own_profile(profile).await?;
        Mutation::UpdateProfile.apply(&self.cache);
        Ok(())
    }
}
