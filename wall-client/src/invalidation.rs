//! Which cached reads each successful write makes stale.

use wall_cache::{QueryCache, QueryKey};

use crate::queries;

/// A write the client can issue against the wall service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    PostMessage,
    EditMessage,
    DeleteMessage,
    Upvote,
    Downvote,
    AddHomework,
    DeleteHomework,
    ToggleHomeworkCompleted,
    /// The session refreshes the profile; nothing cached is touched.
    UpdateProfile,
}

impl Mutation {
    /// Key prefixes invalidated once this write succeeds.
    pub fn invalidates(&self) -> Vec<QueryKey> {
        match self {
            Mutation::PostMessage | Mutation::EditMessage => vec![queries::messages()],
            Mutation::DeleteMessage | Mutation::Upvote | Mutation::Downvote => {
                vec![queries::messages(), queries::votes()]
            }
            Mutation::AddHomework
            | Mutation::DeleteHomework
            | Mutation::ToggleHomeworkCompleted => vec![queries::homework()],
            Mutation::UpdateProfile => Vec::new(),
        }
    }

    /// Invalidate everything this write affects.
    pub fn apply(&self, cache: &QueryCache) {
        for prefix in self.invalidates() {
            cache.invalidate(&prefix);
        }
        tracing::debug!(mutation = ?self, "applied write invalidations");
    }
}
