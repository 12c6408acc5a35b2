//! Cache keys and staleness policies for every read the client issues.

use std::time::Duration;

use wall_cache::{QueryKey, QueryPolicy};
use wall_core::{MessageId, NumericId, Principal};

use crate::config::{CacheConfig, PolicyOverride};

pub const VOTES: &str = "votes";
pub const MESSAGES: &str = "messages";
pub const USERS: &str = "users";
pub const HOMEWORK: &str = "homework";

pub fn votes() -> QueryKey {
    QueryKey::new(VOTES)
}

/// Prefix covering every message read.
pub fn messages() -> QueryKey {
    QueryKey::new(MESSAGES)
}

pub fn message_detail(id: MessageId) -> QueryKey {
    messages().with("detail").with(id.value())
}

pub fn page_count() -> QueryKey {
    messages().with("count")
}

pub fn recent_page(page: u64) -> QueryKey {
    messages().with("recent").with(page)
}

pub fn ranked_page(page: u64) -> QueryKey {
    messages().with("ranked").with(page)
}

pub fn user(principal: &Principal) -> QueryKey {
    QueryKey::new(USERS).with(principal.as_str())
}

pub fn homework() -> QueryKey {
    QueryKey::new(HOMEWORK)
}

/// Groups of reads sharing one caching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryFamily {
    Votes,
    MessageDetail,
    PageCount,
    Pages,
    Profiles,
    Homework,
}

impl QueryFamily {
    pub fn default_policy(&self) -> QueryPolicy {
        const MINUTE: u64 = 60;
        match self {
            QueryFamily::Votes | QueryFamily::Homework => QueryPolicy::new(
                Duration::from_secs(10 * MINUTE),
                Duration::from_secs(15 * MINUTE),
            ),
            QueryFamily::MessageDetail => QueryPolicy::default(),
            QueryFamily::PageCount | QueryFamily::Profiles => {
                QueryPolicy::new(Duration::from_secs(MINUTE), Duration::from_secs(90))
            }
            QueryFamily::Pages => {
                QueryPolicy::new(Duration::from_secs(MINUTE), Duration::from_secs(90))
                    .with_keep_previous_data(true)
            }
        }
    }
}

/// Resolved policy for each query family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPolicies {
    pub votes: QueryPolicy,
    pub message_detail: QueryPolicy,
    pub page_count: QueryPolicy,
    pub pages: QueryPolicy,
    pub profiles: QueryPolicy,
    pub homework: QueryPolicy,
}

impl Default for QueryPolicies {
    fn default() -> Self {
        Self {
            votes: QueryFamily::Votes.default_policy(),
            message_detail: QueryFamily::MessageDetail.default_policy(),
            page_count: QueryFamily::PageCount.default_policy(),
            pages: QueryFamily::Pages.default_policy(),
            profiles: QueryFamily::Profiles.default_policy(),
            homework: QueryFamily::Homework.default_policy(),
        }
    }
}

impl QueryPolicies {
    /// Defaults with configured overrides applied.
    pub fn from_config(config: &CacheConfig) -> Self {
        let defaults = Self::default();
        Self {
            votes: apply(defaults.votes, config.votes.as_ref()),
            message_detail: apply(defaults.message_detail, config.message_detail.as_ref()),
            page_count: apply(defaults.page_count, config.page_count.as_ref()),
            pages: apply(defaults.pages, config.pages.as_ref()),
            profiles: apply(defaults.profiles, config.profiles.as_ref()),
            homework: apply(defaults.homework, config.homework.as_ref()),
        }
    }
}

fn apply(mut policy: QueryPolicy, found: Option<&PolicyOverride>) -> QueryPolicy {
    if let Some(found) = found {
        if let Some(stale_ms) = found.stale_ms {
            policy.stale_time = Duration::from_millis(stale_ms);
        }
        if let Some(gc_ms) = found.gc_ms {
            policy.gc_time = Duration::from_millis(gc_ms);
        }
    }
    policy
}
