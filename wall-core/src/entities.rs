//! Entity snapshots owned by the remote wall service.
//!
//! The client treats every value here as immutable once fetched. Changes
//! only arrive through a re-fetch after a successful mutation.

use crate::identity::{HomeworkId, MessageId, Principal, Timestamp};
use serde::{Deserialize, Serialize};

/// A student's profile as registered with the wall service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub team: Option<String>,
    pub graduate: bool,
}

/// Payload of a wall message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    Text(String),
    Image(Vec<u8>),
    Video(Vec<u8>),
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Text body, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image(_) | Self::Video(_) => None,
        }
    }
}

/// A message as returned by the wall service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub creator: Principal,
    pub content: Content,
    /// Net vote count (upvotes minus downvotes).
    pub vote: i64,
}

/// A caller's recorded preference on a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    Upvote,
    Downvote,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Upvote => "upvote",
            Vote::Downvote => "downvote",
        }
    }
}

/// A homework diary item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Homework {
    pub title: String,
    pub description: String,
    pub due_date: Timestamp,
    pub completed: bool,
}

impl Homework {
    /// New, not yet completed homework due at `due_date`.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        due_date: Timestamp,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            due_date,
            completed: false,
        }
    }
}

/// Homework item paired with its backend identifier.
pub type HomeworkEntry = (HomeworkId, Homework);

/// Number of messages per page served by the backend.
pub const MESSAGES_PER_PAGE: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_content_as_text() {
        assert_eq!(Content::text("hello").as_text(), Some("hello"));
        assert_eq!(Content::Image(vec![1, 2]).as_text(), None);
    }

    #[test]
    fn test_new_homework_not_completed() {
        let homework = Homework::new("Maths", "Exercises 1 to 10", Utc::now());
        assert!(!homework.completed);
    }

    #[test]
    fn test_vote_labels() {
        assert_eq!(Vote::Upvote.as_str(), "upvote");
        assert_eq!(Vote::Downvote.as_str(), "downvote");
    }
}
