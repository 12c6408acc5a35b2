//! Student Wall Core - Entity Types
//!
//! Data structures, identifiers, form validation and the error taxonomy
//! shared by every other crate in the workspace.

pub mod entities;
pub mod error;
pub mod identity;
pub mod validation;

pub use entities::{
    Content, Homework, HomeworkEntry, Message, Profile, Vote, MESSAGES_PER_PAGE,
};
pub use error::{
    CacheError, IdentityError, RemoteFailure, RemoteResult, ValidationError, WallError,
    WallResult,
};
pub use identity::{
    HomeworkId, MessageId, NumericId, Principal, Timestamp, ANONYMOUS_PRINCIPAL_TEXT,
};
pub use validation::{
    validate_content, validate_homework, validate_profile, MIN_HOMEWORK_DESCRIPTION_CHARS,
    MIN_MESSAGE_CHARS,
};
