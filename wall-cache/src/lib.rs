//! Query cache for the Student's Wall client.
//!
//! Remote reads are memoized by [`QueryKey`] under a per-query
//! [`QueryPolicy`]. Mutations invalidate key prefixes rather than editing
//! entries, and concurrent reads of one key are ordered by the
//! [`FetchTicket`] each took when it was initiated.

pub mod freshness;
pub mod key;
pub mod stats;
pub mod store;
pub mod ticket;

pub use freshness::{CacheRead, QueryPolicy, Snapshot};
pub use key::{KeySegment, QueryKey};
pub use stats::CacheStats;
pub use store::QueryCache;
pub use ticket::{FetchTicket, TicketClock};
