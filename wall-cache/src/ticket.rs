//! Fetch tickets ordering reads by initiation time.
//!
//! Every read takes a ticket when it is initiated and every invalidation
//! takes one when it happens. Comparing tickets decides whether a resolving
//! read may still write to the cache.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point in the cache's initiation order.
///
/// Tickets are strictly increasing across the whole cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }

    /// Whether this ticket was issued after `other`.
    pub fn is_newer_than(&self, other: &FetchTicket) -> bool {
        self.0 > other.0
    }
}

/// Monotonic ticket source.
#[derive(Debug, Default)]
pub struct TicketClock {
    next: AtomicU64,
}

impl TicketClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> FetchTicket {
        FetchTicket(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
