//! Page navigation over a message feed.

/// Which ordering a feed uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feed {
    #[default]
    Recent,
    Ranked,
}

/// Current page of a feed, clamped to `1..=page_count`.
///
/// An empty feed still has one (empty) page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    feed: Feed,
    page: u64,
    page_count: u64,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(Feed::Recent)
    }
}

impl Pager {
    pub fn new(feed: Feed) -> Self {
        Self {
            feed,
            page: 1,
            page_count: 1,
        }
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// Switch ordering and go back to the first page.
    pub fn switch_feed(&mut self, feed: Feed) {
        if self.feed != feed {
            self.feed = feed;
            self.page = 1;
        }
    }

    /// Apply a fresh page count from the service.
    pub fn set_page_count(&mut self, page_count: u64) {
        self.page_count = page_count.max(1);
        self.page = self.page.min(self.page_count);
    }

    pub fn go_to(&mut self, page: u64) {
        self.page = page.clamp(1, self.page_count);
    }

    pub fn next(&mut self) {
        self.go_to(self.page.saturating_add(1));
    }

    pub fn previous(&mut self) {
        self.go_to(self.page.saturating_sub(1));
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}
