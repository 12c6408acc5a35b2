//! Client routes.

use std::fmt;

use wall_core::MessageId;

/// A navigable location in the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    About,
    Profile,
    Messages,
    MessageDetail(MessageId),
    Homeworks,
}

impl Route {
    /// Where unmatched paths and denied navigation end up.
    pub const FALLBACK: Route = Route::Home;

    /// Match a path such as `/messages/42`.
    ///
    /// Trailing slashes are ignored. Returns `None` for unknown paths.
    pub fn parse(path: &str) -> Option<Route> {
        let trimmed = path.trim_end_matches('/');
        let mut segments = trimmed.split('/').skip(1);
        let route = match (segments.next(), segments.next()) {
            (Some("home"), None) => Route::Home,
            (Some("about"), None) => Route::About,
            (Some("profile"), None) => Route::Profile,
            (Some("messages"), None) => Route::Messages,
            (Some("messages"), Some(id)) => Route::MessageDetail(id.parse().ok()?),
            (Some("homeworks"), None) => Route::Homeworks,
            _ => return None,
        };
        if segments.next().is_some() || !trimmed.starts_with('/') {
            return None;
        }
        Some(route)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/home".to_string(),
            Route::About => "/about".to_string(),
            Route::Profile => "/profile".to_string(),
            Route::Messages => "/messages".to_string(),
            Route::MessageDetail(id) => format!("/messages/{}", id),
            Route::Homeworks => "/homeworks".to_string(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Home => "Home",
            Route::About => "About",
            Route::Profile => "Profile",
            Route::Messages => "Messages",
            Route::MessageDetail(_) => "Message",
            Route::Homeworks => "Homework diary",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
