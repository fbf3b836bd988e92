//! Page storage collaborators
//!
//! The migration never talks to a wiki directly. It reads, saves and moves
//! pages through [`PageStore`] and enumerates category members through
//! [`MembershipLister`]. Implementations report rate limiting either with
//! `ExErrorKind::RateLimited` or with a message the mutator recognises.

use crate::errors::Result;

/// Read/write access to page text
pub trait PageStore: Send + Sync {
    fn exists(&self, title: &str) -> Result<bool>;

    /// Current text of `title`; `NotFound` when the page is missing
    fn read(&self, title: &str) -> Result<String>;

    /// Rename `title` to `new_title`, optionally leaving a redirect behind
    fn move_page(&self, title: &str, new_title: &str, reason: &str, leave_redirect: bool)
        -> Result<()>;

    /// Replace the text of `title`
    fn save(&self, title: &str, text: &str, summary: &str, minor: bool) -> Result<()>;
}

/// One page of member titles plus the cursor for the next one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberBatch {
    pub titles: Vec<String>,
    pub next: Option<String>,
}

/// Paginated listing of the pages in a category
pub trait MembershipLister: Send + Sync {
    /// `cursor` is `None` for the first batch and `MemberBatch::next` afterwards
    fn list_members(&self, category: &str, cursor: Option<&str>) -> Result<MemberBatch>;
}
