pub mod blog_category;
pub mod blog_comment;
pub mod blog_post;
pub mod refinery_setting;
pub mod tag;
pub mod user;

use chrono::{NaiveDateTime, Utc};

/// Scoping under which the blog keeps its settings
pub const BLOG_SCOPING: &str = "blog";

/// Current wall-clock time as stored in the database (UTC, no offset).
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
