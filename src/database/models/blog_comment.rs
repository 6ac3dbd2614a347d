use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::blog_post::BlogPost;
use crate::database::validation::{is_blank, Errors, BLANK, INVALID};
use crate::database::{ModelError, ModelResult};
use crate::schema::blog_comments;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = blog_comments)]
#[diesel(belongs_to(BlogPost))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BlogComment {
    pub id: i32,
    pub blog_post_id: i32,
    pub name: String,
    pub email: String,
    pub body: String,
    pub state: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Moderation outcome. Comments without a state are unmoderated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentState {
    Approved,
    Rejected,
}

impl CommentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentState::Approved => "approved",
            CommentState::Rejected => "rejected",
        }
    }
}

impl Display for CommentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(CommentState::Approved),
            "rejected" => Ok(CommentState::Rejected),
            _ => Err(()),
        }
    }
}

/// Comment as submitted by a reader
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBlogComment {
    pub name: String,
    pub email: String,
    #[serde(alias = "body")]
    pub message: String,
}

#[derive(Insertable)]
#[diesel(table_name = blog_comments)]
struct CommentInsert<'a> {
    pub blog_post_id: i32,
    pub name: &'a str,
    pub email: &'a str,
    pub body: &'a str,
    pub state: Option<&'static str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

fn email_format() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        RegexBuilder::new(r"^([^@\s]+)@((?:[-a-z0-9]+\.)+[a-z]{2,})$")
            .case_insensitive(true)
            .build()
            .expect("email pattern compiles")
    })
}

impl NewBlogComment {
    pub fn validate(&self) -> Errors {
        let mut errors = Errors::new();
        if is_blank(Some(&self.name)) {
            errors.add("name", BLANK);
        }
        if !email_format().is_match(self.email.trim()) {
            errors.add("email", INVALID);
        }
        if is_blank(Some(&self.message)) {
            errors.add("message", BLANK);
        }
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

impl BlogComment {
    /** Creates a comment on the post specified. With moderation switched off
    the comment is approved straight away. */
    pub fn create(
        conn: &mut SqliteConnection,
        post: &BlogPost,
        new: &NewBlogComment,
    ) -> ModelResult<BlogComment> {
        let errors = new.validate();
        if !errors.is_empty() {
            return Err(ModelError::Invalid(errors));
        }

        let state = if moderation::is_enabled(conn)? {
            None
        } else {
            Some(CommentState::Approved.as_str())
        };

        let now = super::now();
        let comment = diesel::insert_into(blog_comments::table)
            .values(CommentInsert {
                blog_post_id: post.id,
                name: new.name.trim(),
                email: new.email.trim(),
                body: new.message.trim(),
                state,
                created_at: now,
                updated_at: now,
            })
            .returning(BlogComment::as_returning())
            .get_result(conn)?;

        log::info!(
            "new comment {} on blog post {} ({})",
            comment.id,
            post.id,
            comment.state.as_deref().unwrap_or("unmoderated")
        );
        Ok(comment)
    }

    /// The comment text
    pub fn message(&self) -> &str {
        &self.body
    }

    pub fn state(&self) -> Option<CommentState> {
        self.state.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn is_approved(&self) -> bool {
        self.state() == Some(CommentState::Approved)
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == Some(CommentState::Rejected)
    }

    pub fn is_unmoderated(&self) -> bool {
        self.state.is_none()
    }

    pub fn approve(&mut self, conn: &mut SqliteConnection) -> QueryResult<()> {
        self.moderate(conn, CommentState::Approved)
    }

    pub fn reject(&mut self, conn: &mut SqliteConnection) -> QueryResult<()> {
        self.moderate(conn, CommentState::Rejected)
    }

    fn moderate(&mut self, conn: &mut SqliteConnection, state: CommentState) -> QueryResult<()> {
        *self = diesel::update(blog_comments::table.find(self.id))
            .set((
                blog_comments::state.eq(Some(state.as_str())),
                blog_comments::updated_at.eq(super::now()),
            ))
            .returning(BlogComment::as_returning())
            .get_result(conn)?;
        Ok(())
    }

    pub fn find_by_id(conn: &mut SqliteConnection, comment_id: i32) -> QueryResult<Option<BlogComment>> {
        blog_comments::table
            .find(comment_id)
            .select(BlogComment::as_select())
            .first(conn)
            .optional()
    }

    /** Returns the first comment posted on the given post, if any */
    pub fn find_by_blog_post_id(
        conn: &mut SqliteConnection,
        post_id: i32,
    ) -> QueryResult<Option<BlogComment>> {
        blog_comments::table
            .filter(blog_comments::blog_post_id.eq(post_id))
            .order(blog_comments::id.asc())
            .select(BlogComment::as_select())
            .first(conn)
            .optional()
    }

    pub fn approved(conn: &mut SqliteConnection) -> QueryResult<Vec<BlogComment>> {
        blog_comments::table
            .filter(blog_comments::state.eq(CommentState::Approved.as_str()))
            .order(blog_comments::created_at.desc())
            .select(BlogComment::as_select())
            .load(conn)
    }

    pub fn rejected(conn: &mut SqliteConnection) -> QueryResult<Vec<BlogComment>> {
        blog_comments::table
            .filter(blog_comments::state.eq(CommentState::Rejected.as_str()))
            .order(blog_comments::created_at.desc())
            .select(BlogComment::as_select())
            .load(conn)
    }

    pub fn unmoderated(conn: &mut SqliteConnection) -> QueryResult<Vec<BlogComment>> {
        blog_comments::table
            .filter(blog_comments::state.is_null())
            .order(blog_comments::created_at.desc())
            .select(BlogComment::as_select())
            .load(conn)
    }

    /** Deletes a comment from database */
    pub fn destroy(self, conn: &mut SqliteConnection) -> QueryResult<()> {
        diesel::delete(blog_comments::table.find(self.id)).execute(conn)?;
        Ok(())
    }
}

/// Whether new comments wait for approval before they are shown.
pub mod moderation {
    use diesel::sqlite::SqliteConnection;
    use serde_json::Value;

    use crate::database::models::refinery_setting::{RefinerySetting, SettingOptions};
    use crate::database::models::BLOG_SCOPING;
    use crate::database::ModelResult;

    pub const SETTING: &str = "comment_moderation";

    pub fn is_enabled(conn: &mut SqliteConnection) -> ModelResult<bool> {
        RefinerySetting::find_or_set_bool(conn, SETTING, true, SettingOptions::scoped(BLOG_SCOPING))
    }

    /// Flips the setting and returns the new value.
    pub fn toggle(conn: &mut SqliteConnection) -> ModelResult<bool> {
        let enabled = !is_enabled(conn)?;
        RefinerySetting::set(
            conn,
            SETTING,
            Value::Bool(enabled),
            SettingOptions::scoped(BLOG_SCOPING),
        )?;
        Ok(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::db_utils::test_connection;
    use crate::database::factories;

    fn submission() -> NewBlogComment {
        NewBlogComment {
            name: "Joe Commenter".into(),
            email: "joe@example.com".into(),
            message: "Which one is the best for picking up new shoes?".into(),
        }
    }

    #[test]
    fn test_requires_name_email_and_message() {
        assert!(submission().is_valid());

        let errors = NewBlogComment {
            name: " ".into(),
            email: "not-an-address".into(),
            message: "".into(),
        }
        .validate();

        assert_eq!(errors.on("name"), vec![BLANK]);
        assert_eq!(errors.on("email"), vec![INVALID]);
        assert_eq!(errors.on("message"), vec![BLANK]);
    }

    #[test]
    fn test_email_format() {
        for ok in ["a@b.co", "First.Last@Sub.Example.ORG"] {
            assert!(email_format().is_match(ok), "{ok}");
        }
        for bad in ["a@b", "a b@c.com", "@c.com", "a@c.c"] {
            assert!(!email_format().is_match(bad), "{bad}");
        }
    }

    #[test]
    fn test_moderated_comments_start_unmoderated() {
        let mut conn = test_connection();
        let post = factories::post(&mut conn);

        let mut comment = BlogComment::create(&mut conn, &post, &submission()).unwrap();
        assert!(comment.is_unmoderated());
        assert_eq!(BlogComment::unmoderated(&mut conn).unwrap(), vec![comment.clone()]);

        comment.approve(&mut conn).unwrap();
        assert!(comment.is_approved());
        assert_eq!(BlogComment::approved(&mut conn).unwrap(), vec![comment.clone()]);

        comment.reject(&mut conn).unwrap();
        assert!(comment.is_rejected());
        assert!(BlogComment::approved(&mut conn).unwrap().is_empty());
        assert_eq!(BlogComment::rejected(&mut conn).unwrap().len(), 1);
    }

    #[test]
    fn test_unmoderated_blog_approves_comments() {
        let mut conn = test_connection();
        let post = factories::post(&mut conn);

        assert!(!moderation::toggle(&mut conn).unwrap());
        let comment = BlogComment::create(&mut conn, &post, &submission()).unwrap();
        assert!(comment.is_approved());

        assert!(moderation::toggle(&mut conn).unwrap());
        assert!(moderation::is_enabled(&mut conn).unwrap());
    }

    #[test]
    fn test_invalid_comment_is_not_saved() {
        let mut conn = test_connection();
        let post = factories::post(&mut conn);

        let err = BlogComment::create(&mut conn, &post, &NewBlogComment::default()).unwrap_err();
        assert!(err.errors().is_some());
        assert_eq!(BlogComment::find_by_blog_post_id(&mut conn, post.id).unwrap(), None);
    }

    #[test]
    fn test_destroy_comment() {
        let mut conn = test_connection();
        let post = factories::post(&mut conn);
        let kept = factories::blog_comment(&mut conn, &post);
        let comment = factories::blog_comment(&mut conn, &post);
        let comment_id = comment.id;

        assert_eq!(
            BlogComment::find_by_id(&mut conn, comment_id).unwrap(),
            Some(comment.clone())
        );
        comment.destroy(&mut conn).unwrap();

        assert_eq!(BlogComment::find_by_id(&mut conn, comment_id).unwrap(), None);
        assert_eq!(post.comments(&mut conn).unwrap(), vec![kept]);
    }

    #[test]
    fn test_message_alias() {
        let new: NewBlogComment =
            serde_json::from_str(r#"{"name":"Joe","email":"joe@example.com","body":"hi"}"#).unwrap();
        assert_eq!(new.message, "hi");
    }
}
