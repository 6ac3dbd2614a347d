use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use super::blog_post::BlogPost;
use crate::database::validation::{is_blank, Errors, BLANK, TAKEN};
use crate::database::{ModelError, ModelResult};
use crate::schema::{blog_posts, users};

/// Author of blog posts
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct UserInsert<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Pushes a new user in the database. Blank or taken usernames are
    /// rejected with [ModelError::Invalid].
    ///
    /// # Example
    /// ```no_run
    /// # use diesel::prelude::*;
    /// # use refinery_blog::database::models::user::User;
    /// # let mut conn = SqliteConnection::establish(":memory:").unwrap();
    /// let author = User::new(&mut conn, "joe", "joe@example.com").unwrap();
    /// ```
    pub fn new(conn: &mut SqliteConnection, uname: &str, email_in: &str) -> ModelResult<User> {
        let mut errors = Errors::new();
        if is_blank(Some(uname)) {
            errors.add("username", BLANK);
        } else if User::find_by_username(conn, uname)?.is_some() {
            errors.add("username", TAKEN);
        }
        if !errors.is_empty() {
            return Err(ModelError::Invalid(errors));
        }

        let to_insert = UserInsert {
            username: uname,
            email: email_in,
            created_at: super::now(),
        };

        let user = diesel::insert_into(users::table)
            .values(&to_insert)
            .returning(User::as_returning())
            .get_result(conn)?;

        Ok(user)
    }

    /** Returns an user with the id specified */
    pub fn find_by_id(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Option<User>> {
        users::table
            .find(user_id)
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    /// Returns the user with the given username, if any.
    pub fn find_by_username(conn: &mut SqliteConnection, uname: &str) -> QueryResult<Option<User>> {
        users::table
            .filter(users::username.eq(uname))
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    /** Posts authored by this user, newest first */
    pub fn posts(&self, conn: &mut SqliteConnection) -> QueryResult<Vec<BlogPost>> {
        BlogPost::belonging_to(self)
            .order((blog_posts::published_at.desc(), blog_posts::id.desc()))
            .select(BlogPost::as_select())
            .load(conn)
    }
}
