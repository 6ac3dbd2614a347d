use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use super::blog_post::BlogPost;
use crate::database::validation::{is_blank, Errors, BLANK, TAKEN};
use crate::database::{ModelError, ModelResult};
use crate::schema::{blog_categories, blog_categories_blog_posts, blog_posts};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = blog_categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BlogCategory {
    pub id: i32,
    pub title: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBlogCategory {
    pub title: String,
}

#[derive(Insertable)]
#[diesel(table_name = blog_categories)]
struct BlogCategoryInsert<'a> {
    pub title: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Row of the post <-> category join table
#[derive(Insertable)]
#[diesel(table_name = blog_categories_blog_posts)]
pub(crate) struct CategorizationInsert {
    pub blog_category_id: i32,
    pub blog_post_id: i32,
}

impl NewBlogCategory {
    pub fn validate(&self, conn: &mut SqliteConnection) -> QueryResult<Errors> {
        let mut errors = Errors::new();
        if is_blank(Some(&self.title)) {
            errors.add("title", BLANK);
        } else {
            let taken: i64 = blog_categories::table
                .filter(blog_categories::title.eq(self.title.trim()))
                .count()
                .get_result(conn)?;
            if taken > 0 {
                errors.add("title", TAKEN);
            }
        }

        Ok(errors)
    }
}

impl BlogCategory {
    pub fn create(conn: &mut SqliteConnection, new: &NewBlogCategory) -> ModelResult<BlogCategory> {
        let errors = new.validate(conn)?;
        if !errors.is_empty() {
            return Err(ModelError::Invalid(errors));
        }

        let now = super::now();
        let category = diesel::insert_into(blog_categories::table)
            .values(BlogCategoryInsert {
                title: new.title.trim(),
                created_at: now,
                updated_at: now,
            })
            .returning(BlogCategory::as_returning())
            .get_result(conn)?;

        log::debug!("created blog category {} ({})", category.id, category.title);
        Ok(category)
    }

    pub fn find(conn: &mut SqliteConnection, category_id: i32) -> QueryResult<BlogCategory> {
        blog_categories::table
            .find(category_id)
            .select(BlogCategory::as_select())
            .first(conn)
    }

    pub fn all(conn: &mut SqliteConnection) -> QueryResult<Vec<BlogCategory>> {
        blog_categories::table
            .order(blog_categories::title.asc())
            .select(BlogCategory::as_select())
            .load(conn)
    }

    /// Every post filed under this category, newest first.
    pub fn posts(&self, conn: &mut SqliteConnection) -> QueryResult<Vec<BlogPost>> {
        blog_categories_blog_posts::table
            .inner_join(blog_posts::table)
            .filter(blog_categories_blog_posts::blog_category_id.eq(self.id))
            .order((blog_posts::published_at.desc(), blog_posts::id.desc()))
            .select(BlogPost::as_select())
            .load(conn)
    }

    /// Live posts filed under this category as of `now`.
    pub fn live_posts_at(&self, conn: &mut SqliteConnection, now: NaiveDateTime) -> QueryResult<Vec<BlogPost>> {
        Ok(self
            .posts(conn)?
            .into_iter()
            .filter(|post| post.is_live_at(now))
            .collect())
    }

    /// Number of live posts in this category.
    pub fn post_count(&self, conn: &mut SqliteConnection) -> QueryResult<i64> {
        self.post_count_at(conn, super::now())
    }

    pub fn post_count_at(&self, conn: &mut SqliteConnection, now: NaiveDateTime) -> QueryResult<i64> {
        blog_categories_blog_posts::table
            .inner_join(blog_posts::table)
            .filter(blog_categories_blog_posts::blog_category_id.eq(self.id))
            .filter(blog_posts::draft.eq(false))
            .filter(blog_posts::published_at.le(now))
            .count()
            .get_result(conn)
    }

    /** Deletes the category and its post links. The posts stay. */
    pub fn destroy(self, conn: &mut SqliteConnection) -> ModelResult<()> {
        conn.transaction(|conn| {
            diesel::delete(
                blog_categories_blog_posts::table
                    .filter(blog_categories_blog_posts::blog_category_id.eq(self.id)),
            )
            .execute(conn)?;
            diesel::delete(blog_categories::table.find(self.id)).execute(conn)?;

            log::info!("destroyed blog category {}", self.id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::db_utils::test_connection;
    use crate::database::factories;
    use crate::database::models::now;
    use chrono::Duration;

    #[test]
    fn test_title_is_required_and_unique() {
        let mut conn = test_connection();
        let existing = factories::blog_category(&mut conn);

        let blank = NewBlogCategory { title: "".into() };
        assert_eq!(blank.validate(&mut conn).unwrap().on("title"), vec![BLANK]);

        let duplicate = NewBlogCategory {
            title: existing.title.clone(),
        };
        let err = BlogCategory::create(&mut conn, &duplicate).unwrap_err();
        assert_eq!(err.errors().unwrap().on("title"), vec![TAKEN]);
    }

    #[test]
    fn test_post_count_only_counts_live_posts() {
        let mut conn = test_connection();
        let category = factories::blog_category(&mut conn);
        let tomorrow = now() + Duration::days(1);

        for post in [
            factories::post(&mut conn),
            factories::post_with(&mut conn, |p| p.draft = true),
            factories::post_with(&mut conn, |p| p.published_at = Some(tomorrow)),
        ] {
            post.add_category(&mut conn, &category).unwrap();
        }
        let now = now();

        assert_eq!(category.posts(&mut conn).unwrap().len(), 3);
        assert_eq!(category.post_count_at(&mut conn, now).unwrap(), 1);
        assert_eq!(category.live_posts_at(&mut conn, now).unwrap().len(), 1);
    }

    #[test]
    fn test_destroy_keeps_posts() {
        let mut conn = test_connection();
        let category = factories::blog_category(&mut conn);
        let post = factories::post(&mut conn);
        post.add_category(&mut conn, &category).unwrap();

        category.destroy(&mut conn).unwrap();

        assert!(post.categories(&mut conn).unwrap().is_empty());
        assert_eq!(BlogPost::find(&mut conn, post.id).unwrap(), post);
        assert!(BlogCategory::all(&mut conn).unwrap().is_empty());
    }
}
