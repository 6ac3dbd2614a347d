use std::collections::BTreeMap;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};
use diesel::dsl::Desc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::blog_category::{BlogCategory, CategorizationInsert};
use super::blog_comment::BlogComment;
use super::refinery_setting::{RefinerySetting, SettingOptions};
use super::tag::{Tag, TagList};
use super::user::User;
use super::BLOG_SCOPING;
use crate::database::validation::{is_blank, Errors, BLANK, TAKEN};
use crate::database::{ModelError, ModelResult};
use crate::schema::{blog_categories, blog_categories_blog_posts, blog_comments, blog_posts};

/// Taggable type under which post tags are stored
pub const TAGGABLE_TYPE: &str = "BlogPost";

/// Placeholder share-this key; sharing stays off until it is replaced.
pub const SHARE_THIS_DEFAULT_KEY: &str = "REPLACE THIS WITH YOUR OWN KEY";

#[derive(
    Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize,
)]
#[diesel(table_name = blog_posts)]
#[diesel(belongs_to(User))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BlogPost {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub draft: bool,
    pub published_at: NaiveDateTime,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A category id as it arrives from a form or JSON body: a number, a
/// possibly blank string, or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CategoryIdParam {
    Id(i32),
    Text(String),
    Blank,
}

impl CategoryIdParam {
    /// The id, or `None` for blank or non-numeric input
    pub fn id(&self) -> Option<i32> {
        match self {
            CategoryIdParam::Id(id) => Some(*id),
            CategoryIdParam::Text(text) => text.trim().parse().ok(),
            CategoryIdParam::Blank => None,
        }
    }
}

impl From<i32> for CategoryIdParam {
    fn from(id: i32) -> Self {
        CategoryIdParam::Id(id)
    }
}

impl From<&str> for CategoryIdParam {
    fn from(text: &str) -> Self {
        CategoryIdParam::Text(text.to_string())
    }
}

/// Attributes for a post that has not been saved yet
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBlogPost {
    #[serde(default)]
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    /// Defaults to the moment the post is saved
    pub published_at: Option<NaiveDateTime>,
    pub user_id: Option<i32>,
    #[serde(default)]
    pub tag_list: TagList,
    #[serde(default)]
    pub category_ids: Vec<CategoryIdParam>,
}

/// Partial update of a saved post; `None` leaves the attribute untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogPostChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub draft: Option<bool>,
    pub published_at: Option<NaiveDateTime>,
    pub tag_list: Option<TagList>,
    pub category_ids: Option<Vec<CategoryIdParam>>,
}

#[derive(Insertable)]
#[diesel(table_name = blog_posts)]
struct BlogPostInsert<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub draft: bool,
    pub published_at: NaiveDateTime,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One month of the archive and how many live posts it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveMonth {
    pub year: i32,
    pub month: u32,
    pub count: usize,
}

fn newest_first() -> (Desc<blog_posts::published_at>, Desc<blog_posts::id>) {
    (blog_posts::published_at.desc(), blog_posts::id.desc())
}

/// First instant of the month containing `date`, and of the month after.
pub fn month_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let first = date - Days::new(u64::from(date.day0()));
    let next = first.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX);
    (first.and_time(NaiveTime::MIN), next.and_time(NaiveTime::MIN))
}

/// Parses an archive date written as `MM/YYYY`, e.g. `03/2011`.
pub fn parse_archive_date(input: &str) -> Option<NaiveDate> {
    let (month, year) = input.trim().split_once('/')?;
    NaiveDate::from_ymd_opt(year.trim().parse().ok()?, month.trim().parse().ok()?, 1)
}

fn validate_post(
    conn: &mut SqliteConnection,
    title: &str,
    body: Option<&str>,
    except_id: Option<i32>,
) -> QueryResult<Errors> {
    let mut errors = Errors::new();
    let title = title.trim();

    if is_blank(Some(title)) {
        errors.add("title", BLANK);
    } else {
        let mut query = blog_posts::table
            .filter(blog_posts::title.eq(title))
            .into_boxed();
        if let Some(id) = except_id {
            query = query.filter(blog_posts::id.ne(id));
        }
        let taken: i64 = query.count().get_result(conn)?;
        if taken > 0 {
            errors.add("title", TAKEN);
        }
    }

    if is_blank(body) {
        errors.add("body", BLANK);
    }

    Ok(errors)
}

impl NewBlogPost {
    /// Runs the validations without saving anything.
    pub fn validate(&self, conn: &mut SqliteConnection) -> QueryResult<Errors> {
        validate_post(conn, &self.title, self.body.as_deref(), None)
    }

    pub fn is_valid(&self, conn: &mut SqliteConnection) -> QueryResult<bool> {
        Ok(self.validate(conn)?.is_empty())
    }
}

impl BlogPost {
    /// Validates and saves a new post together with its tags and categories.
    ///
    /// # Example
    /// ```no_run
    /// # use diesel::prelude::*;
    /// # use refinery_blog::database::models::blog_post::{BlogPost, NewBlogPost};
    /// # let mut conn = SqliteConnection::establish(":memory:").unwrap();
    /// let post = BlogPost::create(
    ///     &mut conn,
    ///     &NewBlogPost {
    ///         title: "Top 10 Shopping Centers in Chicago".into(),
    ///         body: Some("These are the top ten shopping centers in Chicago.".into()),
    ///         ..Default::default()
    ///     },
    /// )
    /// .unwrap();
    /// ```
    pub fn create(conn: &mut SqliteConnection, new: &NewBlogPost) -> ModelResult<BlogPost> {
        conn.transaction(|conn| {
            let errors = new.validate(conn)?;
            if !errors.is_empty() {
                return Err(ModelError::Invalid(errors));
            }

            let now = super::now();
            let post = diesel::insert_into(blog_posts::table)
                .values(BlogPostInsert {
                    title: new.title.trim(),
                    body: new.body.as_deref().unwrap_or_default(),
                    draft: new.draft,
                    published_at: new.published_at.unwrap_or(now),
                    user_id: new.user_id,
                    created_at: now,
                    updated_at: now,
                })
                .returning(BlogPost::as_returning())
                .get_result(conn)?;

            if !new.tag_list.is_empty() {
                post.set_tag_list(conn, &new.tag_list)?;
            }
            if !new.category_ids.is_empty() {
                post.set_category_ids(conn, &new.category_ids)?;
            }

            log::debug!("created blog post {} ({})", post.id, post.title);
            Ok(post)
        })
    }

    /// Applies `changes` if the result is still valid.
    pub fn update(&mut self, conn: &mut SqliteConnection, changes: &BlogPostChanges) -> ModelResult<()> {
        let title = changes.title.as_deref().unwrap_or(&self.title);
        let body = changes.body.as_deref().unwrap_or(&self.body);

        let updated = conn.transaction(|conn| {
            let errors = validate_post(conn, title, Some(body), Some(self.id))?;
            if !errors.is_empty() {
                return Err(ModelError::Invalid(errors));
            }

            let updated: BlogPost = diesel::update(blog_posts::table.find(self.id))
                .set((
                    blog_posts::title.eq(title.trim()),
                    blog_posts::body.eq(body),
                    blog_posts::draft.eq(changes.draft.unwrap_or(self.draft)),
                    blog_posts::published_at.eq(changes.published_at.unwrap_or(self.published_at)),
                    blog_posts::updated_at.eq(super::now()),
                ))
                .returning(BlogPost::as_returning())
                .get_result(conn)?;

            if let Some(tag_list) = &changes.tag_list {
                updated.set_tag_list(conn, tag_list)?;
            }
            if let Some(ids) = &changes.category_ids {
                updated.set_category_ids(conn, ids)?;
            }

            Ok(updated)
        })?;

        *self = updated;
        Ok(())
    }

    /** Deletes the post along with its comments, category links and taggings */
    pub fn destroy(self, conn: &mut SqliteConnection) -> ModelResult<()> {
        conn.transaction(|conn| {
            let comments = diesel::delete(BlogComment::belonging_to(&self)).execute(conn)?;
            diesel::delete(
                blog_categories_blog_posts::table
                    .filter(blog_categories_blog_posts::blog_post_id.eq(self.id)),
            )
            .execute(conn)?;
            Tag::untag_all(conn, TAGGABLE_TYPE, self.id)?;
            diesel::delete(blog_posts::table.find(self.id)).execute(conn)?;

            log::info!("destroyed blog post {} and {} comment(s)", self.id, comments);
            Ok(())
        })
    }

    pub fn find(conn: &mut SqliteConnection, post_id: i32) -> QueryResult<BlogPost> {
        blog_posts::table
            .find(post_id)
            .select(BlogPost::as_select())
            .first(conn)
    }

    /// The post with `post_id` if it is live at `now`, otherwise `NotFound`.
    pub fn find_live_at(
        conn: &mut SqliteConnection,
        post_id: i32,
        now: NaiveDateTime,
    ) -> QueryResult<BlogPost> {
        blog_posts::table
            .find(post_id)
            .filter(blog_posts::draft.eq(false))
            .filter(blog_posts::published_at.le(now))
            .select(BlogPost::as_select())
            .first(conn)
    }

    pub fn all(conn: &mut SqliteConnection) -> QueryResult<Vec<BlogPost>> {
        blog_posts::table
            .order(newest_first())
            .select(BlogPost::as_select())
            .load(conn)
    }

    /// Most recently published post
    pub fn first(conn: &mut SqliteConnection) -> QueryResult<Option<BlogPost>> {
        blog_posts::table
            .order(newest_first())
            .select(BlogPost::as_select())
            .first(conn)
            .optional()
    }

    /// Least recently published post
    pub fn last(conn: &mut SqliteConnection) -> QueryResult<Option<BlogPost>> {
        blog_posts::table
            .order((blog_posts::published_at.asc(), blog_posts::id.asc()))
            .select(BlogPost::as_select())
            .first(conn)
            .optional()
    }

    /// Posts published during the calendar month of `date`, newest first.
    pub fn by_archive(conn: &mut SqliteConnection, date: NaiveDate) -> QueryResult<Vec<BlogPost>> {
        let (start, end) = month_bounds(date);
        blog_posts::table
            .filter(blog_posts::published_at.ge(start))
            .filter(blog_posts::published_at.lt(end))
            .order(newest_first())
            .select(BlogPost::as_select())
            .load(conn)
    }

    /// Posts published during `year`, newest first.
    pub fn by_year(conn: &mut SqliteConnection, year: i32) -> QueryResult<Vec<BlogPost>> {
        let bounds = NaiveDate::from_ymd_opt(year, 1, 1).zip(NaiveDate::from_ymd_opt(year + 1, 1, 1));
        let Some((start, end)) = bounds else {
            return Ok(Vec::new());
        };

        blog_posts::table
            .filter(blog_posts::published_at.ge(start.and_time(NaiveTime::MIN)))
            .filter(blog_posts::published_at.lt(end.and_time(NaiveTime::MIN)))
            .order(newest_first())
            .select(BlogPost::as_select())
            .load(conn)
    }

    pub fn live(conn: &mut SqliteConnection) -> QueryResult<Vec<BlogPost>> {
        BlogPost::live_at(conn, super::now())
    }

    /// Posts that are not drafts and were published no later than `now`.
    pub fn live_at(conn: &mut SqliteConnection, now: NaiveDateTime) -> QueryResult<Vec<BlogPost>> {
        blog_posts::table
            .filter(blog_posts::draft.eq(false))
            .filter(blog_posts::published_at.le(now))
            .order(newest_first())
            .select(BlogPost::as_select())
            .load(conn)
    }

    pub fn all_previous(conn: &mut SqliteConnection) -> QueryResult<Vec<BlogPost>> {
        BlogPost::all_previous_at(conn, super::now())
    }

    /// Live posts published before the month `now` falls in.
    pub fn all_previous_at(conn: &mut SqliteConnection, now: NaiveDateTime) -> QueryResult<Vec<BlogPost>> {
        let (month_start, _) = month_bounds(now.date());
        blog_posts::table
            .filter(blog_posts::draft.eq(false))
            .filter(blog_posts::published_at.le(now))
            .filter(blog_posts::published_at.lt(month_start))
            .order(newest_first())
            .select(BlogPost::as_select())
            .load(conn)
    }

    /// Posts without any category.
    pub fn uncategorized(conn: &mut SqliteConnection) -> QueryResult<Vec<BlogPost>> {
        blog_posts::table
            .left_join(blog_categories_blog_posts::table)
            .filter(blog_categories_blog_posts::id.is_null())
            .order(newest_first())
            .select(BlogPost::as_select())
            .load(conn)
    }

    pub fn tagged_with(conn: &mut SqliteConnection, tag_name: &str) -> QueryResult<Vec<BlogPost>> {
        let ids = Tag::tagged_ids(conn, TAGGABLE_TYPE, tag_name)?;
        blog_posts::table
            .filter(blog_posts::id.eq_any(ids))
            .order(newest_first())
            .select(BlogPost::as_select())
            .load(conn)
    }

    pub fn archive_months(conn: &mut SqliteConnection) -> QueryResult<Vec<ArchiveMonth>> {
        BlogPost::archive_months_at(conn, super::now())
    }

    /// Months holding live posts with their post counts, newest month first.
    pub fn archive_months_at(
        conn: &mut SqliteConnection,
        now: NaiveDateTime,
    ) -> QueryResult<Vec<ArchiveMonth>> {
        let dates: Vec<NaiveDateTime> = blog_posts::table
            .filter(blog_posts::draft.eq(false))
            .filter(blog_posts::published_at.le(now))
            .select(blog_posts::published_at)
            .load(conn)?;

        let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
        for date in dates {
            *months.entry((date.year(), date.month())).or_default() += 1;
        }

        Ok(months
            .into_iter()
            .rev()
            .map(|((year, month), count)| ArchiveMonth { year, month, count })
            .collect())
    }

    /// Whether comments may be posted on the blog. The setting is created
    /// (enabled) the first time it is asked for.
    pub fn comments_allowed(conn: &mut SqliteConnection) -> ModelResult<bool> {
        RefinerySetting::find_or_set_bool(
            conn,
            "comments_allowed",
            true,
            SettingOptions::scoped(BLOG_SCOPING),
        )
    }

    pub fn share_this_key(conn: &mut SqliteConnection) -> ModelResult<String> {
        let key = RefinerySetting::find_or_set(
            conn,
            "share_this_key",
            Value::String(SHARE_THIS_DEFAULT_KEY.to_string()),
            SettingOptions::scoped(BLOG_SCOPING),
        )?;

        Ok(match key {
            Value::String(key) => key,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// Sharing is on once a real key has been configured.
    pub fn share_this_enabled(conn: &mut SqliteConnection) -> ModelResult<bool> {
        let key = BlogPost::share_this_key(conn)?;
        Ok(!key.trim().is_empty() && key != SHARE_THIS_DEFAULT_KEY)
    }

    pub fn is_live(&self) -> bool {
        self.is_live_at(super::now())
    }

    pub fn is_live_at(&self, now: NaiveDateTime) -> bool {
        !self.draft && self.published_at <= now
    }

    /// The next non-draft post by publish time. Equal publish times are
    /// ordered by id, as in the listings.
    pub fn next(&self, conn: &mut SqliteConnection) -> QueryResult<Option<BlogPost>> {
        blog_posts::table
            .filter(
                blog_posts::published_at.gt(self.published_at).or(blog_posts::published_at
                    .eq(self.published_at)
                    .and(blog_posts::id.gt(self.id))),
            )
            .filter(blog_posts::draft.eq(false))
            .order((blog_posts::published_at.asc(), blog_posts::id.asc()))
            .select(BlogPost::as_select())
            .first(conn)
            .optional()
    }

    /// The previous non-draft post by publish time.
    pub fn prev(&self, conn: &mut SqliteConnection) -> QueryResult<Option<BlogPost>> {
        blog_posts::table
            .filter(
                blog_posts::published_at.lt(self.published_at).or(blog_posts::published_at
                    .eq(self.published_at)
                    .and(blog_posts::id.lt(self.id))),
            )
            .filter(blog_posts::draft.eq(false))
            .order(newest_first())
            .select(BlogPost::as_select())
            .first(conn)
            .optional()
    }

    /// Comments on this post, oldest first.
    pub fn comments(&self, conn: &mut SqliteConnection) -> QueryResult<Vec<BlogComment>> {
        BlogComment::belonging_to(self)
            .order((blog_comments::created_at.asc(), blog_comments::id.asc()))
            .select(BlogComment::as_select())
            .load(conn)
    }

    pub fn approved_comments(&self, conn: &mut SqliteConnection) -> QueryResult<Vec<BlogComment>> {
        Ok(self
            .comments(conn)?
            .into_iter()
            .filter(BlogComment::is_approved)
            .collect())
    }

    pub fn author(&self, conn: &mut SqliteConnection) -> QueryResult<Option<User>> {
        match self.user_id {
            Some(user_id) => User::find_by_id(conn, user_id),
            None => Ok(None),
        }
    }

    /// Categories in the order they were assigned.
    pub fn categories(&self, conn: &mut SqliteConnection) -> QueryResult<Vec<BlogCategory>> {
        blog_categories_blog_posts::table
            .inner_join(blog_categories::table)
            .filter(blog_categories_blog_posts::blog_post_id.eq(self.id))
            .order(blog_categories_blog_posts::id.asc())
            .select(BlogCategory::as_select())
            .load(conn)
    }

    /// Files the post under `category` unless it already is.
    pub fn add_category(&self, conn: &mut SqliteConnection, category: &BlogCategory) -> QueryResult<()> {
        let linked: i64 = blog_categories_blog_posts::table
            .filter(blog_categories_blog_posts::blog_post_id.eq(self.id))
            .filter(blog_categories_blog_posts::blog_category_id.eq(category.id))
            .count()
            .get_result(conn)?;

        if linked == 0 {
            diesel::insert_into(blog_categories_blog_posts::table)
                .values(CategorizationInsert {
                    blog_category_id: category.id,
                    blog_post_id: self.id,
                })
                .execute(conn)?;
        }
        Ok(())
    }

    /// Replaces the post's categories with `categories`, keeping their order.
    pub fn set_categories(&self, conn: &mut SqliteConnection, categories: &[BlogCategory]) -> QueryResult<()> {
        conn.transaction(|conn| {
            diesel::delete(
                blog_categories_blog_posts::table
                    .filter(blog_categories_blog_posts::blog_post_id.eq(self.id)),
            )
            .execute(conn)?;

            for category in categories {
                self.add_category(conn, category)?;
            }
            Ok(())
        })
    }

    /// Replaces the post's categories from raw ids. Blank entries, non-numeric
    /// entries and ids without a category are skipped.
    pub fn set_category_ids(
        &self,
        conn: &mut SqliteConnection,
        ids: &[CategoryIdParam],
    ) -> QueryResult<Vec<BlogCategory>> {
        let mut categories = Vec::with_capacity(ids.len());
        for id in ids.iter().filter_map(CategoryIdParam::id) {
            match BlogCategory::find(conn, id).optional()? {
                Some(category) => categories.push(category),
                None => log::warn!("blog post {}: no category with id {}", self.id, id),
            }
        }

        self.set_categories(conn, &categories)?;
        Ok(categories)
    }

    pub fn tag_list(&self, conn: &mut SqliteConnection) -> QueryResult<TagList> {
        Tag::list_for(conn, TAGGABLE_TYPE, self.id)
    }

    pub fn set_tag_list(&self, conn: &mut SqliteConnection, list: &TagList) -> QueryResult<()> {
        Tag::replace_for(conn, TAGGABLE_TYPE, self.id, list)
    }

    /// Tags used on live posts with how many of them carry each.
    pub fn tag_counts(conn: &mut SqliteConnection) -> QueryResult<Vec<(Tag, i64)>> {
        BlogPost::tag_counts_at(conn, super::now())
    }

    /// Tags on posts live at `now`, with how many of those posts carry each.
    pub fn tag_counts_at(conn: &mut SqliteConnection, now: NaiveDateTime) -> QueryResult<Vec<(Tag, i64)>> {
        let live_ids: Vec<i32> = blog_posts::table
            .filter(blog_posts::draft.eq(false))
            .filter(blog_posts::published_at.le(now))
            .select(blog_posts::id)
            .load(conn)?;

        Tag::counts_for(conn, TAGGABLE_TYPE, &live_ids)
    }
}
