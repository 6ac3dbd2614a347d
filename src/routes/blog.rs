use actix_web::{get, web::Data, HttpRequest, HttpResponse};
use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    app::{AppError, AppState},
    database::models::{
        blog_category::BlogCategory,
        blog_post::{ArchiveMonth, BlogPost},
        now,
        tag::TagList,
    },
    routes::comment::CommentView,
};

/// Everything the post page shows
#[derive(Debug, Serialize)]
pub struct PostDetails {
    pub post: BlogPost,
    pub tags: TagList,
    pub categories: Vec<BlogCategory>,
    pub comments: Vec<CommentView>,
    pub next_id: Option<i32>,
    pub prev_id: Option<i32>,
    pub comments_allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

/// Pipe for listing the live posts, newest first
/// - url: `{domain}/blog`
///
/// # Example
/// ```text
/// let request = actix_web::test::TestRequest::get()
///     .uri("localhost/blog")
///     .to_request();
/// ```
///
/// # Response
/// ## Ok
/// - json array of [posts](BlogPost)
/// ```json
/// [
///     {
///         "id": 1,
///         "title": "Top 1 Shopping Centers in Chicago",
///         "body": "These are the top ten shopping centers in Chicago.",
///         "draft": false,
///         "published_at": "2011-03-11T00:00:00",
///         "user_id": null,
///         "created_at": "2011-03-11T00:00:00",
///         "updated_at": "2011-03-11T00:00:00"
///     }
/// ]
/// ```
/// ## Error
/// - Internal server error
#[get("/blog")]
pub async fn list_posts(app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let posts = app_state.run(|conn| Ok(BlogPost::live(conn)?)).await?;

    Ok(HttpResponse::Ok().json(posts))
}

/// Pipe for reading one live post
/// - url: `{domain}/blog/posts/{post_id}`
///
/// # HTTP request requirements
/// - `{post_id}` as url parameter
///
/// # Response
/// ## Ok
/// - json formatted [details](PostDetails): the post, its tags, categories,
///   approved comments, the ids of its live neighbours and whether comments
///   are open
/// ## Error
/// - Bad request (non-numeric id)
/// - Not found (missing, draft or not yet published)
/// - Internal server error
#[get("/blog/posts/{post_id}")]
pub async fn show_post(req: HttpRequest, app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let post_id = req.match_info().query("post_id").parse::<i32>()?;

    let details = app_state
        .run(move |conn| {
            let now = now();
            let post = BlogPost::find_live_at(conn, post_id, now)?;
            let live_id = |neighbour: Option<BlogPost>| {
                neighbour.filter(|p| p.is_live_at(now)).map(|p| p.id)
            };

            Ok(PostDetails {
                tags: post.tag_list(conn)?,
                categories: post.categories(conn)?,
                comments: post
                    .approved_comments(conn)?
                    .into_iter()
                    .map(CommentView::from)
                    .collect(),
                next_id: live_id(post.next(conn)?),
                prev_id: live_id(post.prev(conn)?),
                comments_allowed: BlogPost::comments_allowed(conn)?,
                post,
            })
        })
        .await?;

    Ok(HttpResponse::Ok().json(details))
}

/// Pipe for the archive sidebar
/// - url: `{domain}/blog/archive`
///
/// # Response
/// ## Ok
/// - months that hold live posts, newest first
/// ```json
/// [ { "year": 2011, "month": 3, "count": 2 } ]
/// ```
/// ## Error
/// - Internal server error
#[get("/blog/archive")]
pub async fn archive_index(app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let months: Vec<ArchiveMonth> = app_state
        .run(|conn| Ok(BlogPost::archive_months(conn)?))
        .await?;

    Ok(HttpResponse::Ok().json(months))
}

/// Pipe for the live posts of one month
/// - url: `{domain}/blog/archive/{year}/{month}`
///
/// # Response
/// ## Ok
/// - json array of [posts](BlogPost), newest first
/// ## Error
/// - Bad request (month outside 1..=12 or non-numeric parts)
/// - Internal server error
#[get("/blog/archive/{year}/{month}")]
pub async fn archive_posts(req: HttpRequest, app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let year = req.match_info().query("year").parse::<i32>()?;
    let month = req.match_info().query("month").parse::<u32>()?;
    let date = NaiveDate::from_ymd_opt(year, month, 1).ok_or(AppError::BadRequest)?;

    let posts = app_state
        .run(move |conn| {
            let now = now();
            Ok(BlogPost::by_archive(conn, date)?
                .into_iter()
                .filter(|post| post.is_live_at(now))
                .collect::<Vec<_>>())
        })
        .await?;

    Ok(HttpResponse::Ok().json(posts))
}

/// Pipe for the tag cloud
/// - url: `{domain}/blog/tags`
///
/// # Response
/// ## Ok
/// ```json
/// [ { "name": "chicago", "count": 2 } ]
/// ```
/// ## Error
/// - Internal server error
#[get("/blog/tags")]
pub async fn tags_index(app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let counts = app_state.run(|conn| Ok(BlogPost::tag_counts(conn)?)).await?;
    let counts: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount { name: tag.name, count })
        .collect();

    Ok(HttpResponse::Ok().json(counts))
}

/// Pipe for the live posts carrying a tag
/// - url: `{domain}/blog/tagged/{tag}`
///
/// # Response
/// ## Ok
/// - json array of [posts](BlogPost); empty for unknown tags
/// ## Error
/// - Internal server error
#[get("/blog/tagged/{tag}")]
pub async fn tagged_posts(req: HttpRequest, app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let tag = req.match_info().query("tag").to_string();

    let posts = app_state
        .run(move |conn| {
            let now = now();
            Ok(BlogPost::tagged_with(conn, &tag)?
                .into_iter()
                .filter(|post| post.is_live_at(now))
                .collect::<Vec<_>>())
        })
        .await?;

    Ok(HttpResponse::Ok().json(posts))
}
