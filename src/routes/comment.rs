use actix_web::{get, post, web::Data, HttpRequest, HttpResponse};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    app::{AppError, AppState},
    database::models::{
        blog_comment::{BlogComment, NewBlogComment},
        blog_post::BlogPost,
        now,
    },
};

/// Public view of a comment; the e-mail address is never published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub id: i32,
    pub name: String,
    pub message: String,
    pub state: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<BlogComment> for CommentView {
    fn from(comment: BlogComment) -> Self {
        CommentView {
            id: comment.id,
            name: comment.name,
            message: comment.body,
            state: comment.state,
            created_at: comment.created_at,
        }
    }
}

/// Pipe for getting the approved comments of a live post
/// - url: `{domain}/blog/posts/{post_id}/comments`
///
/// # HTTP request requirements
/// - `{post_id}` as url parameter
///
/// # Example
/// ```text
/// let request = actix_web::test::TestRequest::get()
///     .uri("localhost/blog/posts/1/comments")
///     .to_request();
/// ```
///
/// # Response
/// ## Ok
/// - json array of [comments](CommentView), oldest first
/// ```json
/// [
///     {
///         "id": 1,
///         "name": "Joe Commenter",
///         "message": "Which one is the best for picking up new shoes?",
///         "state": "approved",
///         "created_at": "2011-03-11T10:00:00"
///     }
/// ]
/// ```
/// ## Error
/// - Bad request
/// - Not found
/// - Internal server error
#[get("/blog/posts/{post_id}/comments")]
pub async fn list_comments(req: HttpRequest, app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let post_id = req.match_info().query("post_id").parse::<i32>()?;

    let comments = app_state
        .run(move |conn| {
            let post = BlogPost::find_live_at(conn, post_id, now())?;
            Ok(post
                .approved_comments(conn)?
                .into_iter()
                .map(CommentView::from)
                .collect::<Vec<_>>())
        })
        .await?;

    Ok(HttpResponse::Ok().json(comments))
}

/// Pipe for creating a comment
/// - url: `{domain}/blog/posts/{post_id}/comments`
///
/// # HTTP request requirements
/// - `{post_id}` as url parameter
///
/// ## body
/// - json object with `name`, `email` and `message` (`body` is accepted too)
///
/// # Example
/// ```text
/// let comment = r#"{"name":"Joe Commenter","email":"joe@example.com","message":"Nice list"}"#;
/// let request = actix_web::test::TestRequest::post()
///     .uri("localhost/blog/posts/1/comments")
///     .set_payload(comment)
///     .to_request();
/// ```
///
/// # Response
/// ## Ok
/// - 201 with the new [comment](CommentView). It stays hidden until approved
///   while comment moderation is on.
/// ## Error
/// - Bad request (malformed json or id)
/// - Forbidden (comments are switched off)
/// - Not found
/// - Unprocessable entity, with `{"errors": [...]}` listing what is wrong
/// - Internal server error
#[post("/blog/posts/{post_id}/comments")]
pub async fn create_comment(
    req: HttpRequest,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let post_id = req.match_info().query("post_id").parse::<i32>()?;
    let new_comment: NewBlogComment = serde_json::from_str(&req_body)?;

    let comment = app_state
        .run(move |conn| {
            let post = BlogPost::find_live_at(conn, post_id, now())?;
            if !BlogPost::comments_allowed(conn)? {
                return Err(AppError::Forbidden);
            }

            Ok(BlogComment::create(conn, &post, &new_comment)?)
        })
        .await?;

    Ok(HttpResponse::Created().json(CommentView::from(comment)))
}
