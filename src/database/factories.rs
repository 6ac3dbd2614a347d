//! Test records with sensible defaults.

use std::sync::atomic::{AtomicUsize, Ordering};

use diesel::sqlite::SqliteConnection;

use super::models::blog_category::{BlogCategory, NewBlogCategory};
use super::models::blog_comment::{BlogComment, NewBlogComment};
use super::models::blog_post::{BlogPost, NewBlogPost};
use super::models::tag::TagList;

static SEQUENCE: AtomicUsize = AtomicUsize::new(1);

fn sequence() -> usize {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

pub fn post_attributes() -> NewBlogPost {
    NewBlogPost {
        title: format!("Top {} Shopping Centers in Chicago", sequence()),
        body: Some(
            "These are the top ten shopping centers in Chicago. You're going to read a long blog post about them. Come to peace with it."
                .to_string(),
        ),
        tag_list: TagList::parse("chicago, shopping, fun times"),
        ..Default::default()
    }
}

pub fn post(conn: &mut SqliteConnection) -> BlogPost {
    post_with(conn, |_| {})
}

pub fn post_with<F>(conn: &mut SqliteConnection, customize: F) -> BlogPost
where
    F: FnOnce(&mut NewBlogPost),
{
    let mut attributes = post_attributes();
    customize(&mut attributes);
    BlogPost::create(conn, &attributes).expect("factory post is valid")
}

pub fn blog_category(conn: &mut SqliteConnection) -> BlogCategory {
    let attributes = NewBlogCategory {
        title: format!("Shopping {}", sequence()),
    };
    BlogCategory::create(conn, &attributes).expect("factory category is valid")
}

pub fn comment_attributes() -> NewBlogComment {
    NewBlogComment {
        name: "Joe Commenter".to_string(),
        email: format!("person{}@example.com", sequence()),
        message: "Which one is the best for picking up new shoes?".to_string(),
    }
}

pub fn blog_comment(conn: &mut SqliteConnection, post: &BlogPost) -> BlogComment {
    BlogComment::create(conn, post, &comment_attributes()).expect("factory comment is valid")
}
