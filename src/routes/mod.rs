pub mod blog;
pub mod category;
pub mod comment;

use actix_web::web::ServiceConfig;

/// Registers every public blog route.
pub fn configure(cfg: &mut ServiceConfig) {
    cfg
        //Post routes
        .service(blog::list_posts)
        .service(blog::show_post)
        .service(blog::archive_index)
        .service(blog::archive_posts)
        .service(blog::tags_index)
        .service(blog::tagged_posts)
        //Category routes
        .service(category::list_categories)
        .service(category::show_category)
        //Comment routes
        .service(comment::list_comments)
        .service(comment::create_comment);
}
