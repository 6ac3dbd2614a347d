use actix_web::{get, web::Data, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::{
    app::{AppError, AppState},
    database::models::{blog_category::BlogCategory, blog_post::BlogPost, now},
};

#[derive(Debug, Serialize)]
pub struct CategorySummary {
    pub id: i32,
    pub title: String,
    pub post_count: i64,
}

#[derive(Debug, Serialize)]
pub struct CategoryPosts {
    pub category: BlogCategory,
    pub posts: Vec<BlogPost>,
}

/// Pipe for listing the categories, alphabetically
/// - url: `{domain}/blog/categories`
///
/// # Response
/// ## Ok
/// - categories with the number of live posts in each
/// ```json
/// [ { "id": 1, "title": "Shopping 1", "post_count": 3 } ]
/// ```
/// ## Error
/// - Internal server error
#[get("/blog/categories")]
pub async fn list_categories(app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let summaries = app_state
        .run(|conn| {
            let now = now();
            let mut summaries = Vec::new();
            for category in BlogCategory::all(conn)? {
                summaries.push(CategorySummary {
                    post_count: category.post_count_at(conn, now)?,
                    id: category.id,
                    title: category.title,
                });
            }
            Ok(summaries)
        })
        .await?;

    Ok(HttpResponse::Ok().json(summaries))
}

/// Pipe for one category and its live posts
/// - url: `{domain}/blog/categories/{category_id}`
///
/// # Response
/// ## Ok
/// - json formatted [category with posts](CategoryPosts)
/// ## Error
/// - Bad request
/// - Not found
/// - Internal server error
#[get("/blog/categories/{category_id}")]
pub async fn show_category(req: HttpRequest, app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let category_id = req.match_info().query("category_id").parse::<i32>()?;

    let found = app_state
        .run(move |conn| {
            let category = BlogCategory::find(conn, category_id)?;
            let posts = category.live_posts_at(conn, now())?;
            Ok(CategoryPosts { category, posts })
        })
        .await?;

    Ok(HttpResponse::Ok().json(found))
}

#[cfg(test)]
mod tests {
    use actix_web::{
        http::StatusCode,
        test::{self, call_service},
        web::Data,
        App,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use crate::database::factories;
    use crate::routes::test_utils::test_state;

    #[actix_rt::test]
    async fn test_categories() {
        let appstate = test_state();
        let (shopping, live) = {
            let mut conn = appstate.pool.get().unwrap();
            let shopping = factories::blog_category(&mut conn);
            factories::blog_category(&mut conn);
            let live = factories::post(&mut conn);
            let draft = factories::post_with(&mut conn, |p| p.draft = true);
            live.add_category(&mut conn, &shopping).unwrap();
            draft.add_category(&mut conn, &shopping).unwrap();
            (shopping, live)
        };

        let app = test::init_service(
            App::new()
                .app_data(Data::new(appstate.clone()))
                .service(super::list_categories)
                .service(super::show_category),
        )
        .await;

        let req = test::TestRequest::get().uri("/blog/categories").to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let counts: Vec<(i64, i64)> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| (c["id"].as_i64().unwrap(), c["post_count"].as_i64().unwrap()))
            .collect();
        assert!(counts.contains(&(i64::from(shopping.id), 1)));
        assert_eq!(counts.len(), 2);

        let req = test::TestRequest::get()
            .uri(&format!("/blog/categories/{}", shopping.id))
            .to_request();
        let body: Value = test::read_body_json(call_service(&app, req).await).await;
        assert_eq!(body["category"]["title"], json!(shopping.title));
        assert_eq!(body["posts"].as_array().unwrap().len(), 1);
        assert_eq!(body["posts"][0]["id"], json!(live.id));

        let req = test::TestRequest::get().uri("/blog/categories/999").to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
