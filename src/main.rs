use std::io;

use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use refinery_blog::{
    app::{config::Config, AppState},
    database::db_utils::{establish_pool, run_migrations},
    routes,
};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;
    let pool = establish_pool(&config.database_url, config.pool_size).map_err(io::Error::other)?;
    {
        let mut conn = pool.get().map_err(io::Error::other)?;
        run_migrations(&mut conn).map_err(io::Error::other)?;
    }

    let app_state = AppState::new(pool);

    log::info!("Server running on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(app_state.clone()))
            .wrap(Logger::default())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
