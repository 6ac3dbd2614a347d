pub mod app;
pub mod database;
pub mod routes;
pub mod schema;
