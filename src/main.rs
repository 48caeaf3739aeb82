mod db;
mod models;
mod payments;
mod pricing;
mod relay;
mod route;
mod routemount;
mod state;
mod utils;

use db::init_db;
use state::AppState;
use tracing_subscriber::EnvFilter;

use crate::routemount::route::create_router;

#[tokio::main]
async fn main() {

    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("database_url is missing in env");
    let server_address = std::env::var("SERVER_ADDRESS").unwrap_or("127.0.0.1:7870".to_string());

    //connect to db
    let db_pool = init_db(&database_url).await;
    //connection
    let app = create_router(AppState::new(db_pool));

    let listener = tokio::net::TcpListener::bind(&server_address).await.unwrap();
    tracing::info!("server running on {}", server_address);
    axum::serve(listener, app).await.unwrap();
}
