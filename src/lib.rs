pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod storage;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::db::Database;
use crate::storage::FileStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub files: FileStore,
    pub tokens: TokenIssuer,
    pub bcrypt_cost: u32,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub async fn from_config(config: &Config) -> Result<Self, error::AppError> {
        if config.jwt_secret == crate::config::DEV_JWT_SECRET {
            tracing::warn!("JWT_SECRET is not set, signing tokens with the development secret");
        }

        Ok(Self {
            db: Database::open(&config.database_path)?,
            files: FileStore::open(config.upload_dir.clone()).await?,
            tokens: TokenIssuer::from_config(config),
            bcrypt_cost: config.bcrypt_cost,
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

pub fn app(state: AppState) -> Router {
    // Served as-is with no ownership check.
    let uploads = ServeDir::new(state.files.root());

    Router::new()
        .route("/", get(handlers::root))
        .route("/users/signup", post(handlers::signup))
        .route("/users/login", post(handlers::login))
        .route("/documents", get(handlers::list_documents))
        .route("/documents/", get(handlers::list_documents))
        .route(
            "/documents/upload",
            post(handlers::upload_document)
                .layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/documents/filter", get(handlers::filter_documents))
        .route("/documents/user/:uid", get(handlers::list_user_documents))
        .route("/documents/user/:uid/filter", get(handlers::filter_user_documents))
        .route("/documents/file/:doc_id", get(handlers::get_file))
        .route(
            "/documents/:doc_id",
            put(handlers::update_document).delete(handlers::delete_document),
        )
        .nest_service("/documents/uploads", uploads)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
