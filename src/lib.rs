pub mod app_config;
pub mod auth;
pub mod cache;
pub mod db;
pub mod middleware;
pub mod moderation;
pub mod orm;
pub mod permission;
pub mod rating;
pub mod seed;
pub mod web;

use actix_web::web::{Data, ServiceConfig};
use app_config::AppConfig;
use auth::TokenKeys;
use cache::RatingCache;
use sea_orm::DatabaseConnection;
use std::time::Duration;

/// Everything a worker shares with every other worker.
#[derive(Clone)]
pub struct AppState {
    pub db: Data<DatabaseConnection>,
    pub tokens: Data<TokenKeys>,
    pub ratings: Data<RatingCache>,
    pub config: Data<AppConfig>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig, jwt_secret: &[u8]) -> Self {
        let tokens = TokenKeys::new(
            jwt_secret,
            chrono::Duration::days(config.auth.token_ttl_days),
        );
        let ratings = RatingCache::new(
            Duration::from_secs(config.limits.rating_cache_ttl_seconds),
            config.limits.rating_cache_capacity,
        );

        Self {
            db: Data::new(db),
            tokens: Data::new(tokens),
            ratings: Data::new(ratings),
            config: Data::new(config),
        }
    }

    /// Register shared state and every route.
    pub fn configure(&self, conf: &mut ServiceConfig) {
        conf.app_data(self.db.clone())
            .app_data(self.tokens.clone())
            .app_data(self.ratings.clone())
            .app_data(self.config.clone());
        web::configure(conf);
    }
}
