pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod domain;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use std::sync::Arc;
use tokio::task;

use services::roster::RosterService;

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub cache: cache::CacheService,
    pub roster: RosterService,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        let cache = cache::CacheService::new(
            redis.clone(),
            db.clone(),
            config.redis.events_ttl_seconds,
        );
        let roster = RosterService::new(db.clone());
        let state = Arc::new(Self {
            db,
            redis,
            cache,
            roster,
            config,
        });

        let state_for_bg = state.clone();
        task::spawn(async move {
            // Warm the overview cache in the background
            state_for_bg.cache.warmup_cache().await;
        });

        Ok(state)
    }
}
