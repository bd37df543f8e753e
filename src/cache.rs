use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::info;

use crate::models::Event;
use crate::{database::Database, redis_client::RedisClient};

const EVENTS_KEY: &str = "events:overview";

/// Event plus its current participant count, as cached for the overview.
///
/// Deliberately without any "registration open" flag: the window check
/// depends on the wall clock and is computed per request in the controller,
/// never cached.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EventOverviewRow {
    #[sqlx(flatten)]
    pub event: Event,
    pub participants: i64,
}

#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    db: Database,
    events_ttl: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, db: Database, events_ttl: u64) -> Self {
        Self {
            redis,
            db,
            events_ttl,
        }
    }

    // Warm the overview cache once at startup
    pub async fn warmup_cache(&self) {
        info!("Starting cache warmup...");
        if let Ok(events) = self.load_events_from_db().await {
            info!("Loaded {} upcoming events", events.len());
            let _ = self.save_events_to_cache(&events).await;
        }
        info!("Cache warmup done");
    }

    /// Upcoming events with participant counts, cache first, DB fallback.
    pub async fn get_upcoming_events(&self) -> Result<Vec<EventOverviewRow>, sqlx::Error> {
        if let Ok(events) = self.get_events_from_cache().await {
            return Ok(events);
        }

        let events = self.load_events_from_db().await?;
        let _ = self.save_events_to_cache(&events).await;
        Ok(events)
    }

    /// Drops the overview after any mutation that changes an event or a
    /// roster count.
    pub async fn invalidate_events(&self) {
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(EVENTS_KEY).await;
        info!("Invalidated events overview cache");
    }

    async fn load_events_from_db(&self) -> Result<Vec<EventOverviewRow>, sqlx::Error> {
        sqlx::query_as::<_, EventOverviewRow>(
            r#"
            SELECT e.event_id, e.name, e.description, e.location,
                   e.start_date, e.end_date, e.start_time, e.end_time,
                   e.registration_start, e.registration_end, e.max_participants,
                   e.ww, e.network, e.jbt_goes,
                   COUNT(p.member_id) AS participants
            FROM events e
            LEFT JOIN event_participants p ON p.event_id = e.event_id
            WHERE e.start_date >= CURRENT_DATE
            GROUP BY e.event_id
            ORDER BY e.start_date, e.event_id
            "#,
        )
        .fetch_all(&self.db.pool)
        .await
    }

    async fn get_events_from_cache(&self) -> Result<Vec<EventOverviewRow>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get(EVENTS_KEY).await?;
        let events: Vec<EventOverviewRow> = serde_json::from_str(&data)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error")))?;
        Ok(events)
    }

    async fn save_events_to_cache(
        &self,
        events: &[EventOverviewRow],
    ) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(events)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error")))?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(EVENTS_KEY, data, self.events_ttl).await
    }
}
