pub mod events;
pub mod workshops;

use axum::http::StatusCode;
use axum::Router;
use std::sync::Arc;

use crate::services::ServiceError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(workshops::routes())
}

// Maps a service failure to the (status, message) tuple the handlers
// return. Infrastructure errors stay opaque to the client.
pub(crate) fn reply_error(e: ServiceError) -> (StatusCode, String) {
    if let ServiceError::Database(ref err) = e {
        tracing::error!("database error: {:?}", err);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string());
    }
    (e.status(), e.to_string())
}
