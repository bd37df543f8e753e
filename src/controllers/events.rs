use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::domain::{classify, is_registration_open, EventType, TravelSlot};
use crate::middleware::{AuthMember, PERMISSION_EVENTS};
use crate::models::{Event, MemberField, ParticipantRow, WwParticipantRow};
use crate::services::roster::WwSignUpDetails;
use crate::services::ServiceError;
use crate::AppState;

use super::reply_error;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{event_id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/events/{event_id}/members", get(get_event_members))
        .route("/events/{event_id}/ww-members", get(get_event_ww_members))
        .route("/events/{event_id}/signup", post(sign_up).delete(sign_off))
        .route(
            "/events/{event_id}/members/{member_id}",
            delete(remove_participant),
        )
}

/* ---------- helpers ---------- */

async fn is_organizer(
    pool: &sqlx::PgPool,
    event_id: i64,
    member_id: i32,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM event_organizers WHERE event_id = $1 AND member_id = $2)",
    )
    .bind(event_id)
    .bind(member_id)
    .fetch_one(pool)
    .await
}

async fn event_exists(pool: &sqlx::PgPool, event_id: i64) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM events WHERE event_id = $1)")
        .bind(event_id)
        .fetch_one(pool)
        .await
}

fn db_error(e: sqlx::Error) -> (StatusCode, String) {
    reply_error(ServiceError::Database(e))
}

/// Rewrites the organizer list of an event. Runs on the caller's
/// transaction: if one of the inserts fails (e.g. an unknown member id),
/// the delete rolls back with it and the old list survives.
pub async fn replace_organizers(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_id: i64,
    organizers: &[i32],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM event_organizers WHERE event_id = $1")
        .bind(event_id)
        .execute(&mut **tx)
        .await?;
    for organizer_id in organizers {
        sqlx::query("INSERT INTO event_organizers (event_id, member_id) VALUES ($1, $2)")
            .bind(event_id)
            .bind(organizer_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

fn check_ww_invariant(req: &EventRequest) -> Result<(), (StatusCode, String)> {
    if classify(req.ww, req.network, req.jbt_goes).is_working_weekend() && req.end_date.is_none() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "A working weekend requires an end date".to_string(),
        ));
    }
    Ok(())
}

/* ---------- EVENT OVERVIEW ---------- */

#[derive(Debug, Serialize)]
struct EventOverviewResponse {
    #[serde(flatten)]
    event: Event,
    #[serde(rename = "type")]
    event_type: EventType,
    participants: i64,
    registration_open: bool,
}

// GET /api/events
async fn list_events(
    State(state): State<Arc<AppState>>,
    _member: AuthMember,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = state
        .cache
        .get_upcoming_events()
        .await
        .map_err(db_error)?;

    // The window check is never cached; evaluate against the current clock
    let now = Utc::now().naive_utc();
    let payload: Vec<EventOverviewResponse> = rows
        .into_iter()
        .map(|row| {
            let registration_open = is_registration_open(
                now,
                row.event.registration_start,
                row.event.registration_end,
            );
            EventOverviewResponse {
                event_type: row.event.event_type(),
                registration_open,
                participants: row.participants,
                event: row.event,
            }
        })
        .collect();

    Ok((StatusCode::OK, Json(payload)))
}

/* ---------- EVENT CRUD ---------- */

#[derive(Debug, Deserialize, Validate)]
struct EventRequest {
    #[validate(length(min = 1, max = 255))]
    name: String,
    description: Option<String>,
    location: Option<String>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    start_time: Option<String>,
    end_time: Option<String>,
    registration_start: Option<NaiveDateTime>,
    registration_end: Option<NaiveDateTime>,
    #[validate(range(min = 1))]
    max_participants: Option<i32>,
    #[serde(default)]
    ww: bool,
    #[serde(default)]
    network: bool,
    #[serde(default)]
    jbt_goes: bool,
    #[serde(default)]
    organizers: Vec<i32>,
}

// POST /api/events
async fn create_event(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Json(req): Json<EventRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !member.has_any_permission(&[PERMISSION_EVENTS]) {
        return Err((
            StatusCode::FORBIDDEN,
            "Missing permission to create events".to_string(),
        ));
    }
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    check_ww_invariant(&req)?;

    let mut tx = state.db.pool.begin().await.map_err(db_error)?;

    let event_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO events
             (name, description, location, start_date, end_date, start_time, end_time,
              registration_start, registration_end, max_participants, ww, network, jbt_goes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING event_id",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.location)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(&req.start_time)
    .bind(&req.end_time)
    .bind(req.registration_start)
    .bind(req.registration_end)
    .bind(req.max_participants)
    .bind(req.ww)
    .bind(req.network)
    .bind(req.jbt_goes)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    replace_organizers(&mut tx, event_id, &req.organizers)
        .await
        .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    state.cache.invalidate_events().await;
    Ok((StatusCode::CREATED, Json(json!({ "event_id": event_id }))))
}

#[derive(Debug, Serialize)]
struct EventDetailResponse {
    #[serde(flatten)]
    event: Event,
    #[serde(rename = "type")]
    event_type: EventType,
    organizers: Vec<MemberField>,
    participants: i64,
    registration_open: bool,
    signed_up: bool,
}

// GET /api/events/{event_id}
async fn get_event(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let event = sqlx::query_as::<_, Event>(
        "SELECT event_id, name, description, location, start_date, end_date,
                start_time, end_time, registration_start, registration_end,
                max_participants, ww, network, jbt_goes
         FROM events WHERE event_id = $1",
    )
    .bind(event_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| (StatusCode::NOT_FOUND, "Event not found".to_string()))?;

    let organizers = sqlx::query_as::<_, MemberField>(
        "SELECT m.member_id, m.first_name, m.last_name
         FROM event_organizers o
         JOIN members m ON m.member_id = o.member_id
         WHERE o.event_id = $1
         ORDER BY m.last_name, m.first_name",
    )
    .bind(event_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    let participants = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM event_participants WHERE event_id = $1",
    )
    .bind(event_id)
    .fetch_one(&state.db.pool)
    .await
    .map_err(db_error)?;

    let signed_up = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM event_participants WHERE event_id = $1 AND member_id = $2)",
    )
    .bind(event_id)
    .bind(member.member_id)
    .fetch_one(&state.db.pool)
    .await
    .map_err(db_error)?;

    let now = Utc::now().naive_utc();
    let registration_open =
        is_registration_open(now, event.registration_start, event.registration_end);

    Ok((
        StatusCode::OK,
        Json(EventDetailResponse {
            event_type: event.event_type(),
            organizers,
            participants,
            registration_open,
            signed_up,
            event,
        }),
    ))
}

// PATCH /api/events/{event_id}
async fn update_event(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(event_id): Path<i64>,
    Json(req): Json<EventRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Event permission or being a current organizer both allow editing
    let organizer = is_organizer(&state.db.pool, event_id, member.member_id)
        .await
        .map_err(db_error)?;
    if !member.has_any_permission(&[PERMISSION_EVENTS]) && !organizer {
        return Err((
            StatusCode::FORBIDDEN,
            "You are not allowed to update this event".to_string(),
        ));
    }
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    check_ww_invariant(&req)?;

    let mut tx = state.db.pool.begin().await.map_err(db_error)?;

    let updated = sqlx::query(
        "UPDATE events SET
             name = $1, description = $2, location = $3, start_date = $4, end_date = $5,
             start_time = $6, end_time = $7, registration_start = $8, registration_end = $9,
             max_participants = $10, ww = $11, network = $12, jbt_goes = $13
         WHERE event_id = $14",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.location)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(&req.start_time)
    .bind(&req.end_time)
    .bind(req.registration_start)
    .bind(req.registration_end)
    .bind(req.max_participants)
    .bind(req.ww)
    .bind(req.network)
    .bind(req.jbt_goes)
    .bind(event_id)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?
    .rows_affected();

    if updated == 0 {
        return Err((StatusCode::NOT_FOUND, "Event not found".to_string()));
    }

    replace_organizers(&mut tx, event_id, &req.organizers)
        .await
        .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    state.cache.invalidate_events().await;
    Ok((StatusCode::OK, Json(json!({ "message": "Event updated" }))))
}

// DELETE /api/events/{event_id}
async fn delete_event(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !member.has_any_permission(&[PERMISSION_EVENTS]) {
        return Err((
            StatusCode::FORBIDDEN,
            "Missing permission to delete events".to_string(),
        ));
    }

    let deleted = sqlx::query("DELETE FROM events WHERE event_id = $1")
        .bind(event_id)
        .execute(&state.db.pool)
        .await
        .map_err(db_error)?
        .rows_affected();

    if deleted == 0 {
        return Err((StatusCode::NOT_FOUND, "Event not found".to_string()));
    }

    state.cache.invalidate_events().await;
    Ok((StatusCode::OK, Json(json!({ "message": "Event deleted" }))))
}

/* ---------- ROSTERS ---------- */

// GET /api/events/{event_id}/members
async fn get_event_members(
    State(state): State<Arc<AppState>>,
    _member: AuthMember,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !event_exists(&state.db.pool, event_id).await.map_err(db_error)? {
        return Err((StatusCode::NOT_FOUND, "Event not found".to_string()));
    }

    let members = sqlx::query_as::<_, ParticipantRow>(
        "SELECT p.member_id, m.first_name, m.last_name, m.member_status, p.registered_at
         FROM event_participants p
         JOIN members m ON m.member_id = p.member_id
         WHERE p.event_id = $1
         ORDER BY p.registered_at",
    )
    .bind(event_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    Ok((StatusCode::OK, Json(members)))
}

#[derive(Debug, Serialize)]
struct WwMemberResponse {
    member_id: i32,
    first_name: String,
    last_name: String,
    member_status: String,
    registered_at: NaiveDateTime,
    arrival: &'static str,
    departure: &'static str,
    car: bool,
    seats: i32,
    vegetarian: bool,
    comment: Option<String>,
}

// GET /api/events/{event_id}/ww-members
async fn get_event_ww_members(
    State(state): State<Arc<AppState>>,
    _member: AuthMember,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !event_exists(&state.db.pool, event_id).await.map_err(db_error)? {
        return Err((StatusCode::NOT_FOUND, "Event not found".to_string()));
    }

    let rows = sqlx::query_as::<_, WwParticipantRow>(
        "SELECT p.member_id, m.first_name, m.last_name, m.member_status, p.registered_at,
                w.arrival, w.departure, w.car, w.seats, w.vegetarian, w.comment
         FROM event_participants p
         JOIN members m ON m.member_id = p.member_id
         JOIN event_ww_details w
           ON w.event_id = p.event_id AND w.member_id = p.member_id
         WHERE p.event_id = $1
         ORDER BY p.registered_at",
    )
    .bind(event_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    // Stored slot codes are mapped per direction; an unknown code is
    // surfaced as an error instead of being defaulted away
    let mut payload = Vec::with_capacity(rows.len());
    for row in rows {
        let arrival = TravelSlot::parse(&row.arrival)
            .map_err(|e| reply_error(ServiceError::Domain(e)))?;
        let departure = TravelSlot::parse(&row.departure)
            .map_err(|e| reply_error(ServiceError::Domain(e)))?;
        payload.push(WwMemberResponse {
            member_id: row.member_id,
            first_name: row.first_name,
            last_name: row.last_name,
            member_status: row.member_status,
            registered_at: row.registered_at,
            arrival: arrival.arrival_label(),
            departure: departure.departure_label(),
            car: row.car,
            seats: row.seats,
            vegetarian: row.vegetarian,
            comment: row.comment,
        });
    }

    Ok((StatusCode::OK, Json(payload)))
}

/* ---------- SIGN-UP / SIGN-OFF ---------- */

// POST /api/events/{event_id}/signup
async fn sign_up(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(event_id): Path<i64>,
    ww_details: Option<Json<WwSignUpDetails>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .roster
        .sign_up_for_event(event_id, &member, ww_details.map(|Json(d)| d))
        .await
        .map_err(reply_error)?;

    state.cache.invalidate_events().await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Signed up for event" })),
    ))
}

// DELETE /api/events/{event_id}/signup
async fn sign_off(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .roster
        .sign_off_from_event(event_id, member.member_id, true)
        .await
        .map_err(reply_error)?;

    state.cache.invalidate_events().await;
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Signed off from event" })),
    ))
}

// DELETE /api/events/{event_id}/members/{member_id}
async fn remove_participant(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path((event_id, member_id)): Path<(i64, i32)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Removing somebody else needs the event permission or organizer role
    let organizer = is_organizer(&state.db.pool, event_id, member.member_id)
        .await
        .map_err(db_error)?;
    if !member.has_any_permission(&[PERMISSION_EVENTS]) && !organizer {
        return Err((
            StatusCode::FORBIDDEN,
            "You are not allowed to remove participants".to_string(),
        ));
    }

    state
        .roster
        .sign_off_from_event(event_id, member_id, false)
        .await
        .map_err(reply_error)?;

    state.cache.invalidate_events().await;
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Participant removed" })),
    ))
}
