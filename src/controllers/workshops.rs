use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::domain::{can_submit_feedback, DomainError, InstanceStatus};
use crate::middleware::{AuthMember, PERMISSION_WORKSHOPS};
use crate::models::{
    FeedbackQuestion, MemberField, ParticipantRow, QuestionAverage, TextAnswer, Workshop,
    WorkshopInstance,
};
use crate::services::ServiceError;
use crate::AppState;

use super::reply_error;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workshops", get(list_workshops).post(create_workshop))
        .route(
            "/workshops/{workshop_id}",
            get(get_workshop).patch(update_workshop).delete(delete_workshop),
        )
        .route("/workshops/{workshop_id}/instances", post(create_instance))
        .route(
            "/workshop-instances/{instance_id}",
            get(get_instance).delete(delete_instance),
        )
        .route(
            "/workshop-instances/{instance_id}/signup",
            post(instance_sign_up).delete(instance_sign_off),
        )
        .route(
            "/workshop-instances/{instance_id}/participants/{member_id}",
            delete(remove_instance_participant),
        )
        .route(
            "/workshop-instances/{instance_id}/close-admission",
            post(close_admission),
        )
        .route(
            "/workshop-instances/{instance_id}/attendance",
            post(record_attendance),
        )
        .route(
            "/workshop-instances/{instance_id}/complete",
            post(complete_instance),
        )
        .route(
            "/workshop-instances/{instance_id}/feedback",
            get(feedback_summary).post(submit_feedback),
        )
        .route("/feedback-questions", get(list_feedback_questions))
}

/* ---------- helpers ---------- */

const WORKSHOP_CATEGORIES: [&str; 3] = ["mandatory", "optional", "external"];

fn db_error(e: sqlx::Error) -> (StatusCode, String) {
    reply_error(ServiceError::Database(e))
}

async fn is_instructor(
    pool: &sqlx::PgPool,
    instance_id: i64,
    member_id: i32,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM instance_instructors
          WHERE instance_id = $1 AND member_id = $2)",
    )
    .bind(instance_id)
    .bind(member_id)
    .fetch_one(pool)
    .await
}

// Instance administration is open to workshop managers and the instructors
// of that particular instance
async fn ensure_can_manage_instance(
    pool: &sqlx::PgPool,
    instance_id: i64,
    member: &AuthMember,
) -> Result<(), (StatusCode, String)> {
    if member.has_any_permission(&[PERMISSION_WORKSHOPS]) {
        return Ok(());
    }
    let instructor = is_instructor(pool, instance_id, member.member_id)
        .await
        .map_err(db_error)?;
    if instructor {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            "You are not allowed to manage this workshop instance".to_string(),
        ))
    }
}

/// Locks the instance row and returns its parsed status. Keeping the lock
/// for the rest of the transaction serializes lifecycle transitions.
async fn lock_instance_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    instance_id: i64,
) -> Result<InstanceStatus, ServiceError> {
    let status: Option<String> = sqlx::query_scalar(
        "SELECT status FROM workshop_instances WHERE instance_id = $1 FOR UPDATE",
    )
    .bind(instance_id)
    .fetch_optional(&mut **tx)
    .await?;

    let status = status.ok_or(ServiceError::InstanceNotFound)?;
    InstanceStatus::from_db(&status).ok_or_else(|| {
        ServiceError::Database(sqlx::Error::Decode("unknown instance status".into()))
    })
}

async fn update_instance_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    instance_id: i64,
    from: InstanceStatus,
    to: InstanceStatus,
) -> Result<(), ServiceError> {
    // Guarded update; the row is already locked, this is belt and braces
    let updated = sqlx::query(
        "UPDATE workshop_instances SET status = $1 WHERE instance_id = $2 AND status = $3",
    )
    .bind(to.as_db())
    .bind(instance_id)
    .bind(from.as_db())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(ServiceError::Domain(DomainError::InvalidLifecycleTransition {
            from,
            action: "advance",
        }));
    }
    Ok(())
}

/* ---------- WORKSHOP DEFINITIONS ---------- */

#[derive(Debug, Deserialize, Validate)]
struct WorkshopRequest {
    #[validate(length(min = 1, max = 255))]
    name: String,
    description: Option<String>,
    category: String,
}

fn check_category(req: &WorkshopRequest) -> Result<(), (StatusCode, String)> {
    if WORKSHOP_CATEGORIES.contains(&req.category.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            "category must be mandatory | optional | external".to_string(),
        ))
    }
}

// GET /api/workshops
async fn list_workshops(
    State(state): State<Arc<AppState>>,
    _member: AuthMember,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let workshops = sqlx::query_as::<_, Workshop>(
        "SELECT workshop_id, name, description, category FROM workshops ORDER BY name",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    Ok((StatusCode::OK, Json(workshops)))
}

// POST /api/workshops
async fn create_workshop(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Json(req): Json<WorkshopRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !member.has_any_permission(&[PERMISSION_WORKSHOPS]) {
        return Err((
            StatusCode::FORBIDDEN,
            "Missing permission to manage workshops".to_string(),
        ));
    }
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    check_category(&req)?;

    let workshop_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO workshops (name, description, category)
         VALUES ($1, $2, $3) RETURNING workshop_id",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.category)
    .fetch_one(&state.db.pool)
    .await
    .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(json!({ "workshop_id": workshop_id }))))
}

// GET /api/workshops/{workshop_id}
async fn get_workshop(
    State(state): State<Arc<AppState>>,
    _member: AuthMember,
    Path(workshop_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let workshop = sqlx::query_as::<_, Workshop>(
        "SELECT workshop_id, name, description, category FROM workshops WHERE workshop_id = $1",
    )
    .bind(workshop_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| (StatusCode::NOT_FOUND, "Workshop not found".to_string()))?;

    let instances = sqlx::query_as::<_, WorkshopInstance>(
        "SELECT instance_id, workshop_id, date, start_time, end_time, location,
                target_audience, max_participants, status, grade
         FROM workshop_instances WHERE workshop_id = $1
         ORDER BY date DESC",
    )
    .bind(workshop_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    Ok((
        StatusCode::OK,
        Json(json!({ "workshop": workshop, "instances": instances })),
    ))
}

// PATCH /api/workshops/{workshop_id}
async fn update_workshop(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(workshop_id): Path<i64>,
    Json(req): Json<WorkshopRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !member.has_any_permission(&[PERMISSION_WORKSHOPS]) {
        return Err((
            StatusCode::FORBIDDEN,
            "Missing permission to manage workshops".to_string(),
        ));
    }
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    check_category(&req)?;

    let updated = sqlx::query(
        "UPDATE workshops SET name = $1, description = $2, category = $3 WHERE workshop_id = $4",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.category)
    .bind(workshop_id)
    .execute(&state.db.pool)
    .await
    .map_err(db_error)?
    .rows_affected();

    if updated == 0 {
        return Err((StatusCode::NOT_FOUND, "Workshop not found".to_string()));
    }
    Ok((StatusCode::OK, Json(json!({ "message": "Workshop updated" }))))
}

// DELETE /api/workshops/{workshop_id}
async fn delete_workshop(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(workshop_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !member.has_any_permission(&[PERMISSION_WORKSHOPS]) {
        return Err((
            StatusCode::FORBIDDEN,
            "Missing permission to manage workshops".to_string(),
        ));
    }

    let deleted = sqlx::query("DELETE FROM workshops WHERE workshop_id = $1")
        .bind(workshop_id)
        .execute(&state.db.pool)
        .await
        .map_err(db_error)?
        .rows_affected();

    if deleted == 0 {
        return Err((StatusCode::NOT_FOUND, "Workshop not found".to_string()));
    }
    Ok((StatusCode::OK, Json(json!({ "message": "Workshop deleted" }))))
}

/* ---------- WORKSHOP INSTANCES ---------- */

#[derive(Debug, Deserialize, Validate)]
struct InstanceRequest {
    date: NaiveDate,
    start_time: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    target_audience: Option<String>,
    #[validate(range(min = 1))]
    max_participants: Option<i32>,
    #[serde(default)]
    instructors: Vec<i32>,
}

// POST /api/workshops/{workshop_id}/instances
async fn create_instance(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(workshop_id): Path<i64>,
    Json(req): Json<InstanceRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !member.has_any_permission(&[PERMISSION_WORKSHOPS]) {
        return Err((
            StatusCode::FORBIDDEN,
            "Missing permission to manage workshops".to_string(),
        ));
    }
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM workshops WHERE workshop_id = $1)",
    )
    .bind(workshop_id)
    .fetch_one(&state.db.pool)
    .await
    .map_err(db_error)?;
    if !exists {
        return Err((StatusCode::NOT_FOUND, "Workshop not found".to_string()));
    }

    // Instance plus its instructor list land together or not at all
    let mut tx = state.db.pool.begin().await.map_err(db_error)?;

    // New instances always start with admission running
    let instance_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO workshop_instances
             (workshop_id, date, start_time, end_time, location, target_audience,
              max_participants, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING instance_id",
    )
    .bind(workshop_id)
    .bind(req.date)
    .bind(&req.start_time)
    .bind(&req.end_time)
    .bind(&req.location)
    .bind(&req.target_audience)
    .bind(req.max_participants)
    .bind(InstanceStatus::RegistrationOpen.as_db())
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    for instructor_id in &req.instructors {
        sqlx::query("INSERT INTO instance_instructors (instance_id, member_id) VALUES ($1, $2)")
            .bind(instance_id)
            .bind(instructor_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
    }

    tx.commit().await.map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(json!({ "instance_id": instance_id }))))
}

#[derive(Debug, Serialize)]
struct InstanceActions {
    can_sign_up: bool,
    can_sign_off: bool,
    can_close_admission: bool,
    can_record_attendance: bool,
    can_complete: bool,
    feedback_visible: bool,
}

// GET /api/workshop-instances/{instance_id}
async fn get_instance(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(instance_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let instance = sqlx::query_as::<_, WorkshopInstance>(
        "SELECT instance_id, workshop_id, date, start_time, end_time, location,
                target_audience, max_participants, status, grade
         FROM workshop_instances WHERE instance_id = $1",
    )
    .bind(instance_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| (StatusCode::NOT_FOUND, "Workshop instance not found".to_string()))?;

    let status = InstanceStatus::from_db(&instance.status)
        .ok_or_else(|| db_error(sqlx::Error::Decode("unknown instance status".into())))?;

    let participants = sqlx::query_as::<_, ParticipantRow>(
        "SELECT p.member_id, m.first_name, m.last_name, m.member_status, p.registered_at
         FROM instance_participants p
         JOIN members m ON m.member_id = p.member_id
         WHERE p.instance_id = $1
         ORDER BY p.registered_at",
    )
    .bind(instance_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    let signed_up = participants
        .iter()
        .any(|p| p.member_id == member.member_id);
    let full = instance
        .max_participants
        .is_some_and(|max| participants.len() as i64 >= i64::from(max));

    let manages = member.has_any_permission(&[PERMISSION_WORKSHOPS])
        || is_instructor(&state.db.pool, instance_id, member.member_id)
            .await
            .map_err(db_error)?;

    // What the UI may offer in the current state, for this caller
    let actions = InstanceActions {
        can_sign_up: status.allows_self_service() && !signed_up && !full,
        can_sign_off: status.allows_self_service() && signed_up,
        can_close_admission: manages && status == InstanceStatus::RegistrationOpen,
        can_record_attendance: manages && status == InstanceStatus::RegistrationClosed,
        can_complete: manages && status == InstanceStatus::FeedbackPending,
        feedback_visible: status.feedback_visible(),
    };

    let instructors = sqlx::query_as::<_, MemberField>(
        "SELECT m.member_id, m.first_name, m.last_name
         FROM instance_instructors i
         JOIN members m ON m.member_id = i.member_id
         WHERE i.instance_id = $1
         ORDER BY m.last_name, m.first_name",
    )
    .bind(instance_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "instance": instance,
            "status": status,
            "instructors": instructors,
            "participants": participants,
            "signed_up": signed_up,
            "actions": actions,
        })),
    ))
}

// DELETE /api/workshop-instances/{instance_id}
async fn delete_instance(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(instance_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !member.has_any_permission(&[PERMISSION_WORKSHOPS]) {
        return Err((
            StatusCode::FORBIDDEN,
            "Missing permission to manage workshops".to_string(),
        ));
    }

    let deleted = sqlx::query("DELETE FROM workshop_instances WHERE instance_id = $1")
        .bind(instance_id)
        .execute(&state.db.pool)
        .await
        .map_err(db_error)?
        .rows_affected();

    if deleted == 0 {
        return Err((StatusCode::NOT_FOUND, "Workshop instance not found".to_string()));
    }
    Ok((StatusCode::OK, Json(json!({ "message": "Workshop instance deleted" }))))
}

/* ---------- INSTANCE SIGN-UP / SIGN-OFF ---------- */

// POST /api/workshop-instances/{instance_id}/signup
async fn instance_sign_up(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(instance_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .roster
        .sign_up_for_instance(instance_id, &member)
        .await
        .map_err(reply_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Signed up for workshop instance" })),
    ))
}

// DELETE /api/workshop-instances/{instance_id}/signup
async fn instance_sign_off(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(instance_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .roster
        .sign_off_from_instance(instance_id, member.member_id, true)
        .await
        .map_err(reply_error)?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Signed off from workshop instance" })),
    ))
}

// DELETE /api/workshop-instances/{instance_id}/participants/{member_id}
async fn remove_instance_participant(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path((instance_id, member_id)): Path<(i64, i32)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    ensure_can_manage_instance(&state.db.pool, instance_id, &member).await?;

    state
        .roster
        .sign_off_from_instance(instance_id, member_id, false)
        .await
        .map_err(reply_error)?;

    Ok((StatusCode::OK, Json(json!({ "message": "Participant removed" }))))
}

/* ---------- LIFECYCLE ---------- */

#[derive(Debug, Deserialize)]
struct CloseAdmissionRequest {
    admitted: Vec<i32>,
}

// POST /api/workshop-instances/{instance_id}/close-admission
async fn close_admission(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(instance_id): Path<i64>,
    Json(req): Json<CloseAdmissionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    ensure_can_manage_instance(&state.db.pool, instance_id, &member).await?;

    let result: Result<(), ServiceError> = async {
        let mut tx = state.db.pool.begin().await.map_err(ServiceError::Database)?;

        let status = lock_instance_status(&mut tx, instance_id).await?;
        let next = status.close_admission()?;

        // Fix the attendee selection while closing
        sqlx::query(
            "UPDATE instance_participants
             SET admitted = (member_id = ANY($2))
             WHERE instance_id = $1",
        )
        .bind(instance_id)
        .bind(&req.admitted)
        .execute(&mut *tx)
        .await?;

        update_instance_status(&mut tx, instance_id, status, next).await?;
        tx.commit().await?;
        Ok(())
    }
    .await;
    result.map_err(reply_error)?;

    Ok((StatusCode::OK, Json(json!({ "message": "Admission closed" }))))
}

#[derive(Debug, Deserialize)]
struct AttendanceRequest {
    attended: Vec<i32>,
}

// POST /api/workshop-instances/{instance_id}/attendance
async fn record_attendance(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(instance_id): Path<i64>,
    Json(req): Json<AttendanceRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    ensure_can_manage_instance(&state.db.pool, instance_id, &member).await?;

    let result: Result<(), ServiceError> = async {
        let mut tx = state.db.pool.begin().await.map_err(ServiceError::Database)?;

        let status = lock_instance_status(&mut tx, instance_id).await?;
        let next = status.record_attendance()?;

        // Only admitted members can be marked as attended
        sqlx::query(
            "UPDATE instance_participants
             SET attended = (admitted AND member_id = ANY($2))
             WHERE instance_id = $1",
        )
        .bind(instance_id)
        .bind(&req.attended)
        .execute(&mut *tx)
        .await?;

        update_instance_status(&mut tx, instance_id, status, next).await?;
        tx.commit().await?;
        Ok(())
    }
    .await;
    result.map_err(reply_error)?;

    Ok((StatusCode::OK, Json(json!({ "message": "Attendance recorded" }))))
}

// POST /api/workshop-instances/{instance_id}/complete
async fn complete_instance(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(instance_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    ensure_can_manage_instance(&state.db.pool, instance_id, &member).await?;

    let result: Result<(), ServiceError> = async {
        let mut tx = state.db.pool.begin().await.map_err(ServiceError::Database)?;
        let status = lock_instance_status(&mut tx, instance_id).await?;
        let next = status.complete()?;
        update_instance_status(&mut tx, instance_id, status, next).await?;
        tx.commit().await?;
        Ok(())
    }
    .await;
    result.map_err(reply_error)?;

    Ok((StatusCode::OK, Json(json!({ "message": "Workshop instance completed" }))))
}

/* ---------- FEEDBACK ---------- */

// GET /api/feedback-questions
async fn list_feedback_questions(
    State(state): State<Arc<AppState>>,
    _member: AuthMember,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let questions = sqlx::query_as::<_, FeedbackQuestion>(
        "SELECT question_id, question, is_numeric FROM feedback_questions ORDER BY question_id",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    Ok((StatusCode::OK, Json(questions)))
}

#[derive(Debug, Deserialize)]
struct FeedbackAnswerInput {
    question_id: i32,
    /// 1-6, or 0 for "no answer". Absent for free-text questions.
    grade: Option<i16>,
    answer_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    answers: Vec<FeedbackAnswerInput>,
}

/// Checks every answer against the question catalog (`(id, is_numeric)`
/// pairs): the question must exist and a grade may only be given on a
/// numeric question.
fn check_answers(
    questions: &[(i32, bool)],
    answers: &[FeedbackAnswerInput],
) -> Result<(), ServiceError> {
    for answer in answers {
        let is_numeric = questions
            .iter()
            .find(|(id, _)| *id == answer.question_id)
            .map(|(_, numeric)| *numeric)
            .ok_or(ServiceError::UnknownQuestion(answer.question_id))?;
        if !is_numeric && answer.grade.is_some() {
            return Err(ServiceError::GradeOnTextQuestion(answer.question_id));
        }
    }
    Ok(())
}

// POST /api/workshop-instances/{instance_id}/feedback
async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(instance_id): Path<i64>,
    Json(req): Json<FeedbackRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    for answer in &req.answers {
        if let Some(grade) = answer.grade {
            if !(0..=6).contains(&grade) {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "grade must be between 0 (no answer) and 6".to_string(),
                ));
            }
        }
    }

    let result: Result<(), ServiceError> = async {
        let mut tx = state.db.pool.begin().await.map_err(ServiceError::Database)?;

        let status = lock_instance_status(&mut tx, instance_id).await?;

        let questions: Vec<(i32, bool)> =
            sqlx::query_as("SELECT question_id, is_numeric FROM feedback_questions")
                .fetch_all(&mut *tx)
                .await?;
        check_answers(&questions, &req.answers)?;

        let attended: Option<Option<bool>> = sqlx::query_scalar(
            "SELECT attended FROM instance_participants
             WHERE instance_id = $1 AND member_id = $2",
        )
        .bind(instance_id)
        .bind(member.member_id)
        .fetch_optional(&mut *tx)
        .await?;
        let attended = attended.flatten().unwrap_or(false);

        let already_submitted: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM instance_feedback
              WHERE instance_id = $1 AND member_id = $2)",
        )
        .bind(instance_id)
        .bind(member.member_id)
        .fetch_one(&mut *tx)
        .await?;

        can_submit_feedback(status, attended, already_submitted)?;

        sqlx::query(
            "INSERT INTO instance_feedback (instance_id, member_id, submitted_at)
             VALUES ($1, $2, $3)",
        )
        .bind(instance_id)
        .bind(member.member_id)
        .bind(Utc::now().naive_utc())
        .execute(&mut *tx)
        .await?;

        for answer in &req.answers {
            sqlx::query(
                "INSERT INTO instance_feedback_answers
                     (instance_id, member_id, question_id, grade, answer_text)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(instance_id)
            .bind(member.member_id)
            .bind(answer.question_id)
            .bind(answer.grade)
            .bind(&answer.answer_text)
            .execute(&mut *tx)
            .await?;
        }

        // Refresh the overall grade; 0 is the "no answer" sentinel
        sqlx::query(
            "UPDATE workshop_instances
             SET grade = (SELECT AVG(grade)::float8 FROM instance_feedback_answers
                          WHERE instance_id = $1 AND grade > 0)
             WHERE instance_id = $1",
        )
        .bind(instance_id)
        .execute(&mut *tx)
        .await?;

        // Once every attendee has submitted, the instance completes itself
        if status == InstanceStatus::FeedbackPending {
            let (attendees, submissions): (i64, i64) = sqlx::query_as(
                "SELECT
                     (SELECT COUNT(*) FROM instance_participants
                      WHERE instance_id = $1 AND attended),
                     (SELECT COUNT(*) FROM instance_feedback
                      WHERE instance_id = $1)",
            )
            .bind(instance_id)
            .fetch_one(&mut *tx)
            .await?;

            if submissions >= attendees {
                let next = status.complete()?;
                update_instance_status(&mut tx, instance_id, status, next).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
    .await;
    result.map_err(reply_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Feedback submitted" })),
    ))
}

// GET /api/workshop-instances/{instance_id}/feedback
async fn feedback_summary(
    State(state): State<Arc<AppState>>,
    member: AuthMember,
    Path(instance_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    ensure_can_manage_instance(&state.db.pool, instance_id, &member).await?;

    let instance = sqlx::query_as::<_, WorkshopInstance>(
        "SELECT instance_id, workshop_id, date, start_time, end_time, location,
                target_audience, max_participants, status, grade
         FROM workshop_instances WHERE instance_id = $1",
    )
    .bind(instance_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| (StatusCode::NOT_FOUND, "Workshop instance not found".to_string()))?;

    let status = InstanceStatus::from_db(&instance.status)
        .ok_or_else(|| db_error(sqlx::Error::Decode("unknown instance status".into())))?;
    if !status.feedback_visible() {
        return Err(reply_error(ServiceError::Domain(
            DomainError::InvalidLifecycleTransition {
                from: status,
                action: "view feedback",
            },
        )));
    }

    let questions = sqlx::query_as::<_, QuestionAverage>(
        "SELECT q.question_id, q.question,
                AVG(NULLIF(a.grade, 0))::float8 AS average,
                COUNT(a.grade) AS answers
         FROM feedback_questions q
         LEFT JOIN instance_feedback_answers a
           ON a.question_id = q.question_id AND a.instance_id = $1
         WHERE q.is_numeric
         GROUP BY q.question_id, q.question
         ORDER BY q.question_id",
    )
    .bind(instance_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    // Free-text answers stay anonymous; no member ids in the summary
    let comments = sqlx::query_as::<_, TextAnswer>(
        "SELECT question_id, answer_text
         FROM instance_feedback_answers
         WHERE instance_id = $1 AND answer_text IS NOT NULL
         ORDER BY question_id",
    )
    .bind(instance_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(db_error)?;

    let submissions = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM instance_feedback WHERE instance_id = $1",
    )
    .bind(instance_id)
    .fetch_one(&state.db.pool)
    .await
    .map_err(db_error)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": status,
            "grade": instance.grade,
            "submissions": submissions,
            "questions": questions,
            "comments": comments,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(question_id: i32, grade: i16) -> FeedbackAnswerInput {
        FeedbackAnswerInput {
            question_id,
            grade: Some(grade),
            answer_text: None,
        }
    }

    #[test]
    fn answers_must_reference_known_questions() {
        let catalog = [(1, true), (5, false)];
        assert!(check_answers(&catalog, &[graded(1, 4)]).is_ok());
        assert!(matches!(
            check_answers(&catalog, &[graded(99, 4)]),
            Err(ServiceError::UnknownQuestion(99))
        ));
    }

    #[test]
    fn grade_on_a_text_question_is_rejected() {
        let catalog = [(5, false)];
        assert!(matches!(
            check_answers(&catalog, &[graded(5, 3)]),
            Err(ServiceError::GradeOnTextQuestion(5))
        ));

        let text = FeedbackAnswerInput {
            question_id: 5,
            grade: None,
            answer_text: Some("more snacks".into()),
        };
        assert!(check_answers(&catalog, &[text]).is_ok());
    }
}
