use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Member {
    pub member_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub member_status: String,
    pub is_active: bool,
}

/// Member projection shown next to events (organizers) and workshop
/// instances (instructors).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct MemberField {
    pub member_id: i32,
    pub first_name: String,
    pub last_name: String,
}

impl Member {
    pub async fn find_by_email(
        email: &str,
        db: &crate::database::Database,
    ) -> Result<Option<Member>, sqlx::Error> {
        sqlx::query_as::<_, Member>(
            "SELECT member_id, first_name, last_name, email, password_hash, member_status, is_active
             FROM members WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&db.pool)
        .await
    }

    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}
