use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::models::Member;

/// Permission required to manage events (create/update/delete, roster
/// administration). Matches the permission table seeded by the migrations.
pub const PERMISSION_EVENTS: i32 = 8;
/// Permission required to manage workshops and their instances.
pub const PERMISSION_WORKSHOPS: i32 = 4;

#[derive(Debug, Clone)]
pub struct AuthMember {
    pub member_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub member_status: String,
    pub permissions: Vec<i32>,
}

impl AuthMember {
    /// True if the member holds at least one of the given permission ids.
    pub fn has_any_permission(&self, required: &[i32]) -> bool {
        required.iter().any(|id| self.permissions.contains(id))
    }
}

// Basic Auth extractor: credentials against the members table, then the
// member's permission set is loaded alongside
impl FromRequestParts<Arc<crate::AppState>> for AuthMember {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

        let mut parts_iter = credentials.splitn(2, ':');
        let email = parts_iter.next().ok_or(StatusCode::UNAUTHORIZED)?;
        let password = parts_iter.next().ok_or(StatusCode::UNAUTHORIZED)?;

        let member = Member::find_by_email(email, &state.db)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        if !member.is_active || !member.verify_password(password) {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let permissions: Vec<i32> = sqlx::query_scalar(
            "SELECT permission_id FROM member_has_permission WHERE member_id = $1",
        )
        .bind(member.member_id)
        .fetch_all(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok(AuthMember {
            member_id: member.member_id,
            first_name: member.first_name,
            last_name: member.last_name,
            member_status: member.member_status,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_with(permissions: Vec<i32>) -> AuthMember {
        AuthMember {
            member_id: 1,
            first_name: "Test".into(),
            last_name: "Member".into(),
            member_status: "aktiv".into(),
            permissions,
        }
    }

    #[test]
    fn any_of_the_required_permissions_suffices() {
        let m = member_with(vec![4]);
        assert!(m.has_any_permission(&[PERMISSION_EVENTS, PERMISSION_WORKSHOPS]));
        assert!(!m.has_any_permission(&[PERMISSION_EVENTS]));
        assert!(!member_with(vec![]).has_any_permission(&[PERMISSION_WORKSHOPS]));
    }
}
