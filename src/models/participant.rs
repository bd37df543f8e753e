use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use crate::domain::RosterEntry;

/// Roster row as stored, joined with the member fields the UI shows.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ParticipantRow {
    pub member_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub member_status: String,
    pub registered_at: NaiveDateTime,
}

impl From<ParticipantRow> for RosterEntry {
    fn from(row: ParticipantRow) -> Self {
        RosterEntry {
            member_id: row.member_id,
            first_name: row.first_name,
            last_name: row.last_name,
            member_status: row.member_status,
            registered_at: row.registered_at,
        }
    }
}

/// Working Weekend roster row with the extra travel fields. `arrival` and
/// `departure` hold the raw slot codes; the controllers map them to the
/// display vocabulary.
#[derive(Debug, Clone, FromRow)]
pub struct WwParticipantRow {
    pub member_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub member_status: String,
    pub registered_at: NaiveDateTime,
    pub arrival: String,
    pub departure: String,
    pub car: bool,
    pub seats: i32,
    pub vegetarian: bool,
    pub comment: Option<String>,
}
