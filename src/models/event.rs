use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::{classify, EventType};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub event_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub registration_start: Option<NaiveDateTime>,
    pub registration_end: Option<NaiveDateTime>,
    pub max_participants: Option<i32>,
    pub ww: bool,
    pub network: bool,
    pub jbt_goes: bool,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        classify(self.ww, self.network, self.jbt_goes)
    }
}
