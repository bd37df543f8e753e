use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Reusable workshop template, independent of any scheduled occurrence.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Workshop {
    pub workshop_id: i64,
    pub name: String,
    pub description: Option<String>,
    /// "mandatory" | "optional" | "external"
    pub category: String,
}

/// One scheduled occurrence of a workshop. `status` holds the lifecycle
/// state as its DB string; parse with `InstanceStatus::from_db`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkshopInstance {
    pub instance_id: i64,
    pub workshop_id: i64,
    pub date: NaiveDate,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub target_audience: Option<String>,
    pub max_participants: Option<i32>,
    pub status: String,
    pub grade: Option<f64>,
}
