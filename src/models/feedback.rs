use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FeedbackQuestion {
    pub question_id: i32,
    pub question: String,
    pub is_numeric: bool,
}

/// Aggregated numeric answer for one question of an instance. Grade 0 is
/// the "no answer" sentinel and is excluded from the average upstream.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionAverage {
    pub question_id: i32,
    pub question: String,
    pub average: Option<f64>,
    pub answers: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TextAnswer {
    pub question_id: i32,
    pub answer_text: String,
}
