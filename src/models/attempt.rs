// src/models/attempt.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'attempts' table in the database.
/// Stores one graded submission of an exam by a candidate.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub exam_id: i64,
    pub candidate: String,
    pub score: i32,
    pub max_score: i32,
    pub passed: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for submitting an exam attempt.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptRequest {
    pub exam_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub candidate: String,

    /// Candidate's answers map.
    /// Key: Question ID (i64)
    /// Value: the submitted answer in the shape of the question type.
    pub answers: HashMap<i64, serde_json::Value>,
}

/// Grading summary returned after submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub attempt_id: i64,
    pub exam_id: i64,
    pub candidate: String,
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub passed: bool,
    pub correct_count: usize,
    pub total_questions: usize,
}

/// One graded question in the attempt detail projection.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDetail {
    pub question_id: i64,
    pub question_text: String,
    pub response: Option<Json<serde_json::Value>>,
    pub is_correct: bool,
    pub points_awarded: i32,
}

/// Attempt detail projection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDetail {
    pub id: i64,
    pub exam_id: i64,
    pub candidate: String,
    pub score: i32,
    pub max_score: i32,
    pub passed: bool,
    pub answers: Vec<AnswerDetail>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
