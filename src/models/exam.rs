// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    /// Passing threshold as a percentage, 0 to 100.
    pub passing_score: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters."))]
    pub title: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: i32,
    #[validate(range(min = 0, max = 100, message = "Passing score must be between 0 and 100."))]
    pub passing_score: i32,
}

/// Exam projection with its question count.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExamWithCount {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub passing_score: i32,
    pub question_count: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
