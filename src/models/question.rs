// src/models/question.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Question kind. Only the first three carry a validation/grading rule;
/// SHORT_ANSWER and ESSAY are stored through the raw pass-through fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "question_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Matching,
    ShortAnswer,
    Essay,
}

/// Question lifecycle. Created ACTIVE; a delete against a question with
/// recorded usage lands in ARCHIVED instead of destroying the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "question_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionStatus {
    Active,
    Inactive,
    Archived,
    UnderReview,
}

/// Canonical correct answer, one variant per question type.
///
/// Serialized untagged so the stored JSONB keeps the plain polymorphic shape
/// (string, bool, or object) that clients exchange. Always derived by the
/// engine, never trusted as supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Bool(bool),
    Matches(BTreeMap<String, String>),
    Text(String),
    Raw(serde_json::Value),
}

impl From<serde_json::Value> for CorrectAnswer {
    fn from(value: serde_json::Value) -> Self {
        // Untagged deserialization from a Value cannot fail: Raw is a catch-all.
        serde_json::from_value(value.clone()).unwrap_or(CorrectAnswer::Raw(value))
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub text: String,

    /// Mapped from the database column 'type' since `type` is a reserved
    /// keyword in Rust.
    #[sqlx(rename = "type")]
    pub question_type: QuestionType,

    pub status: QuestionStatus,

    pub cognitive_type: String,
    pub category: String,
    pub difficulty: String,

    /// Score weight, 1 to 10.
    pub points: i32,

    pub scenario: Option<String>,
    pub explanation: Option<String>,

    /// Canonical answer, stored as JSONB.
    pub correct_answer: Json<CorrectAnswer>,

    /// Matching columns; NULL for every other question type.
    pub left_column: Option<Json<Vec<String>>>,
    pub right_column: Option<Json<Vec<String>>>,

    /// Foreign reference only; the exam must exist when set.
    pub exam_id: Option<i64>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'question_options' table in the database.
/// Rows are exclusively owned by their question and replaced as a set.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
    /// Display/tie-break order (the API field `order`).
    pub position: i32,
}

/// One option as supplied by the client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionInput {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    /// Falsy/zero order falls back to the 1-based list position.
    #[serde(default)]
    pub order: Option<i32>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[validate(length(
        min = 10,
        max = 2000,
        message = "Question text must be between 10 and 2000 characters."
    ))]
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 50))]
    pub cognitive_type: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(length(min = 1, max = 50))]
    pub difficulty: String,
    #[validate(range(min = 1, max = 10, message = "Points must be between 1 and 10."))]
    pub points: i32,
    #[validate(length(max = 4000))]
    pub scenario: Option<String>,
    #[validate(length(max = 4000))]
    pub explanation: Option<String>,
    pub correct_answer: Option<serde_json::Value>,
    #[validate(custom(function = validate_option_texts))]
    pub options: Option<Vec<OptionInput>>,
    pub left_column: Option<Vec<String>>,
    pub right_column: Option<Vec<String>>,
    pub correct_matches: Option<BTreeMap<String, String>>,
    pub exam_id: Option<i64>,
}

/// DTO for updating a question. Fields are optional; type-specific fields
/// only trigger re-validation when present.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionRequest {
    #[validate(length(
        min = 10,
        max = 2000,
        message = "Question text must be between 10 and 2000 characters."
    ))]
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    pub status: Option<QuestionStatus>,
    #[validate(length(min = 1, max = 50))]
    pub cognitive_type: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub difficulty: Option<String>,
    #[validate(range(min = 1, max = 10, message = "Points must be between 1 and 10."))]
    pub points: Option<i32>,
    #[validate(length(max = 4000))]
    pub scenario: Option<String>,
    #[validate(length(max = 4000))]
    pub explanation: Option<String>,
    pub correct_answer: Option<serde_json::Value>,
    #[validate(custom(function = validate_option_texts))]
    pub options: Option<Vec<OptionInput>>,
    pub left_column: Option<Vec<String>>,
    pub right_column: Option<Vec<String>>,
    pub correct_matches: Option<BTreeMap<String, String>>,
    pub exam_id: Option<i64>,
}

impl UpdateQuestionRequest {
    /// Whether the payload touches any type-specific field. Only then does
    /// the validation engine run; otherwise the stored answer and options
    /// are left untouched.
    pub fn touches_answer(&self) -> bool {
        self.question_type.is_some()
            || self.options.is_some()
            || self.correct_answer.is_some()
            || self.left_column.is_some()
            || self.right_column.is_some()
            || self.correct_matches.is_some()
    }
}

fn validate_option_texts(options: &[OptionInput]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.text.trim().is_empty() {
            return Err(validator::ValidationError::new("option_text_empty"));
        }
        if opt.text.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

/// Exam fields joined into the question projection.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExamSummary {
    pub id: i64,
    pub title: String,
}

/// One option in the question projection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResponse {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
    pub order: i32,
}

impl From<QuestionOption> for OptionResponse {
    fn from(row: QuestionOption) -> Self {
        Self {
            id: row.id,
            text: row.text,
            is_correct: row.is_correct,
            order: row.position,
        }
    }
}

/// Row projection for the list endpoint: same field naming as the full
/// projection, without the option and exam joins.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionListItem {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub status: QuestionStatus,
    pub cognitive_type: String,
    pub category: String,
    pub difficulty: String,
    pub points: i32,
    pub scenario: Option<String>,
    pub explanation: Option<String>,
    pub correct_answer: CorrectAnswer,
    pub left_column: Option<Vec<String>>,
    pub right_column: Option<Vec<String>>,
    pub exam_id: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Question> for QuestionListItem {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            text: question.text,
            question_type: question.question_type,
            status: question.status,
            cognitive_type: question.cognitive_type,
            category: question.category,
            difficulty: question.difficulty,
            points: question.points,
            scenario: question.scenario,
            explanation: question.explanation,
            correct_answer: question.correct_answer.0,
            left_column: question.left_column.map(|c| c.0),
            right_column: question.right_column.map(|c| c.0),
            exam_id: question.exam_id,
            created_at: question.created_at,
            updated_at: question.updated_at,
        }
    }
}

/// Full question-with-options-and-exam-summary projection returned by every
/// write path and by the read endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub status: QuestionStatus,
    pub cognitive_type: String,
    pub category: String,
    pub difficulty: String,
    pub points: i32,
    pub scenario: Option<String>,
    pub explanation: Option<String>,
    pub correct_answer: CorrectAnswer,
    pub left_column: Option<Vec<String>>,
    pub right_column: Option<Vec<String>>,
    pub options: Vec<OptionResponse>,
    pub exam: Option<ExamSummary>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl QuestionResponse {
    pub fn assemble(
        question: Question,
        options: Vec<QuestionOption>,
        exam: Option<ExamSummary>,
    ) -> Self {
        Self {
            id: question.id,
            text: question.text,
            question_type: question.question_type,
            status: question.status,
            cognitive_type: question.cognitive_type,
            category: question.category,
            difficulty: question.difficulty,
            points: question.points,
            scenario: question.scenario,
            explanation: question.explanation,
            correct_answer: question.correct_answer.0,
            left_column: question.left_column.map(|c| c.0),
            right_column: question.right_column.map(|c| c.0),
            options: options.into_iter().map(OptionResponse::from).collect(),
            exam,
            created_at: question.created_at,
            updated_at: question.updated_at,
        }
    }
}
