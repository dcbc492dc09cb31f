// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::exam::{CreateExamRequest, Exam, ExamWithCount},
};

/// Creates a new exam.
pub async fn create_exam(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO exams (title, description, duration_minutes, passing_score)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.duration_minutes)
    .bind(payload.passing_score)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create exam: {:?}", e);
        AppError::StorageError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Lists all exams with their question counts.
pub async fn list_exams(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let exams = sqlx::query_as::<_, ExamWithCount>(
        "SELECT e.id, e.title, e.description, e.duration_minutes, e.passing_score,
                COUNT(q.id) AS question_count,
                e.created_at
         FROM exams e
         LEFT JOIN questions q ON q.exam_id = e.id
         GROUP BY e.id
         ORDER BY e.id DESC",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(exams))
}

/// Retrieves a single exam by ID.
pub async fn get_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = sqlx::query_as::<_, Exam>(
        "SELECT id, title, description, duration_minutes, passing_score, created_at
         FROM exams WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    Ok(Json(exam))
}
