// src/handlers/attempt.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    engine,
    error::AppError,
    models::{
        attempt::{AnswerDetail, Attempt, AttemptDetail, AttemptResult, SubmitAttemptRequest},
        exam::Exam,
        question::{CorrectAnswer, QuestionStatus, QuestionType},
    },
};

/// Answer key row for grading.
#[derive(sqlx::FromRow)]
struct AnswerKey {
    id: i64,
    #[sqlx(rename = "type")]
    question_type: QuestionType,
    correct_answer: SqlJson<CorrectAnswer>,
    points: i32,
}

/// One graded question staged for storage.
struct GradedAnswer {
    question_id: i64,
    response: Option<serde_json::Value>,
    is_correct: bool,
    points_awarded: i32,
}

/// Submits a candidate's answers for an exam and records the graded attempt.
///
/// * Fetches the exam's active questions as the answer key.
/// * Grades each question against its canonical answer.
/// * Persists the attempt and its per-question rows in one transaction.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.answers.is_empty() {
        return Err(AppError::BadRequest("No answers submitted".to_string()));
    }

    let exam = sqlx::query_as::<_, Exam>(
        "SELECT id, title, description, duration_minutes, passing_score, created_at
         FROM exams WHERE id = $1",
    )
    .bind(payload.exam_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    let keys = sqlx::query_as::<_, AnswerKey>(
        "SELECT id, type, correct_answer, points
         FROM questions
         WHERE exam_id = $1 AND status = $2",
    )
    .bind(exam.id)
    .bind(QuestionStatus::Active)
    .fetch_all(&pool)
    .await?;

    if keys.is_empty() {
        return Err(AppError::BadRequest("Exam has no active questions".to_string()));
    }

    let mut score = 0;
    let mut max_score = 0;
    let mut correct_count = 0;
    let mut graded: Vec<GradedAnswer> = Vec::with_capacity(keys.len());

    for key in &keys {
        max_score += key.points;
        let response = payload.answers.get(&key.id);

        let is_correct = match response {
            Some(value) => engine::grade(key.question_type, &key.correct_answer.0, value),
            None => false,
        };
        let points_awarded = if is_correct { key.points } else { 0 };
        if is_correct {
            score += points_awarded;
            correct_count += 1;
        }

        graded.push(GradedAnswer {
            question_id: key.id,
            response: response.cloned(),
            is_correct,
            points_awarded,
        });
    }

    let percentage = if max_score > 0 {
        (score as f64 / max_score as f64) * 100.0
    } else {
        0.0
    };
    let passed = percentage >= exam.passing_score as f64;

    let mut tx = pool.begin().await?;

    let attempt_id: i64 = sqlx::query_scalar(
        "INSERT INTO attempts (exam_id, candidate, score, max_score, passed)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(exam.id)
    .bind(&payload.candidate)
    .bind(score)
    .bind(max_score)
    .bind(passed)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record attempt: {:?}", e);
        AppError::StorageError(e.to_string())
    })?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO attempt_answers (attempt_id, question_id, response, is_correct, points_awarded) ",
    );
    builder.push_values(&graded, |mut row, answer| {
        row.push_bind(attempt_id)
            .push_bind(answer.question_id)
            .push_bind(answer.response.as_ref().map(SqlJson))
            .push_bind(answer.is_correct)
            .push_bind(answer.points_awarded);
    });
    builder.build().execute(&mut *tx).await.map_err(|e| {
        tracing::error!("Failed to record attempt answers: {:?}", e);
        AppError::StorageError(e.to_string())
    })?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(AttemptResult {
            attempt_id,
            exam_id: exam.id,
            candidate: payload.candidate,
            score,
            max_score,
            percentage,
            passed,
            correct_count,
            total_questions: keys.len(),
        }),
    ))
}

/// Retrieves a graded attempt with its per-question results.
pub async fn get_attempt(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(
        "SELECT id, exam_id, candidate, score, max_score, passed, created_at
         FROM attempts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    let answers = sqlx::query_as::<_, AnswerDetail>(
        "SELECT a.question_id, q.text AS question_text, a.response, a.is_correct, a.points_awarded
         FROM attempt_answers a
         JOIN questions q ON q.id = a.question_id
         WHERE a.attempt_id = $1
         ORDER BY a.question_id",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(AttemptDetail {
        id: attempt.id,
        exam_id: attempt.exam_id,
        candidate: attempt.candidate,
        score: attempt.score,
        max_score: attempt.max_score,
        passed: attempt.passed,
        answers,
        created_at: attempt.created_at,
    }))
}
