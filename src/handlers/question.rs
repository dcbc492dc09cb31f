// src/handlers/question.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction, types::Json as SqlJson};
use validator::Validate;

use crate::{
    engine::{self, AnswerPayload, Mode, StagedOption},
    error::AppError,
    models::question::{
        CorrectAnswer, CreateQuestionRequest, ExamSummary, Question, QuestionListItem,
        QuestionOption, QuestionResponse, QuestionStatus, QuestionType, UpdateQuestionRequest,
    },
};

const QUESTION_COLUMNS: &str = "id, text, type, status, cognitive_type, category, difficulty, \
     points, scenario, explanation, correct_answer, left_column, right_column, exam_id, \
     created_at, updated_at";

/// Loads the full question-with-options-and-exam-summary projection.
async fn load_question(pool: &PgPool, id: i64) -> Result<QuestionResponse, AppError> {
    let question = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let options = sqlx::query_as::<_, QuestionOption>(
        "SELECT id, question_id, text, is_correct, position
         FROM question_options WHERE question_id = $1
         ORDER BY position, id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let exam = match question.exam_id {
        Some(exam_id) => {
            sqlx::query_as::<_, ExamSummary>("SELECT id, title FROM exams WHERE id = $1")
                .bind(exam_id)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };

    Ok(QuestionResponse::assemble(question, options, exam))
}

/// Verifies the referenced exam exists before any write is issued.
async fn ensure_exam_exists(pool: &PgPool, exam_id: i64) -> Result<(), AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM exams WHERE id = $1")
        .bind(exam_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::BadRequest(format!("Exam {} does not exist", exam_id)))?;
    Ok(())
}

/// Replaces the question's option set inside the caller's transaction:
/// destroy all prior rows, bulk-insert the staged set.
async fn replace_options(
    tx: &mut Transaction<'_, Postgres>,
    question_id: i64,
    options: &[StagedOption],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM question_options WHERE question_id = $1")
        .bind(question_id)
        .execute(&mut **tx)
        .await?;

    if options.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO question_options (question_id, text, is_correct, position) ");
    builder.push_values(options, |mut row, opt| {
        row.push_bind(question_id)
            .push_bind(&opt.text)
            .push_bind(opt.is_correct)
            .push_bind(opt.position);
    });
    builder.build().execute(&mut **tx).await?;

    Ok(())
}

/// Query parameters for listing questions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub exam_id: Option<i64>,
    pub status: Option<QuestionStatus>,
}

/// Lists questions, optionally filtered by exam and status.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions
         WHERE ($1::BIGINT IS NULL OR exam_id = $1)
           AND ($2::question_status IS NULL OR status = $2)
         ORDER BY id DESC"
    ))
    .bind(params.exam_id)
    .bind(params.status)
    .fetch_all(&pool)
    .await?;

    let items: Vec<QuestionListItem> = questions.into_iter().map(QuestionListItem::from).collect();
    Ok(Json(items))
}

/// Retrieves a single question (full projection) by ID.
pub async fn get_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = load_question(&pool, id).await?;
    Ok(Json(question))
}

/// Creates a new question.
///
/// Schema validation and the normalization engine both run before any write;
/// the insert of the question and its staged options is one transaction.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(exam_id) = payload.exam_id {
        ensure_exam_exists(&pool, exam_id).await?;
    }

    let normalized = engine::normalize(
        payload.question_type,
        Mode::Create,
        &AnswerPayload {
            correct_answer: payload.correct_answer.as_ref(),
            options: payload.options.as_deref(),
            left_column: payload.left_column.as_deref(),
            right_column: payload.right_column.as_deref(),
            correct_matches: payload.correct_matches.as_ref(),
        },
    )?;

    // Unsupported types may legitimately carry no answer; store a JSON null.
    let correct_answer = normalized
        .correct_answer
        .unwrap_or(CorrectAnswer::Raw(serde_json::Value::Null));
    let (left_column, right_column) = match normalized.columns {
        Some((left, right)) => (Some(left), Some(right)),
        None => (None, None),
    };

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO questions
             (text, type, cognitive_type, category, difficulty, points,
              scenario, explanation, correct_answer, left_column, right_column, exam_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING id",
    )
    .bind(&payload.text)
    .bind(payload.question_type)
    .bind(&payload.cognitive_type)
    .bind(&payload.category)
    .bind(&payload.difficulty)
    .bind(payload.points)
    .bind(&payload.scenario)
    .bind(&payload.explanation)
    .bind(SqlJson(&correct_answer))
    .bind(left_column.map(SqlJson))
    .bind(right_column.map(SqlJson))
    .bind(payload.exam_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::StorageError(e.to_string())
    })?;

    if let Some(options) = &normalized.options {
        replace_options(&mut tx, id, options).await?;
    }

    tx.commit().await?;

    let question = load_question(&pool, id).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// Updates a question by ID.
///
/// The normalization engine re-runs only when the payload touches a
/// type-specific field; otherwise the stored answer and options stay as they
/// are. Scalar updates, answer replacement and option replacement commit as
/// one transaction or not at all.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let existing = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if let Some(exam_id) = payload.exam_id {
        ensure_exam_exists(&pool, exam_id).await?;
    }

    // The explicit new type wins; otherwise the stored type governs the rules.
    let effective_type = payload.question_type.unwrap_or(existing.question_type);

    let normalized = if payload.touches_answer() {
        Some(engine::normalize(
            effective_type,
            Mode::Update,
            &AnswerPayload {
                correct_answer: payload.correct_answer.as_ref(),
                options: payload.options.as_deref(),
                left_column: payload.left_column.as_deref(),
                right_column: payload.right_column.as_deref(),
                correct_matches: payload.correct_matches.as_ref(),
            },
        )?)
    } else {
        None
    };

    let mut tx = pool.begin().await?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE questions SET updated_at = now()");

    if let Some(text) = &payload.text {
        builder.push(", text = ").push_bind(text);
    }
    if let Some(question_type) = payload.question_type {
        builder.push(", type = ").push_bind(question_type);
    }
    if let Some(status) = payload.status {
        builder.push(", status = ").push_bind(status);
    }
    if let Some(cognitive_type) = &payload.cognitive_type {
        builder.push(", cognitive_type = ").push_bind(cognitive_type);
    }
    if let Some(category) = &payload.category {
        builder.push(", category = ").push_bind(category);
    }
    if let Some(difficulty) = &payload.difficulty {
        builder.push(", difficulty = ").push_bind(difficulty);
    }
    if let Some(points) = payload.points {
        builder.push(", points = ").push_bind(points);
    }
    if let Some(scenario) = &payload.scenario {
        builder.push(", scenario = ").push_bind(scenario);
    }
    if let Some(explanation) = &payload.explanation {
        builder.push(", explanation = ").push_bind(explanation);
    }
    if let Some(exam_id) = payload.exam_id {
        builder.push(", exam_id = ").push_bind(exam_id);
    }

    if let Some(normalized) = &normalized {
        if let Some(correct_answer) = &normalized.correct_answer {
            builder.push(", correct_answer = ").push_bind(SqlJson(correct_answer));
        }
        if let Some((left, right)) = &normalized.columns {
            builder.push(", left_column = ").push_bind(SqlJson(left));
            builder.push(", right_column = ").push_bind(SqlJson(right));
        } else if effective_type != QuestionType::Matching {
            // A type change away from MATCHING must not leave stale columns
            // behind on the row.
            builder.push(", left_column = NULL, right_column = NULL");
        }
    }

    builder.push(" WHERE id = ").push_bind(id);

    builder.build().execute(&mut *tx).await.map_err(|e| {
        tracing::error!("Failed to update question {}: {:?}", id, e);
        AppError::StorageError(e.to_string())
    })?;

    if let Some(normalized) = &normalized {
        if let Some(options) = &normalized.options {
            replace_options(&mut tx, id, options).await?;
        }
    }

    tx.commit().await?;

    let question = load_question(&pool, id).await?;
    Ok(Json(question))
}

/// Deletes a question by ID.
///
/// Usage guard first: a question referenced by any recorded attempt answer is
/// archived instead (soft delete). Otherwise options and question are
/// destroyed in one transaction.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<axum::response::Response, AppError> {
    let has_usage: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM attempt_answers WHERE question_id = $1)",
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;

    if has_usage {
        let result = sqlx::query("UPDATE questions SET status = $1, updated_at = now() WHERE id = $2")
            .bind(QuestionStatus::Archived)
            .bind(id)
            .execute(&pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Question not found".to_string()));
        }

        tracing::info!("Question {} has recorded attempts; archived instead of deleted", id);
        let question = load_question(&pool, id).await?;
        return Ok(Json(question).into_response());
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM question_options WHERE question_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question {}: {:?}", id, e);
            AppError::StorageError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
