// src/engine.rs
//
// Validation and normalization of type-specific question payloads, plus the
// grading rule derived from the same canonical answers. Pure computation:
// both create and update handlers call into here before touching storage,
// so every structural failure is reported with no write attempted.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::models::question::{CorrectAnswer, OptionInput, QuestionType};

/// Structural violation of a type-specific answer payload.
/// Converted to a 422 at the handler boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Multiple choice needs at least 2 options.
    InvalidOptionCount(usize),
    /// Multiple choice needs exactly 1 option marked correct.
    InvalidCorrectCount(usize),
    /// True/false answer was not "true"/"false" (case-insensitive) or a bool.
    InvalidBooleanLiteral,
    /// Matching create without columns + matches, or one column without the other.
    MissingMatchingFields,
    /// A matching column has fewer than 2 entries.
    InvalidColumnLength,
    /// The two matching columns differ in length.
    ColumnLengthMismatch,
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::InvalidOptionCount(n) => {
                write!(f, "Multiple-choice questions require at least 2 options, got {}", n)
            }
            RuleError::InvalidCorrectCount(n) => {
                write!(f, "Exactly 1 option must be marked correct, got {}", n)
            }
            RuleError::InvalidBooleanLiteral => {
                write!(f, "True/false answer must be \"true\" or \"false\"")
            }
            RuleError::MissingMatchingFields => write!(
                f,
                "Matching questions require leftColumn, rightColumn and correctMatches together"
            ),
            RuleError::InvalidColumnLength => {
                write!(f, "Matching columns require at least 2 entries each")
            }
            RuleError::ColumnLengthMismatch => {
                write!(f, "leftColumn and rightColumn must have the same length")
            }
        }
    }
}

impl std::error::Error for RuleError {}

/// Whether matching fields are required (create) or individually optional
/// (update).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

/// The type-specific subset of a create/update request.
#[derive(Debug, Default)]
pub struct AnswerPayload<'a> {
    pub correct_answer: Option<&'a Value>,
    pub options: Option<&'a [OptionInput]>,
    pub left_column: Option<&'a [String]>,
    pub right_column: Option<&'a [String]>,
    pub correct_matches: Option<&'a BTreeMap<String, String>>,
}

/// An option row ready for storage, order already defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedOption {
    pub text: String,
    pub is_correct: bool,
    pub position: i32,
}

/// Outcome of a successful normalization.
///
/// `correct_answer: None` (matching updates that touch only the columns)
/// and `options: None` (unsupported types, or payloads that never stage
/// options) both mean "leave the stored value untouched".
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub correct_answer: Option<CorrectAnswer>,
    pub options: Option<Vec<StagedOption>>,
    /// Columns to persist alongside the answer; matching only.
    pub columns: Option<(Vec<String>, Vec<String>)>,
}

/// Derives the canonical `correct_answer` (and the option set to store) from
/// a type-specific payload, or fails with the specific rule violated.
pub fn normalize(
    question_type: QuestionType,
    mode: Mode,
    payload: &AnswerPayload,
) -> Result<Normalized, RuleError> {
    match question_type {
        QuestionType::MultipleChoice => normalize_multiple_choice(payload),
        QuestionType::TrueFalse => normalize_true_false(payload),
        QuestionType::Matching => normalize_matching(mode, payload),
        // Unsupported fallback: the raw supplied answer passes through
        // unchanged, stored options are not touched.
        QuestionType::ShortAnswer | QuestionType::Essay => Ok(Normalized {
            correct_answer: payload
                .correct_answer
                .map(|v| CorrectAnswer::from(v.clone())),
            options: None,
            columns: None,
        }),
    }
}

fn normalize_multiple_choice(payload: &AnswerPayload) -> Result<Normalized, RuleError> {
    let options = payload.options.unwrap_or(&[]);
    if options.len() < 2 {
        return Err(RuleError::InvalidOptionCount(options.len()));
    }

    let correct: Vec<&OptionInput> = options.iter().filter(|o| o.is_correct).collect();
    if correct.len() != 1 {
        return Err(RuleError::InvalidCorrectCount(correct.len()));
    }

    Ok(Normalized {
        correct_answer: Some(CorrectAnswer::Text(correct[0].text.clone())),
        options: Some(stage_options(options)),
        columns: None,
    })
}

fn normalize_true_false(payload: &AnswerPayload) -> Result<Normalized, RuleError> {
    let answer = parse_boolean_literal(payload.correct_answer)?;

    Ok(Normalized {
        correct_answer: Some(CorrectAnswer::Bool(answer)),
        options: Some(vec![
            StagedOption {
                text: "True".to_string(),
                is_correct: answer,
                position: 1,
            },
            StagedOption {
                text: "False".to_string(),
                is_correct: !answer,
                position: 2,
            },
        ]),
        columns: None,
    })
}

fn normalize_matching(mode: Mode, payload: &AnswerPayload) -> Result<Normalized, RuleError> {
    if mode == Mode::Create
        && (payload.left_column.is_none()
            || payload.right_column.is_none()
            || payload.correct_matches.is_none())
    {
        return Err(RuleError::MissingMatchingFields);
    }

    // Columns only validate as a pair: a lone column can never satisfy the
    // length-equality rule against a stored counterpart.
    let columns = match (payload.left_column, payload.right_column) {
        (Some(left), Some(right)) => {
            if left.len() < 2 || right.len() < 2 {
                return Err(RuleError::InvalidColumnLength);
            }
            if left.len() != right.len() {
                return Err(RuleError::ColumnLengthMismatch);
            }
            Some((left.to_vec(), right.to_vec()))
        }
        (None, None) => None,
        _ => return Err(RuleError::MissingMatchingFields),
    };

    // Stored as-is; keys/values are not cross-checked against the columns.
    let correct_answer = payload
        .correct_matches
        .map(|m| CorrectAnswer::Matches(m.clone()));

    Ok(Normalized {
        correct_answer,
        options: Some(Vec::new()),
        columns,
    })
}

fn stage_options(options: &[OptionInput]) -> Vec<StagedOption> {
    options
        .iter()
        .enumerate()
        .map(|(i, o)| StagedOption {
            text: o.text.clone(),
            is_correct: o.is_correct,
            position: match o.order {
                Some(p) if p > 0 => p,
                _ => (i + 1) as i32,
            },
        })
        .collect()
}

/// Case-insensitive parse against the literal strings "true"/"false";
/// JSON booleans are accepted directly. Anything else is invalid.
fn parse_boolean_literal(value: Option<&Value>) -> Result<bool, RuleError> {
    match value {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(RuleError::InvalidBooleanLiteral),
        },
        _ => Err(RuleError::InvalidBooleanLiteral),
    }
}

/// Grades one submitted answer against the canonical stored answer.
/// Unsupported types never auto-grade.
pub fn grade(question_type: QuestionType, correct: &CorrectAnswer, response: &Value) -> bool {
    match (question_type, correct) {
        (QuestionType::MultipleChoice, CorrectAnswer::Text(answer)) => {
            // Strict string matching against the correct option's text.
            response.as_str() == Some(answer.as_str())
        }
        (QuestionType::TrueFalse, CorrectAnswer::Bool(answer)) => {
            // The submission obeys the same literal rule as authoring.
            parse_boolean_literal(Some(response)) == Ok(*answer)
        }
        (QuestionType::Matching, CorrectAnswer::Matches(answer)) => {
            match serde_json::from_value::<BTreeMap<String, String>>(response.clone()) {
                Ok(submitted) => &submitted == answer,
                Err(_) => false,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opt(text: &str, is_correct: bool, order: i32) -> OptionInput {
        OptionInput {
            text: text.to_string(),
            is_correct,
            order: Some(order),
        }
    }

    fn mc_payload(options: &[OptionInput]) -> AnswerPayload<'_> {
        AnswerPayload {
            options: Some(options),
            ..Default::default()
        }
    }

    #[test]
    fn multiple_choice_derives_answer_from_unique_correct_option() {
        let options = vec![
            opt("Paris", false, 1),
            opt("London", true, 2),
            opt("Berlin", false, 3),
        ];
        let normalized =
            normalize(QuestionType::MultipleChoice, Mode::Create, &mc_payload(&options)).unwrap();

        assert_eq!(
            normalized.correct_answer,
            Some(CorrectAnswer::Text("London".to_string()))
        );
        let staged = normalized.options.unwrap();
        assert_eq!(staged.len(), 3);
        assert_eq!(staged[1].text, "London");
        assert!(staged[1].is_correct);
    }

    #[test]
    fn multiple_choice_answer_ignores_option_ordering() {
        let shuffled = vec![
            opt("Berlin", false, 3),
            opt("Paris", false, 1),
            opt("London", true, 2),
        ];
        let normalized =
            normalize(QuestionType::MultipleChoice, Mode::Create, &mc_payload(&shuffled)).unwrap();
        assert_eq!(
            normalized.correct_answer,
            Some(CorrectAnswer::Text("London".to_string()))
        );
    }

    #[test]
    fn multiple_choice_rejects_fewer_than_two_options() {
        let one = vec![opt("Paris", true, 1)];
        assert_eq!(
            normalize(QuestionType::MultipleChoice, Mode::Create, &mc_payload(&one)),
            Err(RuleError::InvalidOptionCount(1))
        );
        assert_eq!(
            normalize(QuestionType::MultipleChoice, Mode::Create, &mc_payload(&[])),
            Err(RuleError::InvalidOptionCount(0))
        );
    }

    #[test]
    fn multiple_choice_rejects_missing_options_on_update() {
        // An update that switches type to multiple choice must carry options.
        let payload = AnswerPayload {
            correct_answer: Some(&json!("London")),
            ..Default::default()
        };
        assert_eq!(
            normalize(QuestionType::MultipleChoice, Mode::Update, &payload),
            Err(RuleError::InvalidOptionCount(0))
        );
    }

    #[test]
    fn multiple_choice_rejects_zero_or_many_correct_options() {
        let none_correct = vec![opt("A", false, 1), opt("B", false, 2)];
        assert_eq!(
            normalize(QuestionType::MultipleChoice, Mode::Create, &mc_payload(&none_correct)),
            Err(RuleError::InvalidCorrectCount(0))
        );

        let two_correct = vec![opt("A", true, 1), opt("B", true, 2), opt("C", false, 3)];
        assert_eq!(
            normalize(QuestionType::MultipleChoice, Mode::Create, &mc_payload(&two_correct)),
            Err(RuleError::InvalidCorrectCount(2))
        );
    }

    #[test]
    fn multiple_choice_defaults_falsy_order_to_position() {
        let options = vec![
            OptionInput {
                text: "A".to_string(),
                is_correct: true,
                order: None,
            },
            OptionInput {
                text: "B".to_string(),
                is_correct: false,
                order: Some(0),
            },
            opt("C", false, 7),
        ];
        let staged = normalize(QuestionType::MultipleChoice, Mode::Create, &mc_payload(&options))
            .unwrap()
            .options
            .unwrap();
        assert_eq!(staged[0].position, 1);
        assert_eq!(staged[1].position, 2);
        assert_eq!(staged[2].position, 7);
    }

    #[test]
    fn true_false_accepts_case_insensitive_literals_and_bools() {
        for (input, expected) in [
            (json!("true"), true),
            (json!("TRUE"), true),
            (json!("False"), false),
            (json!("FALSE"), false),
            (json!(true), true),
            (json!(false), false),
        ] {
            let payload = AnswerPayload {
                correct_answer: Some(&input),
                ..Default::default()
            };
            let normalized = normalize(QuestionType::TrueFalse, Mode::Create, &payload).unwrap();
            assert_eq!(normalized.correct_answer, Some(CorrectAnswer::Bool(expected)));

            let staged = normalized.options.unwrap();
            assert_eq!(staged.len(), 2);
            assert_eq!(staged[0].text, "True");
            assert_eq!(staged[0].position, 1);
            assert_eq!(staged[1].text, "False");
            assert_eq!(staged[1].position, 2);
            // Mutually exclusive flags.
            assert_eq!(staged[0].is_correct, expected);
            assert_eq!(staged[1].is_correct, !expected);
        }
    }

    #[test]
    fn true_false_rejects_non_boolean_literals() {
        for input in [json!("yes"), json!("1"), json!(1), json!(null), json!(["true"])] {
            let payload = AnswerPayload {
                correct_answer: Some(&input),
                ..Default::default()
            };
            assert_eq!(
                normalize(QuestionType::TrueFalse, Mode::Create, &payload),
                Err(RuleError::InvalidBooleanLiteral),
                "input {input} should be rejected"
            );
        }

        let absent = AnswerPayload::default();
        assert_eq!(
            normalize(QuestionType::TrueFalse, Mode::Create, &absent),
            Err(RuleError::InvalidBooleanLiteral)
        );
    }

    fn columns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matching_stores_matches_verbatim_with_empty_options() {
        let left = columns(&["A", "B"]);
        let right = columns(&["1", "2"]);
        let matches: BTreeMap<String, String> =
            [("A", "1"), ("B", "2")].map(|(k, v)| (k.to_string(), v.to_string())).into();

        let payload = AnswerPayload {
            left_column: Some(&left),
            right_column: Some(&right),
            correct_matches: Some(&matches),
            ..Default::default()
        };
        let normalized = normalize(QuestionType::Matching, Mode::Create, &payload).unwrap();

        assert_eq!(
            normalized.correct_answer,
            Some(CorrectAnswer::Matches(matches))
        );
        assert_eq!(normalized.options, Some(Vec::new()));
        assert_eq!(normalized.columns, Some((left, right)));
    }

    #[test]
    fn matching_create_requires_all_three_fields() {
        let left = columns(&["A", "B"]);
        let right = columns(&["1", "2"]);
        let matches: BTreeMap<String, String> =
            [("A".to_string(), "1".to_string())].into_iter().collect();

        let missing_matches = AnswerPayload {
            left_column: Some(&left),
            right_column: Some(&right),
            ..Default::default()
        };
        assert_eq!(
            normalize(QuestionType::Matching, Mode::Create, &missing_matches),
            Err(RuleError::MissingMatchingFields)
        );

        let missing_right = AnswerPayload {
            left_column: Some(&left),
            correct_matches: Some(&matches),
            ..Default::default()
        };
        assert_eq!(
            normalize(QuestionType::Matching, Mode::Create, &missing_right),
            Err(RuleError::MissingMatchingFields)
        );
    }

    #[test]
    fn matching_rejects_short_or_mismatched_columns() {
        let short = columns(&["A"]);
        let pair = columns(&["1", "2"]);
        let triple = columns(&["1", "2", "3"]);
        let matches: BTreeMap<String, String> =
            [("A".to_string(), "1".to_string())].into_iter().collect();

        let too_short = AnswerPayload {
            left_column: Some(&short),
            right_column: Some(&pair),
            correct_matches: Some(&matches),
            ..Default::default()
        };
        assert_eq!(
            normalize(QuestionType::Matching, Mode::Create, &too_short),
            Err(RuleError::InvalidColumnLength)
        );

        let mismatched = AnswerPayload {
            left_column: Some(&pair),
            right_column: Some(&triple),
            correct_matches: Some(&matches),
            ..Default::default()
        };
        assert_eq!(
            normalize(QuestionType::Matching, Mode::Create, &mismatched),
            Err(RuleError::ColumnLengthMismatch)
        );
    }

    #[test]
    fn matching_update_allows_matches_without_columns() {
        let matches: BTreeMap<String, String> =
            [("A".to_string(), "2".to_string())].into_iter().collect();
        let payload = AnswerPayload {
            correct_matches: Some(&matches),
            ..Default::default()
        };
        let normalized = normalize(QuestionType::Matching, Mode::Update, &payload).unwrap();
        assert_eq!(
            normalized.correct_answer,
            Some(CorrectAnswer::Matches(matches))
        );
        assert_eq!(normalized.columns, None);
        // Options are still forced empty for matching questions.
        assert_eq!(normalized.options, Some(Vec::new()));
    }

    #[test]
    fn matching_update_rejects_one_column_without_the_other() {
        let left = columns(&["A", "B"]);
        let payload = AnswerPayload {
            left_column: Some(&left),
            ..Default::default()
        };
        assert_eq!(
            normalize(QuestionType::Matching, Mode::Update, &payload),
            Err(RuleError::MissingMatchingFields)
        );
    }

    #[test]
    fn matching_update_columns_only_keeps_stored_answer() {
        let left = columns(&["A", "B", "C"]);
        let right = columns(&["1", "2", "3"]);
        let payload = AnswerPayload {
            left_column: Some(&left),
            right_column: Some(&right),
            ..Default::default()
        };
        let normalized = normalize(QuestionType::Matching, Mode::Update, &payload).unwrap();
        assert_eq!(normalized.correct_answer, None);
        assert_eq!(normalized.columns, Some((left, right)));
    }

    #[test]
    fn matching_accepts_unreferenced_match_keys() {
        // Referential integrity of the mapping against the columns is
        // deliberately not enforced; this documents the accepted behavior.
        let left = columns(&["A", "B"]);
        let right = columns(&["1", "2"]);
        let stray: BTreeMap<String, String> =
            [("Z".to_string(), "9".to_string())].into_iter().collect();
        let payload = AnswerPayload {
            left_column: Some(&left),
            right_column: Some(&right),
            correct_matches: Some(&stray),
            ..Default::default()
        };
        let normalized = normalize(QuestionType::Matching, Mode::Create, &payload).unwrap();
        assert_eq!(
            normalized.correct_answer,
            Some(CorrectAnswer::Matches(stray))
        );
    }

    #[test]
    fn unsupported_types_pass_raw_answer_through() {
        let raw = json!("Free-text model answer");
        let payload = AnswerPayload {
            correct_answer: Some(&raw),
            ..Default::default()
        };
        let normalized = normalize(QuestionType::ShortAnswer, Mode::Create, &payload).unwrap();
        assert_eq!(
            normalized.correct_answer,
            Some(CorrectAnswer::Text("Free-text model answer".to_string()))
        );
        assert_eq!(normalized.options, None);

        let essay = normalize(QuestionType::Essay, Mode::Update, &AnswerPayload::default()).unwrap();
        assert_eq!(essay.correct_answer, None);
        assert_eq!(essay.options, None);
    }

    #[test]
    fn normalization_is_idempotent_for_equal_payloads() {
        let options = vec![opt("A", true, 1), opt("B", false, 2)];
        let first =
            normalize(QuestionType::MultipleChoice, Mode::Update, &mc_payload(&options)).unwrap();
        let second =
            normalize(QuestionType::MultipleChoice, Mode::Update, &mc_payload(&options)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn grading_multiple_choice_is_strict_string_match() {
        let correct = CorrectAnswer::Text("London".to_string());
        assert!(grade(QuestionType::MultipleChoice, &correct, &json!("London")));
        assert!(!grade(QuestionType::MultipleChoice, &correct, &json!("london")));
        assert!(!grade(QuestionType::MultipleChoice, &correct, &json!("Paris")));
        assert!(!grade(QuestionType::MultipleChoice, &correct, &json!(null)));
    }

    #[test]
    fn grading_true_false_uses_literal_parsing() {
        let correct = CorrectAnswer::Bool(false);
        assert!(grade(QuestionType::TrueFalse, &correct, &json!("FALSE")));
        assert!(grade(QuestionType::TrueFalse, &correct, &json!(false)));
        assert!(!grade(QuestionType::TrueFalse, &correct, &json!("true")));
        assert!(!grade(QuestionType::TrueFalse, &correct, &json!("no")));
    }

    #[test]
    fn grading_matching_compares_full_mapping() {
        let answer: BTreeMap<String, String> =
            [("A", "1"), ("B", "2")].map(|(k, v)| (k.to_string(), v.to_string())).into();
        let correct = CorrectAnswer::Matches(answer);

        assert!(grade(
            QuestionType::Matching,
            &correct,
            &json!({"A": "1", "B": "2"})
        ));
        assert!(!grade(
            QuestionType::Matching,
            &correct,
            &json!({"A": "2", "B": "1"})
        ));
        assert!(!grade(QuestionType::Matching, &correct, &json!({"A": "1"})));
        assert!(!grade(QuestionType::Matching, &correct, &json!("A:1,B:2")));
    }

    #[test]
    fn grading_unsupported_types_never_awards() {
        let correct = CorrectAnswer::Text("model answer".to_string());
        assert!(!grade(QuestionType::Essay, &correct, &json!("model answer")));
        assert!(!grade(QuestionType::ShortAnswer, &correct, &json!("model answer")));
    }
}
