use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::metrics::QUIZ_ATTEMPTS_TOTAL;
use crate::models::{GradeOutcome, Quiz, QuizAttempt, SubmitQuizRequest, SubmitQuizResponse};
use crate::store::Store;

/// Scores `answers` against the quiz. Answers are keyed by the decimal
/// question id and compared to `correct_answer` exactly.
pub fn grade(quiz: &Quiz, answers: &HashMap<String, String>) -> AppResult<GradeOutcome> {
    let total = quiz.questions.len() as u32;
    if total == 0 {
        return Err(AppError::Validation(format!(
            "quiz {} has no questions to grade",
            quiz.id
        )));
    }

    let correct = quiz
        .questions
        .iter()
        .filter(|q| answers.get(&q.id.to_string()) == Some(&q.correct_answer))
        .count() as u32;

    let score = correct * 100 / total;

    Ok(GradeOutcome {
        score,
        correct,
        total,
        passed: score >= quiz.passing_score,
    })
}

pub struct GradingService {
    store: Arc<dyn Store>,
}

impl GradingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Grades and records an attempt. The grade is only returned once the
    /// attempt is stored.
    pub async fn submit_quiz_answers(
        &self,
        user_id: &str,
        quiz_id: &str,
        request: SubmitQuizRequest,
    ) -> AppResult<SubmitQuizResponse> {
        request.validate()?;

        let quiz = self
            .store
            .get_quiz(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("quiz {}", quiz_id)))?;

        match self.store.get_material(&quiz.material_id).await? {
            Some(material) if material.user_id == user_id => {}
            _ => return Err(AppError::NotFound(format!("quiz {}", quiz_id))),
        }

        let outcome = grade(&quiz, &request.answers)?;

        let attempt = QuizAttempt {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            quiz_id: quiz.id.clone(),
            answers: request.answers,
            score: outcome.score,
            time_spent: request.time_spent,
            passed: outcome.passed,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_attempt(&attempt).await {
            tracing::error!("Failed to persist attempt for quiz={} user={}: {}", quiz.id, user_id, e);
            return Err(AppError::Persistence(e));
        }

        QUIZ_ATTEMPTS_TOTAL
            .with_label_values(&[if outcome.passed { "true" } else { "false" }])
            .inc();
        tracing::info!(
            "Quiz attempt recorded: quiz={}, user={}, score={}, passed={}",
            quiz.id,
            user_id,
            outcome.score,
            outcome.passed
        );

        Ok(SubmitQuizResponse {
            score: outcome.score,
            correct: outcome.correct,
            total: outcome.total,
            passed: outcome.passed,
            passing_score: quiz.passing_score,
            attempt_id: attempt.id,
        })
    }
}
