use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use revise_core::model::StepKey;

use super::patch_and_advance;
use crate::error::StepError;
use crate::session_run::SessionRunEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfAssessment {
    GotIt,
    NotQuite,
    Unsure,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeAnswer {
    pub question_id: String,
    pub answer: String,
    pub self_assessment: SelfAssessment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticePayload {
    pub total_questions_available: u32,
    pub questions_attempted: u32,
    pub got_it_count: u32,
    pub not_quite_count: u32,
    pub unsure_count: u32,
    pub answers: Vec<PracticeAnswer>,
    pub difficulty_selected: Difficulty,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Exam-style questions answered and self-marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeRound {
    total_available: u32,
    difficulty: Difficulty,
    answers: Vec<PracticeAnswer>,
}

impl PracticeRound {
    #[must_use]
    pub fn new(total_available: u32, difficulty: Difficulty) -> Self {
        Self {
            total_available,
            difficulty,
            answers: Vec::new(),
        }
    }

    /// Record an answer; answering the same question again replaces it.
    pub fn record(&mut self, answer: PracticeAnswer) {
        match self
            .answers
            .iter_mut()
            .find(|a| a.question_id == answer.question_id)
        {
            Some(existing) => *existing = answer,
            None => self.answers.push(answer),
        }
    }

    #[must_use]
    pub fn payload(&self, completed_at: Option<DateTime<Utc>>) -> PracticePayload {
        let count = |wanted: SelfAssessment| {
            let n = self
                .answers
                .iter()
                .filter(|a| a.self_assessment == wanted)
                .count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };
        PracticePayload {
            total_questions_available: self.total_available,
            questions_attempted: u32::try_from(self.answers.len()).unwrap_or(u32::MAX),
            got_it_count: count(SelfAssessment::GotIt),
            not_quite_count: count(SelfAssessment::NotQuite),
            unsure_count: count(SelfAssessment::Unsure),
            answers: self.answers.clone(),
            difficulty_selected: self.difficulty,
            completed_at,
        }
    }

    /// # Errors
    ///
    /// Returns engine errors if the payload or the completion cannot be saved.
    pub async fn finish(&self, engine: &mut SessionRunEngine) -> Result<StepKey, StepError> {
        let payload = self.payload(Some(engine.now()));
        patch_and_advance(engine, StepKey::Practice, &payload).await
    }
}
