use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use revise_core::model::StepKey;

use super::patch_and_advance;
use crate::error::StepError;
use crate::session_run::SessionRunEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallRating {
    Known,
    Learning,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallPayload {
    pub cards_total: u32,
    pub known_count: u32,
    pub learning_count: u32,
    pub ratings: BTreeMap<String, RecallRating>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Flashcards flipped one at a time, each rated known or still learning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecallDeck {
    cards: Vec<String>,
    rated: Vec<RecallRating>,
}

impl RecallDeck {
    #[must_use]
    pub fn new(cards: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            cards: cards.into_iter().map(Into::into).collect(),
            rated: Vec::new(),
        }
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&str> {
        self.cards.get(self.rated.len()).map(String::as_str)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.rated.len() >= self.cards.len()
    }

    /// Rate the current card and move to the next.
    ///
    /// # Errors
    ///
    /// Returns `StepError::DeckExhausted` once every card has a rating.
    pub fn rate(&mut self, rating: RecallRating) -> Result<Option<&str>, StepError> {
        if self.is_complete() {
            return Err(StepError::DeckExhausted);
        }
        self.rated.push(rating);
        Ok(self.current_card())
    }

    /// Take back the last rating; returns the card that is current again.
    pub fn undo(&mut self) -> Option<&str> {
        self.rated.pop()?;
        self.current_card()
    }

    #[must_use]
    pub fn payload(&self, completed_at: Option<DateTime<Utc>>) -> RecallPayload {
        let ratings: BTreeMap<String, RecallRating> = self
            .cards
            .iter()
            .cloned()
            .zip(self.rated.iter().copied())
            .collect();
        let count = |wanted: RecallRating| {
            let n = self.rated.iter().filter(|r| **r == wanted).count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };
        RecallPayload {
            cards_total: u32::try_from(self.cards.len()).unwrap_or(u32::MAX),
            known_count: count(RecallRating::Known),
            learning_count: count(RecallRating::Learning),
            ratings,
            completed_at,
        }
    }

    /// # Errors
    ///
    /// Returns engine errors if the payload or the completion cannot be saved.
    pub async fn finish(&self, engine: &mut SessionRunEngine) -> Result<StepKey, StepError> {
        let payload = self.payload(Some(engine.now()));
        patch_and_advance(engine, StepKey::Recall, &payload).await
    }
}
