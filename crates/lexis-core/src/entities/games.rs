use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{wire_enum, Level};
use crate::ids::{GameId, GameSessionId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    WordMatch,
    SentenceMatch,
    PictureMatch,
}

wire_enum!(GameType, "game type", {
    WordMatch => "word_match",
    SentenceMatch => "sentence_match",
    PictureMatch => "picture_match",
});

impl GameType {
    /// Label for the prompt side of a pair, as shown to clients.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Self::WordMatch => "word",
            Self::SentenceMatch => "sentenceStart",
            Self::PictureMatch => "imageUrl",
        }
    }
}

/// One matchable pair: a word and its meaning, two sentence halves, or an
/// image and its word depending on the game type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePair {
    pub prompt: String,
    pub answer: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub game_id: GameId,
    pub game_type: GameType,
    pub title: String,
    pub level: Level,
    pub pairs: Vec<GamePair>,
    pub time_limit_secs: u32,
    pub max_score: u32,
    /// Once set, `pairs` is frozen.
    pub published: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Game {
    /// Count submitted matches that correspond to a real pair. Each pair is
    /// counted at most once.
    pub fn count_correct(&self, matches: &[GameMatch]) -> u32 {
        let mut used = vec![false; self.pairs.len()];
        let mut correct = 0;
        for m in matches {
            if let Some(idx) = self
                .pairs
                .iter()
                .enumerate()
                .position(|(i, p)| !used[i] && p.prompt == m.prompt && p.answer == m.answer)
            {
                used[idx] = true;
                correct += 1;
            }
        }
        correct
    }

    /// `floor(correct * max_score / total_pairs)`.
    pub fn score_for(&self, correct: u32) -> u32 {
        let total = self.pairs.len() as u64;
        if total == 0 {
            return 0;
        }
        let correct = u64::from(correct).min(total);
        (correct * u64::from(self.max_score) / total) as u32
    }
}

#[derive(Clone, Debug)]
pub struct NewGame {
    pub game_type: GameType,
    pub title: String,
    pub level: Level,
    pub pairs: Vec<GamePair>,
    pub time_limit_secs: u32,
    pub max_score: u32,
}

/// A player's submitted match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMatch {
    pub prompt: String,
    pub answer: String,
}

/// One play-through. `completed` latches; score and end time are fixed then.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub session_id: GameSessionId,
    pub game_id: GameId,
    pub user_id: UserId,
    pub score: u32,
    pub correct_matches: u32,
    pub total_pairs: u32,
    pub completed: bool,
    pub timed_out: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}
