//! Matching games: authoring, rounds and scoring.

use std::collections::HashSet;
use std::sync::Arc;

use lexis_core::entities::{
    Game, GameMatch, GamePair, GameSession, GameType, Level, NewGame,
};
use lexis_core::ids::{GameId, GameSessionId, UserId};
use lexis_core::{Clock, LexisError, Result};
use lexis_store::{Completion, GameRepository, LeaderboardEntry};
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::info;

use crate::validate::non_blank;

/// What a player receives when a round starts: prompts in order and the
/// answers shuffled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRound {
    pub session_id: GameSessionId,
    pub game_id: GameId,
    pub game_type: GameType,
    pub title: String,
    pub prompt_label: &'static str,
    pub time_limit_secs: u32,
    pub max_score: u32,
    pub prompts: Vec<String>,
    pub answers: Vec<String>,
}

pub struct GameService {
    games: Arc<dyn GameRepository>,
    clock: Arc<dyn Clock>,
}

fn check_pairs(pairs: &[GamePair]) -> Result<()> {
    if pairs.is_empty() {
        return Err(LexisError::validation("A game needs at least one pair"));
    }
    let mut seen = HashSet::new();
    for pair in pairs {
        let prompt = non_blank("prompt", &pair.prompt)?;
        let _ = non_blank("answer", &pair.answer)?;
        if !seen.insert(prompt.to_lowercase()) {
            return Err(LexisError::validation(format!("Duplicate prompt: {prompt}")));
        }
    }
    Ok(())
}

impl GameService {
    pub fn new(games: Arc<dyn GameRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { games, clock }
    }

    /// Published games only, unless `include_drafts` (staff views).
    pub fn list(&self, kind: Option<GameType>, level: Option<Level>, include_drafts: bool) -> Vec<Game> {
        self.games.find_all(kind, level, !include_drafts)
    }

    pub fn create(&self, mut new: NewGame, author: &UserId) -> Result<Game> {
        new.title = non_blank("title", &new.title)?.to_owned();
        check_pairs(&new.pairs)?;
        if new.max_score == 0 || new.time_limit_secs == 0 {
            return Err(LexisError::validation(
                "maxScore and timeLimit must be positive",
            ));
        }
        let game = self.games.create(new, author);
        info!(game_id = %game.game_id, pairs = game.pairs.len(), "game created");
        Ok(game)
    }

    pub fn update_pairs(&self, id: &GameId, pairs: Vec<GamePair>) -> Result<Game> {
        check_pairs(&pairs)?;
        Ok(self.games.update_pairs(id, pairs)?)
    }

    pub fn publish(&self, id: &GameId) -> Result<Game> {
        let game = self.games.publish(id)?;
        info!(game_id = %id, "game published");
        Ok(game)
    }

    pub fn start(&self, user: &UserId, game_id: &GameId) -> Result<GameRound> {
        let session = self.games.start_session(game_id, user)?;
        let game = self
            .games
            .find_by_id(game_id)
            .ok_or_else(|| LexisError::not_found("Game not found"))?;
        let prompts = game.pairs.iter().map(|p| p.prompt.clone()).collect();
        let mut answers: Vec<String> = game.pairs.iter().map(|p| p.answer.clone()).collect();
        answers.shuffle(&mut rand::rng());
        Ok(GameRound {
            session_id: session.session_id,
            game_id: game.game_id,
            game_type: game.game_type,
            title: game.title,
            prompt_label: game.game_type.prompt_label(),
            time_limit_secs: game.time_limit_secs,
            max_score: game.max_score,
            prompts,
            answers,
        })
    }

    /// Score the player's matches and close the round. Late rounds are
    /// still scored but flagged `timedOut`.
    pub fn submit(&self, user: &UserId, session_id: &GameSessionId, matches: &[GameMatch]) -> Result<GameSession> {
        let session = self
            .games
            .find_session(session_id)
            .filter(|s| &s.user_id == user)
            .ok_or_else(|| LexisError::not_found("Game session not found"))?;
        if session.completed {
            return Err(LexisError::conflict("Game session already completed"));
        }
        let game = self
            .games
            .find_by_id(&session.game_id)
            .ok_or_else(|| LexisError::not_found("Game not found"))?;

        let correct = game.count_correct(matches);
        let elapsed = self.clock.now() - session.started_at;
        let outcome = Completion {
            score: game.score_for(correct),
            correct_matches: correct,
            timed_out: elapsed.num_milliseconds() > i64::from(game.time_limit_secs) * 1000,
        };
        let done = self.games.complete_session(session_id, outcome)?;
        info!(
            session_id = %session_id,
            user_id = %user,
            score = done.score,
            timed_out = done.timed_out,
            "game completed"
        );
        Ok(done)
    }

    pub fn history(&self, user: &UserId) -> Vec<GameSession> {
        self.games.sessions_for_user(user)
    }

    pub fn leaderboard(&self, game: &GameId, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        if self.games.find_by_id(game).is_none() {
            return Err(LexisError::not_found("Game not found"));
        }
        Ok(self.games.leaderboard(game, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;
    use assert_matches::assert_matches;
    use chrono::TimeDelta;

    fn pair(p: &str, a: &str) -> GamePair {
        GamePair {
            prompt: p.into(),
            answer: a.into(),
        }
    }

    fn four_pairs() -> Vec<GamePair> {
        vec![
            pair("red", "rojo"),
            pair("blue", "azul"),
            pair("green", "verde"),
            pair("black", "negro"),
        ]
    }

    fn new_game() -> NewGame {
        NewGame {
            game_type: GameType::WordMatch,
            title: "Colours".into(),
            level: Level::Beginner,
            pairs: four_pairs(),
            time_limit_secs: 60,
            max_score: 100,
        }
    }

    fn m(p: &str, a: &str) -> GameMatch {
        GameMatch {
            prompt: p.into(),
            answer: a.into(),
        }
    }

    #[test]
    fn create_validates_pairs() {
        let f = fixture();
        let svc = &f.services.games;
        let mut dup = new_game();
        dup.pairs.push(pair("RED", "x"));
        assert_matches!(svc.create(dup, &UserId::new()), Err(LexisError::Validation(m)) if m.contains("Duplicate"));
        let mut empty = new_game();
        empty.pairs.clear();
        assert_matches!(svc.create(empty, &UserId::new()), Err(LexisError::Validation(_)));
    }

    #[test]
    fn three_of_four_scores_floor_of_three_quarters() {
        let f = fixture();
        let svc = &f.services.games;
        let mut new = new_game();
        new.max_score = 10;
        let game = svc.create(new, &UserId::new()).unwrap();
        assert_matches!(svc.start(&UserId::new(), &game.game_id), Err(LexisError::NotFound(_)));
        let _ = svc.publish(&game.game_id).unwrap();

        let player = UserId::new();
        let round = svc.start(&player, &game.game_id).unwrap();
        assert_eq!(round.prompts.len(), 4);
        let mut answers = round.answers.clone();
        answers.sort();
        assert_eq!(answers, vec!["azul", "negro", "rojo", "verde"]);

        let matches = [m("red", "rojo"), m("blue", "azul"), m("green", "verde"), m("black", "rojo")];
        let done = svc.submit(&player, &round.session_id, &matches).unwrap();
        assert_eq!(done.correct_matches, 3);
        assert_eq!(done.score, 7);
        assert!(!done.timed_out);

        assert_matches!(
            svc.submit(&player, &round.session_id, &matches),
            Err(LexisError::Conflict(_))
        );
    }

    #[test]
    fn late_submission_is_scored_but_flagged() {
        let f = fixture();
        let svc = &f.services.games;
        let game = svc.create(new_game(), &UserId::new()).unwrap();
        let _ = svc.publish(&game.game_id).unwrap();
        let player = UserId::new();
        let round = svc.start(&player, &game.game_id).unwrap();

        f.clock.advance(TimeDelta::seconds(61));
        let done = svc.submit(&player, &round.session_id, &[m("red", "rojo")]).unwrap();
        assert!(done.timed_out);
        assert_eq!(done.score, 25);
    }

    #[test]
    fn only_the_owner_can_submit_and_pairs_freeze() {
        let f = fixture();
        let svc = &f.services.games;
        let game = svc.create(new_game(), &UserId::new()).unwrap();
        let _ = svc.update_pairs(&game.game_id, four_pairs()[..2].to_vec()).unwrap();
        let _ = svc.publish(&game.game_id).unwrap();
        assert_matches!(
            svc.update_pairs(&game.game_id, four_pairs()),
            Err(LexisError::Conflict(_))
        );

        let round = svc.start(&UserId::new(), &game.game_id).unwrap();
        assert_matches!(
            svc.submit(&UserId::new(), &round.session_id, &[]),
            Err(LexisError::NotFound(_))
        );
        assert_eq!(svc.list(None, None, false).len(), 1);
        assert!(svc.leaderboard(&game.game_id, 10).unwrap().is_empty());
        assert_matches!(svc.leaderboard(&GameId::new(), 10), Err(LexisError::NotFound(_)));
    }
}
