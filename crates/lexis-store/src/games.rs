use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lexis_core::entities::{Game, GamePair, GameSession, GameType, Level, NewGame};
use lexis_core::ids::{GameId, GameSessionId, UserId};
use serde::Serialize;

use crate::error::StoreError;
use crate::store::EntityStore;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub best_score: u32,
    pub achieved_at: DateTime<Utc>,
}

/// Outcome recorded when a game session completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    pub score: u32,
    pub correct_matches: u32,
    pub timed_out: bool,
}

pub trait GameRepository: Send + Sync {
    fn create(&self, new: NewGame, created_by: &UserId) -> Game;
    fn find_by_id(&self, id: &GameId) -> Option<Game>;
    fn find_all(&self, kind: Option<GameType>, level: Option<Level>, published_only: bool)
        -> Vec<Game>;

    /// Fails with `Conflict` once the game is published.
    fn update_pairs(&self, id: &GameId, pairs: Vec<GamePair>) -> Result<Game, StoreError>;
    /// Freezes the pairs. Publishing twice is a no-op.
    fn publish(&self, id: &GameId) -> Result<Game, StoreError>;

    /// Fails unless the game exists and is published.
    fn start_session(&self, game: &GameId, user: &UserId) -> Result<GameSession, StoreError>;
    fn find_session(&self, id: &GameSessionId) -> Option<GameSession>;

    /// One-way latch: a completed session cannot be completed again.
    fn complete_session(
        &self,
        id: &GameSessionId,
        outcome: Completion,
    ) -> Result<GameSession, StoreError>;

    /// Newest first.
    fn sessions_for_user(&self, user: &UserId) -> Vec<GameSession>;
    /// Best completed score per user, highest first.
    fn leaderboard(&self, game: &GameId, limit: usize) -> Vec<LeaderboardEntry>;
}

pub struct MemoryGameRepo {
    store: EntityStore,
}

impl MemoryGameRepo {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

impl GameRepository for MemoryGameRepo {
    fn create(&self, new: NewGame, created_by: &UserId) -> Game {
        let game = Game {
            game_id: GameId::new(),
            game_type: new.game_type,
            title: new.title,
            level: new.level,
            pairs: new.pairs,
            time_limit_secs: new.time_limit_secs,
            max_score: new.max_score,
            published: false,
            created_by: created_by.clone(),
            created_at: self.store.now(),
        };
        self.store.with_games(|t| {
            let _ = t.games.insert(game.game_id.clone(), game.clone());
        });
        game
    }

    fn find_by_id(&self, id: &GameId) -> Option<Game> {
        self.store.with_games(|t| t.games.get(id).cloned())
    }

    fn find_all(
        &self,
        kind: Option<GameType>,
        level: Option<Level>,
        published_only: bool,
    ) -> Vec<Game> {
        self.store.with_games(|t| {
            t.games
                .values()
                .filter(|g| !published_only || g.published)
                .filter(|g| kind.map_or(true, |k| g.game_type == k))
                .filter(|g| level.map_or(true, |l| g.level == l))
                .cloned()
                .collect()
        })
    }

    fn update_pairs(&self, id: &GameId, pairs: Vec<GamePair>) -> Result<Game, StoreError> {
        self.store.with_games(|t| {
            let game = t
                .games
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound("Game not found".into()))?;
            if game.published {
                return Err(StoreError::Conflict(
                    "Pairs cannot change after a game is published".into(),
                ));
            }
            game.pairs = pairs;
            Ok(game.clone())
        })
    }

    fn publish(&self, id: &GameId) -> Result<Game, StoreError> {
        self.store.with_games(|t| {
            let game = t
                .games
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound("Game not found".into()))?;
            game.published = true;
            Ok(game.clone())
        })
    }

    fn start_session(&self, game: &GameId, user: &UserId) -> Result<GameSession, StoreError> {
        let now = self.store.now();
        self.store.with_games(|t| {
            let g = t
                .games
                .get(game)
                .filter(|g| g.published)
                .ok_or_else(|| StoreError::NotFound("Game not found".into()))?;
            let session = GameSession {
                session_id: GameSessionId::new(),
                game_id: game.clone(),
                user_id: user.clone(),
                score: 0,
                correct_matches: 0,
                total_pairs: g.pairs.len() as u32,
                completed: false,
                timed_out: false,
                started_at: now,
                ended_at: None,
            };
            let _ = t.sessions.insert(session.session_id.clone(), session.clone());
            Ok(session)
        })
    }

    fn find_session(&self, id: &GameSessionId) -> Option<GameSession> {
        self.store.with_games(|t| t.sessions.get(id).cloned())
    }

    fn complete_session(
        &self,
        id: &GameSessionId,
        outcome: Completion,
    ) -> Result<GameSession, StoreError> {
        let now = self.store.now();
        self.store.with_games(|t| {
            let session = t
                .sessions
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound("Game session not found".into()))?;
            if session.completed {
                return Err(StoreError::Conflict("Game session already completed".into()));
            }
            session.completed = true;
            session.score = outcome.score;
            session.correct_matches = outcome.correct_matches;
            session.timed_out = outcome.timed_out;
            session.ended_at = Some(now);
            Ok(session.clone())
        })
    }

    fn sessions_for_user(&self, user: &UserId) -> Vec<GameSession> {
        self.store.with_games(|t| {
            t.sessions
                .values()
                .rev()
                .filter(|s| &s.user_id == user)
                .cloned()
                .collect()
        })
    }

    fn leaderboard(&self, game: &GameId, limit: usize) -> Vec<LeaderboardEntry> {
        let best = self.store.with_games(|t| {
            let mut best: HashMap<UserId, LeaderboardEntry> = HashMap::new();
            for s in t
                .sessions
                .values()
                .filter(|s| &s.game_id == game && s.completed)
            {
                let achieved_at = s.ended_at.unwrap_or(s.started_at);
                let candidate = LeaderboardEntry {
                    user_id: s.user_id.clone(),
                    best_score: s.score,
                    achieved_at,
                };
                best.entry(s.user_id.clone())
                    .and_modify(|e| {
                        if s.score > e.best_score {
                            *e = candidate.clone();
                        }
                    })
                    .or_insert(candidate);
            }
            best
        });
        let mut entries: Vec<LeaderboardEntry> = best.into_values().collect();
        entries.sort_by(|a, b| {
            b.best_score
                .cmp(&a.best_score)
                .then_with(|| a.achieved_at.cmp(&b.achieved_at))
        });
        entries.truncate(limit);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn pairs(n: usize) -> Vec<GamePair> {
        (0..n)
            .map(|i| GamePair {
                prompt: format!("w{i}"),
                answer: format!("m{i}"),
            })
            .collect()
    }

    fn setup() -> (MemoryGameRepo, Game) {
        let repo = MemoryGameRepo::new(EntityStore::new());
        let game = repo.create(
            NewGame {
                game_type: GameType::WordMatch,
                title: "Colours".into(),
                level: Level::Beginner,
                pairs: pairs(4),
                time_limit_secs: 60,
                max_score: 100,
            },
            &UserId::new(),
        );
        (repo, game)
    }

    fn done(score: u32) -> Completion {
        Completion {
            score,
            correct_matches: score / 25,
            timed_out: false,
        }
    }

    #[test]
    fn pairs_freeze_on_publish() {
        let (repo, game) = setup();
        let updated = repo.update_pairs(&game.game_id, pairs(6)).unwrap();
        assert_eq!(updated.pairs.len(), 6);

        let _ = repo.publish(&game.game_id).unwrap();
        assert_matches!(
            repo.update_pairs(&game.game_id, pairs(2)),
            Err(StoreError::Conflict(_))
        );
        assert!(repo.publish(&game.game_id).unwrap().published);
        assert_eq!(repo.find_by_id(&game.game_id).unwrap().pairs.len(), 6);
    }

    #[test]
    fn unpublished_games_cannot_be_started_or_listed() {
        let (repo, game) = setup();
        assert_matches!(
            repo.start_session(&game.game_id, &UserId::new()),
            Err(StoreError::NotFound(_))
        );
        assert!(repo.find_all(None, None, true).is_empty());
        assert_eq!(repo.find_all(None, None, false).len(), 1);
    }

    #[test]
    fn completion_is_a_one_way_latch() {
        let (repo, game) = setup();
        let _ = repo.publish(&game.game_id).unwrap();
        let session = repo.start_session(&game.game_id, &UserId::new()).unwrap();
        assert_eq!(session.total_pairs, 4);
        assert!(!session.completed);

        let finished = repo.complete_session(&session.session_id, done(75)).unwrap();
        assert!(finished.completed);
        assert_eq!(finished.score, 75);
        assert!(finished.ended_at.is_some());

        assert_matches!(
            repo.complete_session(&session.session_id, done(100)),
            Err(StoreError::Conflict(_))
        );
        assert_eq!(repo.find_session(&session.session_id).unwrap().score, 75);
    }

    #[test]
    fn concurrent_completions_latch_once() {
        let (repo, game) = setup();
        let _ = repo.publish(&game.game_id).unwrap();
        let repo = Arc::new(repo);
        let session = repo.start_session(&game.game_id, &UserId::new()).unwrap();
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let repo = Arc::clone(&repo);
                let id = session.session_id.clone();
                std::thread::spawn(move || repo.complete_session(&id, done(i * 10)))
            })
            .collect();
        let ok = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(ok, 1);
    }

    #[test]
    fn leaderboard_keeps_best_per_user() {
        let (repo, game) = setup();
        let _ = repo.publish(&game.game_id).unwrap();
        let (alice, bob) = (UserId::new(), UserId::new());
        for (user, score) in [(&alice, 50), (&alice, 75), (&bob, 100), (&alice, 25)] {
            let s = repo.start_session(&game.game_id, user).unwrap();
            let _ = repo.complete_session(&s.session_id, done(score)).unwrap();
        }
        // An unfinished session never ranks.
        let _ = repo.start_session(&game.game_id, &UserId::new()).unwrap();

        let board = repo.leaderboard(&game.game_id, 10);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user_id, bob);
        assert_eq!(board[0].best_score, 100);
        assert_eq!(board[1].user_id, alice);
        assert_eq!(board[1].best_score, 75);
        assert_eq!(repo.leaderboard(&game.game_id, 1).len(), 1);
        assert_eq!(repo.sessions_for_user(&alice).len(), 3);
    }
}
