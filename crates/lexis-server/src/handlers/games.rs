//! Matching games: authoring, play rounds and leaderboards.

use lexis_core::entities::{Game, GameMatch, GamePair, GameType, Level, NewGame};
use lexis_core::ids::{GameId, GameSessionId};
use lexis_core::Result;
use lexis_protocol::params::{optional_parsed, optional_u32, require_as, require_parsed, require_str};
use serde_json::{json, Value};
use tracing::instrument;

use super::to_value;
use crate::dispatch::{AccessPolicy, Handler, RequestContext, STAFF};

const DEFAULT_TIME_LIMIT_SECS: u32 = 60;
const DEFAULT_MAX_SCORE: u32 = 100;
const DEFAULT_LEADERBOARD_SIZE: u32 = 10;

/// Listing entry for players: the pairs stay hidden until a round starts.
fn summary(game: &Game) -> Value {
    json!({
        "gameId": game.game_id,
        "gameType": game.game_type,
        "title": game.title,
        "level": game.level,
        "pairCount": game.pairs.len(),
        "timeLimitSecs": game.time_limit_secs,
        "maxScore": game.max_score,
    })
}

pub struct GetGamesHandler;

impl Handler for GetGamesHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let kind = optional_parsed::<GameType>(body, "type")?;
        let level = optional_parsed::<Level>(body, "level")?;
        let staff = ctx.is_staff();
        let games = ctx.server.services.games.list(kind, level, staff);
        let games = if staff {
            to_value(&games)?
        } else {
            Value::Array(games.iter().map(summary).collect())
        };
        Ok(json!({"games": games}))
    }
}

pub struct CreateGameHandler;

impl Handler for CreateGameHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    #[instrument(skip_all, fields(method = "CREATE_GAME"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let new = NewGame {
            game_type: require_parsed(body, "type")?,
            title: require_str(body, "title")?.to_owned(),
            level: require_parsed(body, "level")?,
            pairs: require_as(body, "pairs")?,
            time_limit_secs: optional_u32(body, "timeLimit")?.unwrap_or(DEFAULT_TIME_LIMIT_SECS),
            max_score: optional_u32(body, "maxScore")?.unwrap_or(DEFAULT_MAX_SCORE),
        };
        let game = ctx.server.services.games.create(new, ctx.user_id()?)?;
        Ok(json!({"game": to_value(&game)?}))
    }
}

pub struct UpdatePairsHandler;

impl Handler for UpdatePairsHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let id = require_parsed::<GameId>(body, "gameId")?;
        let pairs: Vec<GamePair> = require_as(body, "pairs")?;
        let game = ctx.server.services.games.update_pairs(&id, pairs)?;
        Ok(json!({"game": to_value(&game)?}))
    }
}

pub struct PublishGameHandler;

impl Handler for PublishGameHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let id = require_parsed::<GameId>(body, "gameId")?;
        let game = ctx.server.services.games.publish(&id)?;
        Ok(json!({"game": to_value(&game)?}))
    }
}

/// Opens a session and returns prompts with the answers shuffled.
pub struct StartGameHandler;

impl Handler for StartGameHandler {
    #[instrument(skip_all, fields(method = "START_GAME"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let id = require_parsed::<GameId>(body, "gameId")?;
        let round = ctx.server.services.games.start(ctx.user_id()?, &id)?;
        to_value(&round)
    }
}

pub struct SubmitGameHandler;

impl Handler for SubmitGameHandler {
    #[instrument(skip_all, fields(method = "SUBMIT_GAME"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let session = require_parsed::<GameSessionId>(body, "sessionId")?;
        let matches: Vec<GameMatch> = require_as(body, "matches")?;
        let done = ctx
            .server
            .services
            .games
            .submit(ctx.user_id()?, &session, &matches)?;
        Ok(json!({"session": to_value(&done)?}))
    }
}

pub struct GetGameHistoryHandler;

impl Handler for GetGameHistoryHandler {
    fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
        let sessions = ctx.server.services.games.history(ctx.user_id()?);
        Ok(json!({"count": sessions.len(), "sessions": to_value(&sessions)?}))
    }
}

pub struct GetLeaderboardHandler;

impl Handler for GetLeaderboardHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let id = require_parsed::<GameId>(body, "gameId")?;
        let limit = optional_u32(body, "limit")?.unwrap_or(DEFAULT_LEADERBOARD_SIZE);
        let board = ctx
            .server
            .services
            .games
            .leaderboard(&id, limit as usize)?;
        Ok(json!({"gameId": id, "entries": to_value(&board)?}))
    }
}
