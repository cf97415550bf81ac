//! The entity store: every domain map, one lock per entity group.
//!
//! Tables are only reachable through closures passed to the `with_*`
//! accessors, so no reference into a map outlives its guard. Anything a
//! caller takes away is a clone.
//!
//! Lock order, for the few operations that need two groups at once:
//!
//! ```text
//! users → sessions → chat → exercises → games → content → calls
//! ```
//!
//! Nothing in this crate holds a guard while doing I/O.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lexis_core::entities::{
    ChatMessage, Exercise, ExerciseSubmission, Game, GameSession, Lesson, Session, Test,
    TestResult, User, VoiceCall,
};
use lexis_core::ids::{
    CallId, ConnectionId, ExerciseId, GameId, GameSessionId, LessonId, SubmissionId, TestId,
    TestResultId, UserId,
};
use lexis_core::{Clock, SystemClock};
use parking_lot::Mutex;

#[derive(Default)]
pub(crate) struct UserTable {
    pub(crate) by_id: HashMap<UserId, User>,
    /// Normalised email → id.
    pub(crate) by_email: HashMap<String, UserId>,
}

impl UserTable {
    /// Insert unless the id or email is already taken.
    pub(crate) fn insert_if_absent(&mut self, user: User) -> bool {
        if self.by_id.contains_key(&user.id) || self.by_email.contains_key(&user.email) {
            return false;
        }
        let _ = self.by_email.insert(user.email.clone(), user.id.clone());
        let _ = self.by_id.insert(user.id.clone(), user);
        true
    }
}

#[derive(Default)]
pub(crate) struct SessionTable {
    pub(crate) by_token: HashMap<String, Session>,
    pub(crate) by_connection: HashMap<ConnectionId, String>,
}

impl SessionTable {
    /// Remove a session and its reverse-index entry.
    pub(crate) fn remove(&mut self, token: &str) -> Option<Session> {
        let session = self.by_token.remove(token)?;
        if let Some(conn) = &session.connection {
            if self.by_connection.get(conn).map(String::as_str) == Some(token) {
                let _ = self.by_connection.remove(conn);
            }
        }
        Some(session)
    }
}

#[derive(Default)]
pub(crate) struct ChatTable {
    /// Insertion order is the conversation order.
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) last_timestamp: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub(crate) struct ExerciseTable {
    pub(crate) exercises: BTreeMap<ExerciseId, Exercise>,
    pub(crate) submissions: BTreeMap<SubmissionId, ExerciseSubmission>,
}

#[derive(Default)]
pub(crate) struct GameTable {
    pub(crate) games: BTreeMap<GameId, Game>,
    pub(crate) sessions: BTreeMap<GameSessionId, GameSession>,
}

#[derive(Default)]
pub(crate) struct ContentTable {
    pub(crate) lessons: BTreeMap<LessonId, Lesson>,
    pub(crate) tests: BTreeMap<TestId, Test>,
    pub(crate) results: BTreeMap<TestResultId, TestResult>,
}

#[derive(Default)]
pub(crate) struct CallTable {
    pub(crate) calls: HashMap<CallId, VoiceCall>,
}

#[derive(Default)]
struct Tables {
    users: Mutex<UserTable>,
    sessions: Mutex<SessionTable>,
    chat: Mutex<ChatTable>,
    exercises: Mutex<ExerciseTable>,
    games: Mutex<GameTable>,
    content: Mutex<ContentTable>,
    calls: Mutex<CallTable>,
}

/// Record counts per entity group, taken one lock at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCounts {
    pub users: usize,
    pub online_users: usize,
    pub sessions: usize,
    pub messages: usize,
    pub exercises: usize,
    pub submissions: usize,
    pub games: usize,
    pub game_sessions: usize,
    pub lessons: usize,
    pub tests: usize,
    pub active_calls: usize,
}

/// Shared handle to all entity tables. Cloning is cheap.
#[derive(Clone)]
pub struct EntityStore {
    tables: Arc<Tables>,
    clock: Arc<dyn Clock>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Arc::new(Tables::default()),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub(crate) fn with_users<T>(&self, f: impl FnOnce(&mut UserTable) -> T) -> T {
        f(&mut self.tables.users.lock())
    }

    pub(crate) fn with_sessions<T>(&self, f: impl FnOnce(&mut SessionTable) -> T) -> T {
        f(&mut self.tables.sessions.lock())
    }

    /// Both groups, acquired in lock order.
    pub(crate) fn with_users_and_sessions<T>(
        &self,
        f: impl FnOnce(&mut UserTable, &mut SessionTable) -> T,
    ) -> T {
        let mut users = self.tables.users.lock();
        let mut sessions = self.tables.sessions.lock();
        f(&mut users, &mut sessions)
    }

    pub(crate) fn with_chat<T>(&self, f: impl FnOnce(&mut ChatTable) -> T) -> T {
        f(&mut self.tables.chat.lock())
    }

    pub(crate) fn with_exercises<T>(&self, f: impl FnOnce(&mut ExerciseTable) -> T) -> T {
        f(&mut self.tables.exercises.lock())
    }

    pub(crate) fn with_games<T>(&self, f: impl FnOnce(&mut GameTable) -> T) -> T {
        f(&mut self.tables.games.lock())
    }

    pub(crate) fn with_content<T>(&self, f: impl FnOnce(&mut ContentTable) -> T) -> T {
        f(&mut self.tables.content.lock())
    }

    pub(crate) fn with_calls<T>(&self, f: impl FnOnce(&mut CallTable) -> T) -> T {
        f(&mut self.tables.calls.lock())
    }

    pub fn counts(&self) -> StoreCounts {
        let mut c = StoreCounts::default();
        self.with_users(|t| {
            c.users = t.by_id.len();
            c.online_users = t.by_id.values().filter(|u| u.online).count();
        });
        self.with_sessions(|t| c.sessions = t.by_token.len());
        self.with_chat(|t| c.messages = t.messages.len());
        self.with_exercises(|t| {
            c.exercises = t.exercises.len();
            c.submissions = t.submissions.len();
        });
        self.with_games(|t| {
            c.games = t.games.len();
            c.game_sessions = t.sessions.len();
        });
        self.with_content(|t| {
            c.lessons = t.lessons.len();
            c.tests = t.tests.len();
        });
        self.with_calls(|t| c.active_calls = t.calls.len());
        c
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore").finish_non_exhaustive()
    }
}
