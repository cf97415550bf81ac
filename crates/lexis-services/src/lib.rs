//! # lexis-services
//!
//! Business rules over the repository traits. Services return plain values
//! or [`LexisError`](lexis_core::LexisError)s and never touch sockets; the
//! server decides what to push.

#![deny(unsafe_code)]

pub mod accounts;
pub mod assessments;
pub mod calls;
pub mod chat;
pub mod exercises;
pub mod games;
pub mod lessons;
mod validate;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use lexis_auth::SessionManager;
use lexis_core::Clock;
use lexis_store::Repositories;

pub use accounts::{AccountService, Attached, Detached, Registration, INVALID_CREDENTIALS};
pub use assessments::AssessmentService;
pub use calls::CallService;
pub use chat::{ChatLimits, ChatService, SenderUnread, UnreadSummary};
pub use exercises::ExerciseService;
pub use games::{GameRound, GameService};
pub use lessons::LessonService;

/// Every service, built once and shared by all connections.
#[derive(Clone)]
pub struct Services {
    pub accounts: Arc<AccountService>,
    pub chat: Arc<ChatService>,
    pub lessons: Arc<LessonService>,
    pub assessments: Arc<AssessmentService>,
    pub exercises: Arc<ExerciseService>,
    pub games: Arc<GameService>,
    pub calls: Arc<CallService>,
}

impl Services {
    pub fn new(
        repos: &Repositories,
        sessions: Arc<SessionManager>,
        clock: Arc<dyn Clock>,
        chat_limits: ChatLimits,
    ) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(Arc::clone(&repos.users), sessions)),
            chat: Arc::new(ChatService::new(
                Arc::clone(&repos.users),
                Arc::clone(&repos.chat),
                chat_limits,
            )),
            lessons: Arc::new(LessonService::new(Arc::clone(&repos.lessons))),
            assessments: Arc::new(AssessmentService::new(
                Arc::clone(&repos.tests),
                Arc::clone(&repos.lessons),
                Arc::clone(&clock),
            )),
            exercises: Arc::new(ExerciseService::new(Arc::clone(&repos.exercises))),
            games: Arc::new(GameService::new(Arc::clone(&repos.games), Arc::clone(&clock))),
            calls: Arc::new(CallService::new(
                Arc::clone(&repos.users),
                Arc::clone(&repos.calls),
                clock,
            )),
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
