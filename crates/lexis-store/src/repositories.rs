use std::sync::Arc;

use crate::calls::{CallRepository, MemoryCallRepo};
use crate::chat::{ChatRepository, MemoryChatRepo};
use crate::content::{LessonRepository, MemoryLessonRepo, MemoryTestRepo, TestRepository};
use crate::exercises::{ExerciseRepository, MemoryExerciseRepo};
use crate::games::{GameRepository, MemoryGameRepo};
use crate::sessions::{MemorySessionRepo, SessionRepository};
use crate::store::EntityStore;
use crate::users::{MemoryUserRepo, UserRepository};

/// Every repository as a trait handle, for constructor injection.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub chat: Arc<dyn ChatRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub tests: Arc<dyn TestRepository>,
    pub exercises: Arc<dyn ExerciseRepository>,
    pub games: Arc<dyn GameRepository>,
    pub calls: Arc<dyn CallRepository>,
}

impl Repositories {
    pub fn in_memory(store: &EntityStore) -> Self {
        Self {
            users: Arc::new(MemoryUserRepo::new(store.clone())),
            sessions: Arc::new(MemorySessionRepo::new(store.clone())),
            chat: Arc::new(MemoryChatRepo::new(store.clone())),
            lessons: Arc::new(MemoryLessonRepo::new(store.clone())),
            tests: Arc::new(MemoryTestRepo::new(store.clone())),
            exercises: Arc::new(MemoryExerciseRepo::new(store.clone())),
            games: Arc::new(MemoryGameRepo::new(store.clone())),
            calls: Arc::new(MemoryCallRepo::new(store.clone())),
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
