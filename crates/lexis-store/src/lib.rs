//! # lexis-store
//!
//! In-memory storage for every Lexis entity.
//!
//! [`EntityStore`] owns the maps, each entity group behind its own
//! `parking_lot::Mutex`. Repositories are thin typed façades over it, one
//! trait per group, so a persistent backend can slot in behind the same
//! traits. Every read hands back an owned snapshot.

#![deny(unsafe_code)]

pub mod calls;
pub mod chat;
pub mod content;
pub mod error;
pub mod exercises;
pub mod games;
pub mod repositories;
pub mod seed;
pub mod sessions;
pub mod store;
pub mod users;

pub use calls::CallRepository;
pub use chat::{ChatRepository, ConversationSummary};
pub use content::{LessonRepository, TestRepository};
pub use error::StoreError;
pub use exercises::ExerciseRepository;
pub use games::{Completion, GameRepository, LeaderboardEntry};
pub use repositories::Repositories;
pub use sessions::SessionRepository;
pub use store::{EntityStore, StoreCounts};
pub use users::{normalize_email, UserRepository};
