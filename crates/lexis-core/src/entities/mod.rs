//! Domain records owned by the entity store.
//!
//! Every accessor in the store hands out clones of these, never references
//! into the backing maps.

/// Implements `Display` and `FromStr` over a fixed set of wire names.
macro_rules! wire_enum {
    ($ty:ident, $label:expr, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {other}", $label)),
                }
            }
        }
    };
}
pub(crate) use wire_enum;

mod calls;
mod chat;
mod exercises;
mod games;
mod lessons;
mod sessions;
mod users;

pub use calls::{CallState, VoiceCall};
pub use chat::ChatMessage;
pub use exercises::{Exercise, ExerciseSubmission, ExerciseType, NewExercise, Scores, SubmissionStatus};
pub use games::{Game, GameMatch, GamePair, GameSession, GameType, NewGame};
pub use lessons::{Lesson, LessonPatch, NewLesson, NewTest, NewTestQuestion, Test, TestQuestion, TestResult};
pub use sessions::Session;
pub use users::{Level, NewUser, Role, User, UserPatch, UserProfile};

/// Whitespace-delimited word count used for exercise length limits.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
