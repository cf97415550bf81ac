//! Demo content loaded at startup when seeding is enabled.

use lexis_core::entities::{
    ExerciseType, GamePair, GameType, Level, NewExercise, NewGame, NewLesson, NewTest,
    NewTestQuestion, NewUser, Role,
};
use serde::Serialize;
use tracing::info;

use crate::error::StoreError;
use crate::repositories::Repositories;

pub const ADMIN_EMAIL: &str = "admin@lexis.local";
pub const ADMIN_PASSWORD: &str = "admin";
pub const TEACHER_EMAIL: &str = "teacher@lexis.local";
pub const TEACHER_PASSWORD: &str = "teacher";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub users: usize,
    pub lessons: usize,
    pub tests: usize,
    pub exercises: usize,
    pub games: usize,
}

fn pairs(items: &[(&str, &str)]) -> Vec<GamePair> {
    items
        .iter()
        .map(|(p, a)| GamePair {
            prompt: (*p).to_owned(),
            answer: (*a).to_owned(),
        })
        .collect()
}

fn question(prompt: &str, options: &[&str], correct: usize) -> NewTestQuestion {
    NewTestQuestion {
        prompt: prompt.to_owned(),
        options: options.iter().map(|o| (*o).to_owned()).collect(),
        correct_option: correct,
        points: 1,
    }
}

/// Fails with `Conflict` if the demo accounts already exist.
pub fn seed_demo_data(repos: &Repositories) -> Result<SeedSummary, StoreError> {
    let _admin = repos.users.create(NewUser {
        fullname: "Lexis Admin".into(),
        email: ADMIN_EMAIL.into(),
        password: ADMIN_PASSWORD.into(),
        level: Level::Advanced,
        role: Role::Admin,
    })?;
    let teacher = repos.users.create(NewUser {
        fullname: "Demo Teacher".into(),
        email: TEACHER_EMAIL.into(),
        password: TEACHER_PASSWORD.into(),
        level: Level::Advanced,
        role: Role::Teacher,
    })?;

    let greetings = repos.lessons.create(
        NewLesson {
            title: "Greetings and introductions".into(),
            description: "Saying hello, goodbye and introducing yourself.".into(),
            level: Level::Beginner,
            topic: "Everyday".into(),
            content: "Hello! My name is ... Nice to meet you. Goodbye, see you later.".into(),
            duration_minutes: 15,
        },
        &teacher.id,
    );
    let _travel = repos.lessons.create(
        NewLesson {
            title: "At the airport".into(),
            description: "Check-in, security and boarding vocabulary.".into(),
            level: Level::Intermediate,
            topic: "Travel".into(),
            content: "Where is the check-in desk? May I see your boarding pass?".into(),
            duration_minutes: 25,
        },
        &teacher.id,
    );

    let _quiz = repos.tests.create(
        NewTest {
            lesson_id: Some(greetings.lesson_id.clone()),
            title: "Greetings quiz".into(),
            level: Level::Beginner,
            time_limit_minutes: 10,
            pass_score: 60,
            questions: vec![
                question("Which is a greeting?", &["Goodbye", "Hello", "Thanks"], 1),
                question("Reply to 'Nice to meet you'", &["You too", "No", "Later"], 0),
                question("Which is used when leaving?", &["Hi", "Welcome", "See you later"], 2),
            ],
        },
        &teacher.id,
    );

    let _rewrite = repos.exercises.create(
        NewExercise {
            exercise_type: ExerciseType::SentenceRewrite,
            level: Level::Beginner,
            title: "Past tense rewrite".into(),
            prompt: "Rewrite in the past tense: 'I go to school every day.'".into(),
            requirements: vec!["Use the simple past".into()],
            min_words: 3,
            max_words: 30,
        },
        &teacher.id,
    );
    let _paragraph = repos.exercises.create(
        NewExercise {
            exercise_type: ExerciseType::ParagraphWriting,
            level: Level::Intermediate,
            title: "My last holiday".into(),
            prompt: "Write a short paragraph about your last holiday.".into(),
            requirements: vec![
                "Mention where you went".into(),
                "Describe one activity".into(),
            ],
            min_words: 40,
            max_words: 200,
        },
        &teacher.id,
    );

    let animals = repos.games.create(
        NewGame {
            game_type: GameType::WordMatch,
            title: "Animals".into(),
            level: Level::Beginner,
            pairs: pairs(&[("cat", "mèo"), ("dog", "chó"), ("bird", "chim"), ("fish", "cá")]),
            time_limit_secs: 60,
            max_score: 100,
        },
        &teacher.id,
    );
    let halves = repos.games.create(
        NewGame {
            game_type: GameType::SentenceMatch,
            title: "Finish the sentence".into(),
            level: Level::Intermediate,
            pairs: pairs(&[
                ("I am looking", "forward to it"),
                ("She has been", "waiting for hours"),
                ("They would rather", "stay at home"),
            ]),
            time_limit_secs: 90,
            max_score: 90,
        },
        &teacher.id,
    );
    let _ = repos.games.publish(&animals.game_id)?;
    let _ = repos.games.publish(&halves.game_id)?;

    let summary = SeedSummary {
        users: 2,
        lessons: 2,
        tests: 1,
        exercises: 2,
        games: 2,
    };
    info!(?summary, "demo data seeded");
    Ok(summary)
}
