use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Level;
use crate::ids::{LessonId, QuestionId, TestId, TestResultId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub lesson_id: LessonId,
    pub title: String,
    pub description: String,
    pub level: Level,
    pub topic: String,
    pub content: String,
    pub duration_minutes: u32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewLesson {
    pub title: String,
    pub description: String,
    pub level: Level,
    pub topic: String,
    pub content: String,
    pub duration_minutes: u32,
}

/// Partial lesson update; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct LessonPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<Level>,
    pub topic: Option<String>,
    pub content: Option<String>,
    pub duration_minutes: Option<u32>,
}

impl LessonPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.level.is_none()
            && self.topic.is_none()
            && self.content.is_none()
            && self.duration_minutes.is_none()
    }

    pub fn apply(self, lesson: &mut Lesson) {
        if let Some(v) = self.title {
            lesson.title = v;
        }
        if let Some(v) = self.description {
            lesson.description = v;
        }
        if let Some(v) = self.level {
            lesson.level = v;
        }
        if let Some(v) = self.topic {
            lesson.topic = v;
        }
        if let Some(v) = self.content {
            lesson.content = v;
        }
        if let Some(v) = self.duration_minutes {
            lesson.duration_minutes = v;
        }
    }
}

/// Multiple-choice question. `correct_option` indexes into `options`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestQuestion {
    pub question_id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    pub points: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub test_id: TestId,
    pub lesson_id: Option<LessonId>,
    pub title: String,
    pub level: Level,
    pub time_limit_minutes: u32,
    /// Minimum percentage needed to pass.
    pub pass_score: u32,
    pub questions: Vec<TestQuestion>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Test {
    pub fn max_score(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }

    /// The test as students see it: answers stripped.
    pub fn student_view(&self) -> serde_json::Value {
        let questions: Vec<serde_json::Value> = self
            .questions
            .iter()
            .map(|q| {
                serde_json::json!({
                    "questionId": q.question_id,
                    "prompt": q.prompt,
                    "options": q.options,
                    "points": q.points,
                })
            })
            .collect();
        serde_json::json!({
            "testId": self.test_id,
            "lessonId": self.lesson_id,
            "title": self.title,
            "level": self.level,
            "timeLimitMinutes": self.time_limit_minutes,
            "passScore": self.pass_score,
            "maxScore": self.max_score(),
            "questions": questions,
        })
    }
}

#[derive(Clone, Debug)]
pub struct NewTestQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    pub points: u32,
}

#[derive(Clone, Debug)]
pub struct NewTest {
    pub lesson_id: Option<LessonId>,
    pub title: String,
    pub level: Level,
    pub time_limit_minutes: u32,
    pub pass_score: u32,
    pub questions: Vec<NewTestQuestion>,
}

/// A graded test attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub result_id: TestResultId,
    pub test_id: TestId,
    pub user_id: UserId,
    pub answers: Vec<Option<usize>>,
    pub correct_count: u32,
    pub score: u32,
    pub max_score: u32,
    pub percentage: u32,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
}
