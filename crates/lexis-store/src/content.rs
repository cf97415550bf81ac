//! Lessons, tests and test results. Read-mostly; writes are role-gated by
//! the services above.

use lexis_core::entities::{
    Lesson, LessonPatch, Level, NewLesson, NewTest, Test, TestQuestion, TestResult,
};
use lexis_core::ids::{LessonId, QuestionId, TestId, UserId};

use crate::error::StoreError;
use crate::store::EntityStore;

pub trait LessonRepository: Send + Sync {
    fn create(&self, new: NewLesson, created_by: &UserId) -> Lesson;
    fn find_by_id(&self, id: &LessonId) -> Option<Lesson>;
    fn find_all(&self, level: Option<Level>, topic: Option<&str>) -> Vec<Lesson>;
    fn update(&self, id: &LessonId, patch: LessonPatch) -> Result<Lesson, StoreError>;
    fn delete(&self, id: &LessonId) -> bool;
}

pub trait TestRepository: Send + Sync {
    fn create(&self, new: NewTest, created_by: &UserId) -> Test;
    fn find_by_id(&self, id: &TestId) -> Option<Test>;
    fn find_all(&self, level: Option<Level>, lesson: Option<&LessonId>) -> Vec<Test>;
    fn record_result(&self, result: TestResult);
    /// Newest first.
    fn results_for_user(&self, user: &UserId, test: Option<&TestId>) -> Vec<TestResult>;
}

pub struct MemoryLessonRepo {
    store: EntityStore,
}

impl MemoryLessonRepo {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

impl LessonRepository for MemoryLessonRepo {
    fn create(&self, new: NewLesson, created_by: &UserId) -> Lesson {
        let now = self.store.now();
        let lesson = Lesson {
            lesson_id: LessonId::new(),
            title: new.title,
            description: new.description,
            level: new.level,
            topic: new.topic,
            content: new.content,
            duration_minutes: new.duration_minutes,
            created_by: created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.with_content(|t| {
            let _ = t.lessons.insert(lesson.lesson_id.clone(), lesson.clone());
        });
        lesson
    }

    fn find_by_id(&self, id: &LessonId) -> Option<Lesson> {
        self.store.with_content(|t| t.lessons.get(id).cloned())
    }

    fn find_all(&self, level: Option<Level>, topic: Option<&str>) -> Vec<Lesson> {
        self.store.with_content(|t| {
            t.lessons
                .values()
                .filter(|l| level.map_or(true, |lv| l.level == lv))
                .filter(|l| topic.map_or(true, |tp| l.topic.eq_ignore_ascii_case(tp)))
                .cloned()
                .collect()
        })
    }

    fn update(&self, id: &LessonId, patch: LessonPatch) -> Result<Lesson, StoreError> {
        let now = self.store.now();
        self.store.with_content(|t| {
            let lesson = t
                .lessons
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound("Lesson not found".into()))?;
            patch.apply(lesson);
            lesson.updated_at = now;
            Ok(lesson.clone())
        })
    }

    fn delete(&self, id: &LessonId) -> bool {
        self.store.with_content(|t| t.lessons.remove(id).is_some())
    }
}

pub struct MemoryTestRepo {
    store: EntityStore,
}

impl MemoryTestRepo {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

impl TestRepository for MemoryTestRepo {
    fn create(&self, new: NewTest, created_by: &UserId) -> Test {
        let test = Test {
            test_id: TestId::new(),
            lesson_id: new.lesson_id,
            title: new.title,
            level: new.level,
            time_limit_minutes: new.time_limit_minutes,
            pass_score: new.pass_score,
            questions: new
                .questions
                .into_iter()
                .map(|q| TestQuestion {
                    question_id: QuestionId::new(),
                    prompt: q.prompt,
                    options: q.options,
                    correct_option: q.correct_option,
                    points: q.points,
                })
                .collect(),
            created_by: created_by.clone(),
            created_at: self.store.now(),
        };
        self.store.with_content(|t| {
            let _ = t.tests.insert(test.test_id.clone(), test.clone());
        });
        test
    }

    fn find_by_id(&self, id: &TestId) -> Option<Test> {
        self.store.with_content(|t| t.tests.get(id).cloned())
    }

    fn find_all(&self, level: Option<Level>, lesson: Option<&LessonId>) -> Vec<Test> {
        self.store.with_content(|t| {
            t.tests
                .values()
                .filter(|x| level.map_or(true, |lv| x.level == lv))
                .filter(|x| lesson.map_or(true, |l| x.lesson_id.as_ref() == Some(l)))
                .cloned()
                .collect()
        })
    }

    fn record_result(&self, result: TestResult) {
        self.store.with_content(|t| {
            let _ = t.results.insert(result.result_id.clone(), result);
        });
    }

    fn results_for_user(&self, user: &UserId, test: Option<&TestId>) -> Vec<TestResult> {
        self.store.with_content(|t| {
            t.results
                .values()
                .rev()
                .filter(|r| &r.user_id == user)
                .filter(|r| test.map_or(true, |id| &r.test_id == id))
                .cloned()
                .collect()
        })
    }
}
