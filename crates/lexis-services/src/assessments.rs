//! Multiple-choice tests and their grading.

use std::sync::Arc;

use lexis_core::entities::{Level, NewTest, Test, TestResult};
use lexis_core::ids::{LessonId, TestId, TestResultId, UserId};
use lexis_core::{Clock, LexisError, Result};
use lexis_store::{LessonRepository, TestRepository};
use tracing::info;

use crate::validate::non_blank;

pub struct AssessmentService {
    tests: Arc<dyn TestRepository>,
    lessons: Arc<dyn LessonRepository>,
    clock: Arc<dyn Clock>,
}

impl AssessmentService {
    pub fn new(
        tests: Arc<dyn TestRepository>,
        lessons: Arc<dyn LessonRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tests,
            lessons,
            clock,
        }
    }

    pub fn list(&self, level: Option<Level>, lesson: Option<&LessonId>) -> Vec<Test> {
        self.tests.find_all(level, lesson)
    }

    pub fn get(&self, id: &TestId) -> Result<Test> {
        self.tests
            .find_by_id(id)
            .ok_or_else(|| LexisError::not_found("Test not found"))
    }

    pub fn create(&self, mut new: NewTest, author: &UserId) -> Result<Test> {
        new.title = non_blank("title", &new.title)?.to_owned();
        if new.pass_score > 100 {
            return Err(LexisError::validation("passScore must be between 0 and 100"));
        }
        if new.questions.is_empty() {
            return Err(LexisError::validation("A test needs at least one question"));
        }
        for (i, q) in new.questions.iter().enumerate() {
            let n = i + 1;
            if q.prompt.trim().is_empty() {
                return Err(LexisError::validation(format!("Question {n} has no prompt")));
            }
            if q.options.len() < 2 {
                return Err(LexisError::validation(format!(
                    "Question {n} needs at least two options"
                )));
            }
            if q.correct_option >= q.options.len() {
                return Err(LexisError::validation(format!(
                    "Question {n} has an invalid correct option"
                )));
            }
        }
        if let Some(lesson) = &new.lesson_id {
            if self.lessons.find_by_id(lesson).is_none() {
                return Err(LexisError::not_found("Lesson not found"));
            }
        }
        let test = self.tests.create(new, author);
        info!(test_id = %test.test_id, questions = test.questions.len(), "test created");
        Ok(test)
    }

    /// Grade `answers` (one slot per question, `None` for skipped) and keep
    /// the result.
    pub fn submit(&self, user: &UserId, test_id: &TestId, answers: Vec<Option<usize>>) -> Result<TestResult> {
        let test = self.get(test_id)?;
        if answers.len() > test.questions.len() {
            return Err(LexisError::validation(format!(
                "Too many answers: test has {} questions",
                test.questions.len()
            )));
        }
        let mut correct_count = 0;
        let mut score = 0;
        for (q, answer) in test.questions.iter().zip(&answers) {
            match answer {
                Some(choice) if *choice >= q.options.len() => {
                    return Err(LexisError::validation(format!(
                        "Answer {choice} is out of range for question {}",
                        q.question_id
                    )));
                }
                Some(choice) if *choice == q.correct_option => {
                    correct_count += 1;
                    score += q.points;
                }
                _ => {}
            }
        }
        let mut answers = answers;
        answers.resize(test.questions.len(), None);

        let max_score = test.max_score();
        let percentage = if max_score == 0 {
            0
        } else {
            score * 100 / max_score
        };
        let result = TestResult {
            result_id: TestResultId::new(),
            test_id: test.test_id.clone(),
            user_id: user.clone(),
            answers,
            correct_count,
            score,
            max_score,
            percentage,
            passed: percentage >= test.pass_score,
            submitted_at: self.clock.now(),
        };
        self.tests.record_result(result.clone());
        info!(
            test_id = %test.test_id,
            user_id = %user,
            percentage,
            passed = result.passed,
            "test graded"
        );
        Ok(result)
    }

    pub fn results(&self, user: &UserId, test: Option<&TestId>) -> Vec<TestResult> {
        self.tests.results_for_user(user, test)
    }
}
