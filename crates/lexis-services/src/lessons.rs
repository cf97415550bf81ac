use std::sync::Arc;

use lexis_core::entities::{Lesson, LessonPatch, Level, NewLesson};
use lexis_core::ids::{LessonId, UserId};
use lexis_core::{LexisError, Result};
use lexis_store::LessonRepository;
use tracing::info;

use crate::validate::non_blank;

pub struct LessonService {
    lessons: Arc<dyn LessonRepository>,
}

impl LessonService {
    pub fn new(lessons: Arc<dyn LessonRepository>) -> Self {
        Self { lessons }
    }

    pub fn list(&self, level: Option<Level>, topic: Option<&str>) -> Vec<Lesson> {
        self.lessons.find_all(level, topic)
    }

    pub fn detail(&self, id: &LessonId) -> Result<Lesson> {
        self.lessons
            .find_by_id(id)
            .ok_or_else(|| LexisError::not_found("Lesson not found"))
    }

    pub fn create(&self, mut new: NewLesson, author: &UserId) -> Result<Lesson> {
        new.title = non_blank("title", &new.title)?.to_owned();
        new.topic = non_blank("topic", &new.topic)?.to_owned();
        let _ = non_blank("content", &new.content)?;
        let lesson = self.lessons.create(new, author);
        info!(lesson_id = %lesson.lesson_id, author = %author, "lesson created");
        Ok(lesson)
    }

    pub fn update(&self, id: &LessonId, patch: LessonPatch) -> Result<Lesson> {
        if patch.is_empty() {
            return Err(LexisError::validation("Nothing to update"));
        }
        if let Some(title) = &patch.title {
            let _ = non_blank("title", title)?;
        }
        Ok(self.lessons.update(id, patch)?)
    }

    pub fn delete(&self, id: &LessonId) -> Result<()> {
        if !self.lessons.delete(id) {
            return Err(LexisError::not_found("Lesson not found"));
        }
        info!(lesson_id = %id, "lesson deleted");
        Ok(())
    }
}
