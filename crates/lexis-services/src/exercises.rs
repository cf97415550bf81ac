use std::sync::Arc;

use lexis_core::entities::{
    word_count, Exercise, ExerciseSubmission, ExerciseType, Level, NewExercise, Scores,
};
use lexis_core::ids::{ExerciseId, SubmissionId, UserId};
use lexis_core::{LexisError, Result};
use lexis_store::ExerciseRepository;
use tracing::info;

use crate::validate::non_blank;

pub struct ExerciseService {
    exercises: Arc<dyn ExerciseRepository>,
}

impl ExerciseService {
    pub fn new(exercises: Arc<dyn ExerciseRepository>) -> Self {
        Self { exercises }
    }

    pub fn list(&self, kind: Option<ExerciseType>, level: Option<Level>) -> Vec<Exercise> {
        self.exercises.find_all(kind, level)
    }

    pub fn get(&self, id: &ExerciseId) -> Result<Exercise> {
        self.exercises
            .find_by_id(id)
            .ok_or_else(|| LexisError::not_found("Exercise not found"))
    }

    pub fn create(&self, mut new: NewExercise, author: &UserId) -> Result<Exercise> {
        new.title = non_blank("title", &new.title)?.to_owned();
        new.prompt = non_blank("prompt", &new.prompt)?.to_owned();
        if new.max_words == 0 || new.min_words > new.max_words {
            return Err(LexisError::validation(
                "Word limits must satisfy 0 <= minWords <= maxWords and maxWords > 0",
            ));
        }
        let exercise = self.exercises.create(new, author);
        info!(exercise_id = %exercise.exercise_id, kind = %exercise.exercise_type, "exercise created");
        Ok(exercise)
    }

    /// Drafts are not length-checked; only submission is.
    pub fn save_draft(&self, user: &UserId, exercise: &ExerciseId, content: &str) -> Result<ExerciseSubmission> {
        Ok(self.exercises.save_draft(user, exercise, content.to_owned())?)
    }

    pub fn submit(&self, user: &UserId, exercise: &ExerciseId, content: &str) -> Result<ExerciseSubmission> {
        let ex = self.get(exercise)?;
        let words = word_count(content);
        if !ex.accepts_length(words) {
            return Err(LexisError::validation(format!(
                "Submission must be between {} and {} words (got {words})",
                ex.min_words, ex.max_words
            )));
        }
        let sub = self.exercises.submit(user, exercise, content.to_owned())?;
        info!(
            submission_id = %sub.submission_id,
            user_id = %user,
            attempt = sub.attempt_number,
            "exercise submitted"
        );
        Ok(sub)
    }

    pub fn my_submissions(&self, user: &UserId, exercise: Option<&ExerciseId>) -> Vec<ExerciseSubmission> {
        self.exercises.submissions_for_user(user, exercise)
    }

    /// Oldest first.
    pub fn pending(&self) -> Vec<ExerciseSubmission> {
        self.exercises.pending_review()
    }

    /// A second review of the same submission fails with `Conflict`.
    pub fn review(
        &self,
        reviewer: &UserId,
        submission: &SubmissionId,
        scores: Scores,
        feedback: &str,
    ) -> Result<ExerciseSubmission> {
        if !scores.is_valid() {
            return Err(LexisError::validation(format!(
                "Scores must be between 0 and {}",
                Scores::MAX
            )));
        }
        let existing = self
            .exercises
            .find_submission(submission)
            .ok_or_else(|| LexisError::not_found("Submission not found"))?;
        if &existing.user_id == reviewer {
            return Err(LexisError::forbidden("You cannot review your own submission"));
        }
        let reviewed = self
            .exercises
            .review(submission, reviewer, scores, feedback.trim().to_owned())?;
        info!(
            submission_id = %submission,
            reviewer = %reviewer,
            overall = ?reviewed.overall_score,
            "submission reviewed"
        );
        Ok(reviewed)
    }

    pub fn feedback(&self, user: &UserId) -> Vec<ExerciseSubmission> {
        self.exercises.reviewed_for_user(user)
    }
}
