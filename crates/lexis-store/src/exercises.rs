use lexis_core::entities::{
    Exercise, ExerciseSubmission, ExerciseType, Level, NewExercise, Scores, SubmissionStatus,
};
use lexis_core::ids::{ExerciseId, SubmissionId, UserId};
use tracing::instrument;

use crate::error::StoreError;
use crate::store::{EntityStore, ExerciseTable};

/// Exercises and their submissions.
///
/// Status changes read and write under the same lock, so two reviewers
/// racing on one submission see exactly one success.
pub trait ExerciseRepository: Send + Sync {
    fn create(&self, new: NewExercise, created_by: &UserId) -> Exercise;
    fn find_by_id(&self, id: &ExerciseId) -> Option<Exercise>;
    fn find_all(&self, kind: Option<ExerciseType>, level: Option<Level>) -> Vec<Exercise>;

    /// Create or update the user's open draft for this exercise.
    fn save_draft(
        &self,
        user: &UserId,
        exercise: &ExerciseId,
        content: String,
    ) -> Result<ExerciseSubmission, StoreError>;

    /// Promote the open draft to pending review, or start a new attempt
    /// directly in pending review.
    fn submit(
        &self,
        user: &UserId,
        exercise: &ExerciseId,
        content: String,
    ) -> Result<ExerciseSubmission, StoreError>;

    /// Fails with `InvalidTransition` unless the submission is pending.
    fn review(
        &self,
        id: &SubmissionId,
        reviewer: &UserId,
        scores: Scores,
        feedback: String,
    ) -> Result<ExerciseSubmission, StoreError>;

    fn find_submission(&self, id: &SubmissionId) -> Option<ExerciseSubmission>;
    fn submissions_for_user(
        &self,
        user: &UserId,
        exercise: Option<&ExerciseId>,
    ) -> Vec<ExerciseSubmission>;

    /// Oldest submission first.
    fn pending_review(&self) -> Vec<ExerciseSubmission>;
    fn reviewed_for_user(&self, user: &UserId) -> Vec<ExerciseSubmission>;
}

pub struct MemoryExerciseRepo {
    store: EntityStore,
}

impl MemoryExerciseRepo {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

fn open_draft<'a>(
    t: &'a mut ExerciseTable,
    user: &UserId,
    exercise: &ExerciseId,
) -> Option<&'a mut ExerciseSubmission> {
    t.submissions.values_mut().find(|s| {
        &s.user_id == user && &s.exercise_id == exercise && s.status == SubmissionStatus::Draft
    })
}

fn next_attempt(t: &ExerciseTable, user: &UserId, exercise: &ExerciseId) -> u32 {
    t.submissions
        .values()
        .filter(|s| &s.user_id == user && &s.exercise_id == exercise)
        .map(|s| s.attempt_number)
        .max()
        .unwrap_or(0)
        + 1
}

fn transition(
    sub: &mut ExerciseSubmission,
    next: SubmissionStatus,
) -> Result<(), StoreError> {
    if !sub.status.can_transition_to(next) {
        return Err(StoreError::InvalidTransition(format!(
            "Submission is {}, cannot move to {}",
            sub.status, next
        )));
    }
    sub.status = next;
    Ok(())
}

impl MemoryExerciseRepo {
    fn start_attempt(
        &self,
        t: &mut ExerciseTable,
        user: &UserId,
        exercise: &ExerciseId,
        content: String,
        status: SubmissionStatus,
    ) -> ExerciseSubmission {
        let now = self.store.now();
        let sub = ExerciseSubmission {
            submission_id: SubmissionId::new(),
            exercise_id: exercise.clone(),
            user_id: user.clone(),
            content,
            status,
            scores: None,
            overall_score: None,
            feedback: None,
            reviewer_id: None,
            attempt_number: next_attempt(t, user, exercise),
            created_at: now,
            updated_at: now,
            submitted_at: (status == SubmissionStatus::PendingReview).then_some(now),
            reviewed_at: None,
        };
        let _ = t.submissions.insert(sub.submission_id.clone(), sub.clone());
        sub
    }
}

impl ExerciseRepository for MemoryExerciseRepo {
    fn create(&self, new: NewExercise, created_by: &UserId) -> Exercise {
        let exercise = Exercise {
            exercise_id: ExerciseId::new(),
            exercise_type: new.exercise_type,
            level: new.level,
            title: new.title,
            prompt: new.prompt,
            requirements: new.requirements,
            min_words: new.min_words,
            max_words: new.max_words,
            created_by: created_by.clone(),
            created_at: self.store.now(),
        };
        self.store.with_exercises(|t| {
            let _ = t.exercises.insert(exercise.exercise_id.clone(), exercise.clone());
        });
        exercise
    }

    fn find_by_id(&self, id: &ExerciseId) -> Option<Exercise> {
        self.store.with_exercises(|t| t.exercises.get(id).cloned())
    }

    fn find_all(&self, kind: Option<ExerciseType>, level: Option<Level>) -> Vec<Exercise> {
        self.store.with_exercises(|t| {
            t.exercises
                .values()
                .filter(|e| kind.map_or(true, |k| e.exercise_type == k))
                .filter(|e| level.map_or(true, |l| e.level == l))
                .cloned()
                .collect()
        })
    }

    fn save_draft(
        &self,
        user: &UserId,
        exercise: &ExerciseId,
        content: String,
    ) -> Result<ExerciseSubmission, StoreError> {
        let now = self.store.now();
        self.store.with_exercises(|t| {
            if !t.exercises.contains_key(exercise) {
                return Err(StoreError::NotFound("Exercise not found".into()));
            }
            if let Some(draft) = open_draft(t, user, exercise) {
                transition(draft, SubmissionStatus::Draft)?;
                draft.content = content;
                draft.updated_at = now;
                return Ok(draft.clone());
            }
            Ok(self.start_attempt(t, user, exercise, content, SubmissionStatus::Draft))
        })
    }

    #[instrument(skip(self, content), fields(user_id = %user, exercise_id = %exercise))]
    fn submit(
        &self,
        user: &UserId,
        exercise: &ExerciseId,
        content: String,
    ) -> Result<ExerciseSubmission, StoreError> {
        let now = self.store.now();
        self.store.with_exercises(|t| {
            if !t.exercises.contains_key(exercise) {
                return Err(StoreError::NotFound("Exercise not found".into()));
            }
            if let Some(draft) = open_draft(t, user, exercise) {
                transition(draft, SubmissionStatus::PendingReview)?;
                draft.content = content;
                draft.updated_at = now;
                draft.submitted_at = Some(now);
                return Ok(draft.clone());
            }
            Ok(self.start_attempt(t, user, exercise, content, SubmissionStatus::PendingReview))
        })
    }

    #[instrument(skip(self, scores, feedback), fields(submission_id = %id, reviewer = %reviewer))]
    fn review(
        &self,
        id: &SubmissionId,
        reviewer: &UserId,
        scores: Scores,
        feedback: String,
    ) -> Result<ExerciseSubmission, StoreError> {
        let now = self.store.now();
        self.store.with_exercises(|t| {
            let sub = t
                .submissions
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound("Submission not found".into()))?;
            if sub.status == SubmissionStatus::Reviewed {
                return Err(StoreError::InvalidTransition(
                    "Submission has already been reviewed".into(),
                ));
            }
            transition(sub, SubmissionStatus::Reviewed)?;
            sub.scores = Some(scores);
            sub.overall_score = Some(scores.overall());
            sub.feedback = Some(feedback);
            sub.reviewer_id = Some(reviewer.clone());
            sub.reviewed_at = Some(now);
            sub.updated_at = now;
            Ok(sub.clone())
        })
    }

    fn find_submission(&self, id: &SubmissionId) -> Option<ExerciseSubmission> {
        self.store.with_exercises(|t| t.submissions.get(id).cloned())
    }

    fn submissions_for_user(
        &self,
        user: &UserId,
        exercise: Option<&ExerciseId>,
    ) -> Vec<ExerciseSubmission> {
        self.store.with_exercises(|t| {
            t.submissions
                .values()
                .filter(|s| &s.user_id == user)
                .filter(|s| exercise.map_or(true, |e| &s.exercise_id == e))
                .cloned()
                .collect()
        })
    }

    fn pending_review(&self) -> Vec<ExerciseSubmission> {
        let mut pending = self.store.with_exercises(|t| {
            t.submissions
                .values()
                .filter(|s| s.status == SubmissionStatus::PendingReview)
                .cloned()
                .collect::<Vec<_>>()
        });
        pending.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        pending
    }

    fn reviewed_for_user(&self, user: &UserId) -> Vec<ExerciseSubmission> {
        self.store.with_exercises(|t| {
            t.submissions
                .values()
                .filter(|s| &s.user_id == user && s.status == SubmissionStatus::Reviewed)
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn setup() -> (MemoryExerciseRepo, Exercise) {
        let repo = MemoryExerciseRepo::new(EntityStore::new());
        let ex = repo.create(
            NewExercise {
                exercise_type: ExerciseType::ParagraphWriting,
                level: Level::Intermediate,
                title: "My weekend".into(),
                prompt: "Describe your weekend".into(),
                requirements: vec!["Use past tense".into()],
                min_words: 3,
                max_words: 50,
            },
            &UserId::new(),
        );
        (repo, ex)
    }

    fn scores() -> Scores {
        Scores {
            grammar: 80,
            vocabulary: 80,
            coherence: 80,
            task_achievement: 80,
        }
    }

    #[test]
    fn draft_then_submit_then_review() {
        let (repo, ex) = setup();
        let student = UserId::new();
        let draft = repo.save_draft(&student, &ex.exercise_id, "first".into()).unwrap();
        assert_eq!(draft.status, SubmissionStatus::Draft);
        assert_eq!(draft.attempt_number, 1);

        let again = repo.save_draft(&student, &ex.exercise_id, "second".into()).unwrap();
        assert_eq!(again.submission_id, draft.submission_id);
        assert_eq!(again.content, "second");

        let submitted = repo.submit(&student, &ex.exercise_id, "final text".into()).unwrap();
        assert_eq!(submitted.submission_id, draft.submission_id);
        assert_eq!(submitted.status, SubmissionStatus::PendingReview);
        assert!(submitted.submitted_at.is_some());

        let reviewed = repo
            .review(&submitted.submission_id, &UserId::new(), scores(), "Good".into())
            .unwrap();
        assert_eq!(reviewed.status, SubmissionStatus::Reviewed);
        assert_eq!(reviewed.overall_score, Some(80));
        assert_eq!(repo.reviewed_for_user(&student).len(), 1);
    }

    #[test]
    fn direct_submit_skips_draft() {
        let (repo, ex) = setup();
        let student = UserId::new();
        let sub = repo.submit(&student, &ex.exercise_id, "straight in".into()).unwrap();
        assert_eq!(sub.status, SubmissionStatus::PendingReview);
        assert_eq!(sub.attempt_number, 1);
        assert_eq!(repo.pending_review().len(), 1);
    }

    #[test]
    fn attempts_increment_per_user_and_exercise() {
        let (repo, ex) = setup();
        let student = UserId::new();
        let other = UserId::new();
        let one = repo.submit(&student, &ex.exercise_id, "a".into()).unwrap();
        let two = repo.submit(&student, &ex.exercise_id, "b".into()).unwrap();
        let draft = repo.save_draft(&student, &ex.exercise_id, "c".into()).unwrap();
        let theirs = repo.submit(&other, &ex.exercise_id, "x".into()).unwrap();
        assert_eq!(
            (one.attempt_number, two.attempt_number, draft.attempt_number),
            (1, 2, 3)
        );
        assert_eq!(theirs.attempt_number, 1);
        assert_eq!(repo.submissions_for_user(&student, None).len(), 3);
    }

    #[test]
    fn second_review_conflicts() {
        let (repo, ex) = setup();
        let sub = repo.submit(&UserId::new(), &ex.exercise_id, "text".into()).unwrap();
        let reviewer = UserId::new();
        let _ = repo
            .review(&sub.submission_id, &reviewer, scores(), "ok".into())
            .unwrap();
        assert_matches!(
            repo.review(&sub.submission_id, &reviewer, scores(), "again".into()),
            Err(StoreError::InvalidTransition(_))
        );
    }

    #[test]
    fn draft_cannot_be_reviewed() {
        let (repo, ex) = setup();
        let draft = repo.save_draft(&UserId::new(), &ex.exercise_id, "wip".into()).unwrap();
        assert_matches!(
            repo.review(&draft.submission_id, &UserId::new(), scores(), "no".into()),
            Err(StoreError::InvalidTransition(_))
        );
        assert!(repo.pending_review().is_empty());
    }

    #[test]
    fn unknown_exercise_or_submission() {
        let (repo, _) = setup();
        assert_matches!(
            repo.submit(&UserId::new(), &ExerciseId::new(), "x".into()),
            Err(StoreError::NotFound(_))
        );
        assert_matches!(
            repo.review(&SubmissionId::new(), &UserId::new(), scores(), "x".into()),
            Err(StoreError::NotFound(_))
        );
    }

    #[test]
    fn racing_reviewers_produce_one_success() {
        let (repo, ex) = setup();
        let repo = Arc::new(repo);
        let sub = repo.submit(&UserId::new(), &ex.exercise_id, "text".into()).unwrap();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = Arc::clone(&repo);
                let id = sub.submission_id.clone();
                std::thread::spawn(move || repo.review(&id, &UserId::new(), scores(), "f".into()))
            })
            .collect();
        let ok = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(ok, 1);
    }
}
