use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{wire_enum, Level};
use crate::ids::{ExerciseId, SubmissionId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    SentenceRewrite,
    ParagraphWriting,
    TopicSpeaking,
}

wire_enum!(ExerciseType, "exercise type", {
    SentenceRewrite => "sentence_rewrite",
    ParagraphWriting => "paragraph_writing",
    TopicSpeaking => "topic_speaking",
});

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub exercise_id: ExerciseId,
    pub exercise_type: ExerciseType,
    pub level: Level,
    pub title: String,
    pub prompt: String,
    pub requirements: Vec<String>,
    pub min_words: u32,
    pub max_words: u32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Exercise {
    pub fn accepts_length(&self, words: usize) -> bool {
        let words = words as u64;
        words >= u64::from(self.min_words) && words <= u64::from(self.max_words)
    }
}

#[derive(Clone, Debug)]
pub struct NewExercise {
    pub exercise_type: ExerciseType,
    pub level: Level,
    pub title: String,
    pub prompt: String,
    pub requirements: Vec<String>,
    pub min_words: u32,
    pub max_words: u32,
}

/// Review lifecycle. Moves forward only: draft → pending_review → reviewed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    PendingReview,
    Reviewed,
}

wire_enum!(SubmissionStatus, "submission status", {
    Draft => "draft",
    PendingReview => "pending_review",
    Reviewed => "reviewed",
});

impl SubmissionStatus {
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Draft)
                | (Self::Draft, Self::PendingReview)
                | (Self::PendingReview, Self::Reviewed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Reviewed
    }
}

/// Teacher-assigned marks, each 0-100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub grammar: u8,
    pub vocabulary: u8,
    pub coherence: u8,
    pub task_achievement: u8,
}

impl Scores {
    pub const MAX: u8 = 100;

    pub fn is_valid(&self) -> bool {
        [self.grammar, self.vocabulary, self.coherence, self.task_achievement]
            .iter()
            .all(|s| *s <= Self::MAX)
    }

    /// Rounded-down mean of the four marks.
    pub fn overall(&self) -> u8 {
        let sum = u32::from(self.grammar)
            + u32::from(self.vocabulary)
            + u32::from(self.coherence)
            + u32::from(self.task_achievement);
        (sum / 4) as u8
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSubmission {
    pub submission_id: SubmissionId,
    pub exercise_id: ExerciseId,
    pub user_id: UserId,
    pub content: String,
    pub status: SubmissionStatus,
    pub scores: Option<Scores>,
    pub overall_score: Option<u8>,
    pub feedback: Option<String>,
    pub reviewer_id: Option<UserId>,
    pub attempt_number: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        use SubmissionStatus::*;
        assert!(Draft.can_transition_to(PendingReview));
        assert!(PendingReview.can_transition_to(Reviewed));
        assert!(Draft.can_transition_to(Draft));

        assert!(!Draft.can_transition_to(Reviewed));
        assert!(!PendingReview.can_transition_to(Draft));
        assert!(!PendingReview.can_transition_to(PendingReview));
        assert!(!Reviewed.can_transition_to(Reviewed));
        assert!(!Reviewed.can_transition_to(Draft));
        assert!(Reviewed.is_terminal());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(SubmissionStatus::PendingReview.to_string(), "pending_review");
        assert_eq!(
            serde_json::to_value(SubmissionStatus::PendingReview).unwrap(),
            "pending_review"
        );
        assert_eq!(
            "topic_speaking".parse::<ExerciseType>().unwrap(),
            ExerciseType::TopicSpeaking
        );
    }

    #[test]
    fn scores_overall_rounds_down() {
        let s = Scores {
            grammar: 80,
            vocabulary: 75,
            coherence: 90,
            task_achievement: 70,
        };
        assert!(s.is_valid());
        assert_eq!(s.overall(), 78);
    }

    #[test]
    fn scores_reject_out_of_range() {
        let s = Scores {
            grammar: 101,
            vocabulary: 0,
            coherence: 0,
            task_achievement: 0,
        };
        assert!(!s.is_valid());
    }
}
