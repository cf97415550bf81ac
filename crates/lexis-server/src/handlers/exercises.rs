//! Writing and speaking exercises with teacher review.

use lexis_core::entities::{ExerciseType, Level, NewExercise, Scores};
use lexis_core::ids::{ExerciseId, SubmissionId};
use lexis_core::Result;
use lexis_protocol::params::{
    optional_as, optional_parsed, optional_str, optional_u32, require_as, require_parsed,
    require_str, require_u32,
};
use lexis_protocol::PushType;
use serde_json::{json, Value};
use tracing::instrument;

use super::to_value;
use crate::dispatch::{AccessPolicy, Handler, RequestContext, STAFF};

pub struct GetExercisesHandler;

impl Handler for GetExercisesHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let kind = optional_parsed::<ExerciseType>(body, "type")?;
        let level = optional_parsed::<Level>(body, "level")?;
        let exercises = ctx.server.services.exercises.list(kind, level);
        Ok(json!({"count": exercises.len(), "exercises": to_value(&exercises)?}))
    }
}

pub struct CreateExerciseHandler;

impl Handler for CreateExerciseHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    #[instrument(skip_all, fields(method = "CREATE_EXERCISE"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let new = NewExercise {
            exercise_type: require_parsed(body, "type")?,
            level: require_parsed(body, "level")?,
            title: require_str(body, "title")?.to_owned(),
            prompt: require_str(body, "prompt")?.to_owned(),
            requirements: optional_as(body, "requirements")?.unwrap_or_default(),
            min_words: optional_u32(body, "minWords")?.unwrap_or(0),
            max_words: require_u32(body, "maxWords")?,
        };
        let exercise = ctx.server.services.exercises.create(new, ctx.user_id()?)?;
        Ok(json!({"exercise": to_value(&exercise)?}))
    }
}

/// Drafts may be any length; only submission checks word limits.
pub struct SaveDraftHandler;

impl Handler for SaveDraftHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let exercise = require_parsed::<ExerciseId>(body, "exerciseId")?;
        let content = optional_str(body, "content")?.unwrap_or_default();
        let draft = ctx
            .server
            .services
            .exercises
            .save_draft(ctx.user_id()?, &exercise, content)?;
        Ok(json!({"submission": to_value(&draft)?}))
    }
}

pub struct SubmitExerciseHandler;

impl Handler for SubmitExerciseHandler {
    #[instrument(skip_all, fields(method = "SUBMIT_EXERCISE"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let exercise = require_parsed::<ExerciseId>(body, "exerciseId")?;
        let content = require_str(body, "content")?;
        let submission = ctx
            .server
            .services
            .exercises
            .submit(ctx.user_id()?, &exercise, content)?;
        Ok(json!({"submission": to_value(&submission)?}))
    }
}

pub struct GetMySubmissionsHandler;

impl Handler for GetMySubmissionsHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let exercise = optional_parsed::<ExerciseId>(body, "exerciseId")?;
        let subs = ctx
            .server
            .services
            .exercises
            .my_submissions(ctx.user_id()?, exercise.as_ref());
        Ok(json!({"count": subs.len(), "submissions": to_value(&subs)?}))
    }
}

/// Review queue, oldest first.
pub struct GetPendingHandler;

impl Handler for GetPendingHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
        let subs = ctx.server.services.exercises.pending();
        Ok(json!({"count": subs.len(), "submissions": to_value(&subs)?}))
    }
}

/// Records the review and notifies the student if they are online.
pub struct ReviewExerciseHandler;

impl Handler for ReviewExerciseHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    #[instrument(skip_all, fields(method = "REVIEW_EXERCISE"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let id = require_parsed::<SubmissionId>(body, "submissionId")?;
        let scores: Scores = require_as(body, "scores")?;
        let feedback = optional_str(body, "feedback")?.unwrap_or_default();
        let reviewed = ctx
            .server
            .services
            .exercises
            .review(ctx.user_id()?, &id, scores, feedback)?;

        let notified = ctx.server.push.push(
            &reviewed.user_id,
            PushType::ExerciseFeedback,
            json!({
                "submissionId": reviewed.submission_id,
                "exerciseId": reviewed.exercise_id,
                "overallScore": reviewed.overall_score,
                "scores": reviewed.scores,
                "feedback": reviewed.feedback,
            }),
        );
        Ok(json!({"submission": to_value(&reviewed)?, "notified": notified}))
    }
}

pub struct GetFeedbackHandler;

impl Handler for GetFeedbackHandler {
    fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
        let reviewed = ctx.server.services.exercises.feedback(ctx.user_id()?);
        Ok(json!({"count": reviewed.len(), "submissions": to_value(&reviewed)?}))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::harness;
    use lexis_core::entities::Role;
    use serde_json::json;

    fn scores() -> serde_json::Value {
        json!({"grammar": 80, "vocabulary": 70, "coherence": 90, "taskAchievement": 60})
    }

    #[test]
    fn draft_submit_review_with_feedback_push() {
        let h = harness();
        let teacher = h.login_as("t@x.com", Role::Teacher);
        let mut student = h.login_as("s@x.com", Role::Student);

        let ex = h.ok(
            &teacher,
            "CREATE_EXERCISE_REQUEST",
            json!({
                "type": "sentence_rewrite",
                "level": "beginner",
                "title": "Rewrite",
                "prompt": "Rewrite in past tense",
                "minWords": 2,
                "maxWords": 5,
            }),
        );
        let ex_id = ex["exercise"]["exerciseId"].as_str().unwrap().to_owned();

        let draft = h.ok(&student, "SAVE_EXERCISE_DRAFT_REQUEST", json!({"exerciseId": ex_id, "content": "I"}));
        assert_eq!(draft["submission"]["status"], "draft");
        assert_eq!(
            h.err(&student, "SUBMIT_EXERCISE_REQUEST", json!({"exerciseId": ex_id, "content": "I"})),
            "VALIDATION_ERROR"
        );
        let sub = h.ok(
            &student,
            "SUBMIT_EXERCISE_REQUEST",
            json!({"exerciseId": ex_id, "content": "I walked home"}),
        );
        assert_eq!(sub["submission"]["status"], "pending_review");
        assert_eq!(sub["submission"]["attemptNumber"], 1);
        let sub_id = sub["submission"]["submissionId"].as_str().unwrap().to_owned();

        let pending = h.ok(&teacher, "GET_PENDING_SUBMISSIONS_REQUEST", json!({}));
        assert_eq!(pending["count"], 1);

        let review = json!({"submissionId": sub_id, "scores": scores(), "feedback": "Good"});
        let done = h.ok(&teacher, "REVIEW_EXERCISE_REQUEST", review.clone());
        assert_eq!(done["notified"], true);
        assert_eq!(done["submission"]["overallScore"], 75);

        let push = student.next_push();
        assert_eq!(push.message_type, "EXERCISE_FEEDBACK_NOTIFICATION");
        assert_eq!(push.data()["feedback"], "Good");

        assert_eq!(h.err(&teacher, "REVIEW_EXERCISE_REQUEST", review), "CONFLICT");
        assert_eq!(h.ok(&student, "GET_FEEDBACK_REQUEST", json!({}))["count"], 1);
    }

    #[test]
    fn students_cannot_review() {
        let h = harness();
        let student = h.login_as("s@x.com", Role::Student);
        let env = h.send(
            &student,
            "REVIEW_EXERCISE_REQUEST",
            json!({"submissionId": "sub_x", "scores": scores()}),
        );
        assert_eq!(env.message_type, "ERROR_RESPONSE");
        assert_eq!(env.payload.code.as_deref(), Some("PERMISSION_DENIED"));
    }
}
