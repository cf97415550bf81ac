use lexis_core::entities::{LessonPatch, Level, NewLesson};
use lexis_core::ids::LessonId;
use lexis_core::Result;
use lexis_protocol::params::{optional_parsed, optional_str, optional_u32, require_parsed, require_str};
use serde_json::{json, Value};
use tracing::instrument;

use super::to_value;
use crate::dispatch::{AccessPolicy, Handler, RequestContext, STAFF};

const DEFAULT_DURATION_MINUTES: u32 = 15;

pub struct GetLessonsHandler;

impl Handler for GetLessonsHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let level = optional_parsed::<Level>(body, "level")?;
        let topic = optional_str(body, "topic")?;
        let lessons = ctx.server.services.lessons.list(level, topic);
        Ok(json!({"count": lessons.len(), "lessons": to_value(&lessons)?}))
    }
}

pub struct GetLessonDetailHandler;

impl Handler for GetLessonDetailHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let id = require_parsed::<LessonId>(body, "lessonId")?;
        let lesson = ctx.server.services.lessons.detail(&id)?;
        Ok(json!({"lesson": to_value(&lesson)?}))
    }
}

pub struct CreateLessonHandler;

impl Handler for CreateLessonHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    #[instrument(skip_all, fields(method = "CREATE_LESSON"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let new = NewLesson {
            title: require_str(body, "title")?.to_owned(),
            description: optional_str(body, "description")?.unwrap_or_default().to_owned(),
            level: require_parsed(body, "level")?,
            topic: require_str(body, "topic")?.to_owned(),
            content: require_str(body, "content")?.to_owned(),
            duration_minutes: optional_u32(body, "durationMinutes")?
                .unwrap_or(DEFAULT_DURATION_MINUTES),
        };
        let lesson = ctx.server.services.lessons.create(new, ctx.user_id()?)?;
        Ok(json!({"lesson": to_value(&lesson)?}))
    }
}

pub struct UpdateLessonHandler;

impl Handler for UpdateLessonHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let id = require_parsed::<LessonId>(body, "lessonId")?;
        let owned = |key: &str| -> Result<Option<String>> { Ok(optional_str(body, key)?.map(str::to_owned)) };
        let patch = LessonPatch {
            title: owned("title")?,
            description: owned("description")?,
            level: optional_parsed(body, "level")?,
            topic: owned("topic")?,
            content: owned("content")?,
            duration_minutes: optional_u32(body, "durationMinutes")?,
        };
        let lesson = ctx.server.services.lessons.update(&id, patch)?;
        Ok(json!({"lesson": to_value(&lesson)?}))
    }
}

pub struct DeleteLessonHandler;

impl Handler for DeleteLessonHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let id = require_parsed::<LessonId>(body, "lessonId")?;
        ctx.server.services.lessons.delete(&id)?;
        Ok(json!({"lessonId": id, "deleted": true}))
    }
}
