//! Request handlers, one unit struct per request type.

pub mod accounts;
pub mod calls;
pub mod chat;
pub mod exercises;
pub mod games;
pub mod lessons;
pub mod system;

use lexis_core::{LexisError, Result};
use lexis_protocol::RequestType;
use serde::Serialize;
use serde_json::Value;

use crate::dispatch::HandlerRegistry;

/// Register every built-in handler.
pub fn register_all(registry: &mut HandlerRegistry) {
    use RequestType as R;

    // Accounts
    registry.register(R::Register, accounts::RegisterHandler);
    registry.register(R::Login, accounts::LoginHandler);
    registry.register(R::Logout, accounts::LogoutHandler);
    registry.register(R::GetProfile, accounts::GetProfileHandler);
    registry.register(R::UpdateProfile, accounts::UpdateProfileHandler);
    registry.register(R::GetOnlineUsers, accounts::GetOnlineUsersHandler);
    registry.register(R::ListUsers, accounts::ListUsersHandler);
    registry.register(R::SetUserRole, accounts::SetUserRoleHandler);

    // Chat
    registry.register(R::SendMessage, chat::SendMessageHandler);
    registry.register(R::GetChatHistory, chat::GetChatHistoryHandler);
    registry.register(R::MarkMessagesRead, chat::MarkMessagesReadHandler);
    registry.register(R::GetUnreadCount, chat::GetUnreadCountHandler);
    registry.register(R::GetConversations, chat::GetConversationsHandler);
    registry.register(R::PurgeConversation, chat::PurgeConversationHandler);

    // Lessons
    registry.register(R::GetLessons, lessons::GetLessonsHandler);
    registry.register(R::GetLessonDetail, lessons::GetLessonDetailHandler);
    registry.register(R::CreateLesson, lessons::CreateLessonHandler);
    registry.register(R::UpdateLesson, lessons::UpdateLessonHandler);
    registry.register(R::DeleteLesson, lessons::DeleteLessonHandler);

    // Tests
    registry.register(R::GetTests, tests::GetTestsHandler);
    registry.register(R::GetTest, tests::GetTestHandler);
    registry.register(R::CreateTest, tests::CreateTestHandler);
    registry.register(R::SubmitTest, tests::SubmitTestHandler);
    registry.register(R::GetTestResults, tests::GetTestResultsHandler);

    // Exercises
    registry.register(R::GetExercises, exercises::GetExercisesHandler);
    registry.register(R::CreateExercise, exercises::CreateExerciseHandler);
    registry.register(R::SaveExerciseDraft, exercises::SaveDraftHandler);
    registry.register(R::SubmitExercise, exercises::SubmitExerciseHandler);
    registry.register(R::GetMySubmissions, exercises::GetMySubmissionsHandler);
    registry.register(R::GetPendingSubmissions, exercises::GetPendingHandler);
    registry.register(R::ReviewExercise, exercises::ReviewExerciseHandler);
    registry.register(R::GetFeedback, exercises::GetFeedbackHandler);

    // Games
    registry.register(R::GetGames, games::GetGamesHandler);
    registry.register(R::CreateGame, games::CreateGameHandler);
    registry.register(R::UpdateGamePairs, games::UpdatePairsHandler);
    registry.register(R::PublishGame, games::PublishGameHandler);
    registry.register(R::StartGame, games::StartGameHandler);
    registry.register(R::SubmitGame, games::SubmitGameHandler);
    registry.register(R::GetGameHistory, games::GetGameHistoryHandler);
    registry.register(R::GetLeaderboard, games::GetLeaderboardHandler);

    // Voice calls
    registry.register(R::VoiceCallInitiate, calls::InitiateHandler);
    registry.register(R::VoiceCallAccept, calls::AcceptHandler);
    registry.register(R::VoiceCallReject, calls::RejectHandler);
    registry.register(R::VoiceCallEnd, calls::EndHandler);
    registry.register(R::VoiceCallSignal, calls::SignalHandler);

    // System
    registry.register(R::Ping, system::PingHandler);
    registry.register(R::ServerStats, system::ServerStatsHandler);
}

/// Serialize a response body. Failure here is a bug, not a client error.
pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| LexisError::internal(format!("response encoding failed: {e}")))
}
