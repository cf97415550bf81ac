//! Closed sets of message type names.
//!
//! Every request type `<BASE>_REQUEST` is answered with `<BASE>_RESPONSE`.
//! Failures the dispatcher detects before a handler runs are answered with
//! [`ERROR_RESPONSE`] instead.

use std::fmt;
use std::str::FromStr;

/// Response type for frames rejected before reaching a handler.
pub const ERROR_RESPONSE: &str = "ERROR_RESPONSE";

macro_rules! request_types {
    ($($variant:ident => $req:literal / $resp:literal),+ $(,)?) => {
        /// Every request the server understands.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum RequestType {
            $($variant,)+
        }

        impl RequestType {
            pub const ALL: &'static [RequestType] = &[$(RequestType::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $req,)+
                }
            }

            /// The message type used to answer this request.
            pub fn response_type(&self) -> &'static str {
                match self {
                    $(Self::$variant => $resp,)+
                }
            }
        }

        impl FromStr for RequestType {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($req => Ok(Self::$variant),)+
                    other => Err(format!("Unknown message type: {other}")),
                }
            }
        }
    };
}

request_types! {
    Register => "REGISTER_REQUEST" / "REGISTER_RESPONSE",
    Login => "LOGIN_REQUEST" / "LOGIN_RESPONSE",
    Logout => "LOGOUT_REQUEST" / "LOGOUT_RESPONSE",
    Ping => "PING_REQUEST" / "PING_RESPONSE",
    GetProfile => "GET_PROFILE_REQUEST" / "GET_PROFILE_RESPONSE",
    UpdateProfile => "UPDATE_PROFILE_REQUEST" / "UPDATE_PROFILE_RESPONSE",
    GetOnlineUsers => "GET_ONLINE_USERS_REQUEST" / "GET_ONLINE_USERS_RESPONSE",
    ListUsers => "LIST_USERS_REQUEST" / "LIST_USERS_RESPONSE",
    SetUserRole => "SET_USER_ROLE_REQUEST" / "SET_USER_ROLE_RESPONSE",
    SendMessage => "SEND_MESSAGE_REQUEST" / "SEND_MESSAGE_RESPONSE",
    GetChatHistory => "GET_CHAT_HISTORY_REQUEST" / "GET_CHAT_HISTORY_RESPONSE",
    MarkMessagesRead => "MARK_MESSAGES_READ_REQUEST" / "MARK_MESSAGES_READ_RESPONSE",
    GetUnreadCount => "GET_UNREAD_COUNT_REQUEST" / "GET_UNREAD_COUNT_RESPONSE",
    GetConversations => "GET_CONVERSATIONS_REQUEST" / "GET_CONVERSATIONS_RESPONSE",
    PurgeConversation => "PURGE_CONVERSATION_REQUEST" / "PURGE_CONVERSATION_RESPONSE",
    GetLessons => "GET_LESSONS_REQUEST" / "GET_LESSONS_RESPONSE",
    GetLessonDetail => "GET_LESSON_DETAIL_REQUEST" / "GET_LESSON_DETAIL_RESPONSE",
    CreateLesson => "CREATE_LESSON_REQUEST" / "CREATE_LESSON_RESPONSE",
    UpdateLesson => "UPDATE_LESSON_REQUEST" / "UPDATE_LESSON_RESPONSE",
    DeleteLesson => "DELETE_LESSON_REQUEST" / "DELETE_LESSON_RESPONSE",
    GetTests => "GET_TESTS_REQUEST" / "GET_TESTS_RESPONSE",
    GetTest => "GET_TEST_REQUEST" / "GET_TEST_RESPONSE",
    CreateTest => "CREATE_TEST_REQUEST" / "CREATE_TEST_RESPONSE",
    SubmitTest => "SUBMIT_TEST_REQUEST" / "SUBMIT_TEST_RESPONSE",
    GetTestResults => "GET_TEST_RESULTS_REQUEST" / "GET_TEST_RESULTS_RESPONSE",
    GetExercises => "GET_EXERCISES_REQUEST" / "GET_EXERCISES_RESPONSE",
    CreateExercise => "CREATE_EXERCISE_REQUEST" / "CREATE_EXERCISE_RESPONSE",
    SaveExerciseDraft => "SAVE_EXERCISE_DRAFT_REQUEST" / "SAVE_EXERCISE_DRAFT_RESPONSE",
    SubmitExercise => "SUBMIT_EXERCISE_REQUEST" / "SUBMIT_EXERCISE_RESPONSE",
    GetMySubmissions => "GET_MY_SUBMISSIONS_REQUEST" / "GET_MY_SUBMISSIONS_RESPONSE",
    GetPendingSubmissions => "GET_PENDING_SUBMISSIONS_REQUEST" / "GET_PENDING_SUBMISSIONS_RESPONSE",
    ReviewExercise => "REVIEW_EXERCISE_REQUEST" / "REVIEW_EXERCISE_RESPONSE",
    GetFeedback => "GET_FEEDBACK_REQUEST" / "GET_FEEDBACK_RESPONSE",
    GetGames => "GET_GAMES_REQUEST" / "GET_GAMES_RESPONSE",
    CreateGame => "CREATE_GAME_REQUEST" / "CREATE_GAME_RESPONSE",
    UpdateGamePairs => "UPDATE_GAME_PAIRS_REQUEST" / "UPDATE_GAME_PAIRS_RESPONSE",
    PublishGame => "PUBLISH_GAME_REQUEST" / "PUBLISH_GAME_RESPONSE",
    StartGame => "START_GAME_REQUEST" / "START_GAME_RESPONSE",
    SubmitGame => "SUBMIT_GAME_REQUEST" / "SUBMIT_GAME_RESPONSE",
    GetGameHistory => "GET_GAME_HISTORY_REQUEST" / "GET_GAME_HISTORY_RESPONSE",
    GetLeaderboard => "GET_LEADERBOARD_REQUEST" / "GET_LEADERBOARD_RESPONSE",
    VoiceCallInitiate => "VOICE_CALL_INITIATE_REQUEST" / "VOICE_CALL_INITIATE_RESPONSE",
    VoiceCallAccept => "VOICE_CALL_ACCEPT_REQUEST" / "VOICE_CALL_ACCEPT_RESPONSE",
    VoiceCallReject => "VOICE_CALL_REJECT_REQUEST" / "VOICE_CALL_REJECT_RESPONSE",
    VoiceCallEnd => "VOICE_CALL_END_REQUEST" / "VOICE_CALL_END_RESPONSE",
    VoiceCallSignal => "VOICE_CALL_SIGNAL_REQUEST" / "VOICE_CALL_SIGNAL_RESPONSE",
    ServerStats => "SERVER_STATS_REQUEST" / "SERVER_STATS_RESPONSE",
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unsolicited server-to-client events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PushType {
    ReceiveMessage,
    ExerciseFeedback,
    VoiceCallIncoming,
    VoiceCallAccepted,
    VoiceCallRejected,
    VoiceCallEnded,
    VoiceCallSignal,
    SessionSuperseded,
}

impl PushType {
    pub const ALL: &'static [PushType] = &[
        Self::ReceiveMessage,
        Self::ExerciseFeedback,
        Self::VoiceCallIncoming,
        Self::VoiceCallAccepted,
        Self::VoiceCallRejected,
        Self::VoiceCallEnded,
        Self::VoiceCallSignal,
        Self::SessionSuperseded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReceiveMessage => "RECEIVE_MESSAGE",
            Self::ExerciseFeedback => "EXERCISE_FEEDBACK_NOTIFICATION",
            Self::VoiceCallIncoming => "VOICE_CALL_INCOMING",
            Self::VoiceCallAccepted => "VOICE_CALL_ACCEPTED",
            Self::VoiceCallRejected => "VOICE_CALL_REJECTED",
            Self::VoiceCallEnded => "VOICE_CALL_ENDED",
            Self::VoiceCallSignal => "VOICE_CALL_SIGNAL",
            Self::SessionSuperseded => "SESSION_SUPERSEDED",
        }
    }
}

impl fmt::Display for PushType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PushType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown push type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_request_answers_with_matching_response() {
        for ty in RequestType::ALL {
            let base = ty.as_str().strip_suffix("_REQUEST").unwrap();
            assert_eq!(ty.response_type(), format!("{base}_RESPONSE"));
        }
    }

    #[test]
    fn request_names_round_trip() {
        for ty in RequestType::ALL {
            assert_eq!(ty.as_str().parse::<RequestType>().unwrap(), *ty);
        }
        assert_eq!(RequestType::ALL.len(), 47);
    }

    #[test]
    fn unknown_request_type_is_rejected() {
        let err = "FLY_TO_MOON_REQUEST".parse::<RequestType>().unwrap_err();
        assert!(err.contains("FLY_TO_MOON_REQUEST"));
        assert!("REGISTER_RESPONSE".parse::<RequestType>().is_err());
    }

    #[test]
    fn push_names_round_trip() {
        for ty in PushType::ALL {
            assert_eq!(ty.as_str().parse::<PushType>().unwrap(), *ty);
        }
        assert!("RECEIVE_MESSAGE".parse::<RequestType>().is_err());
        assert!(ERROR_RESPONSE.parse::<PushType>().is_err());
    }
}
