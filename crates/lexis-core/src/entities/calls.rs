use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire_enum;
use crate::ids::{CallId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Ringing,
    Active,
}

wire_enum!(CallState, "call state", {
    Ringing => "ringing",
    Active => "active",
});

/// A voice call being negotiated or in progress. Ended calls are dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCall {
    pub call_id: CallId,
    pub caller_id: UserId,
    pub callee_id: UserId,
    pub state: CallState,
    pub started_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

impl VoiceCall {
    pub fn involves(&self, user: &UserId) -> bool {
        &self.caller_id == user || &self.callee_id == user
    }

    pub fn peer_of(&self, user: &UserId) -> Option<&UserId> {
        if &self.caller_id == user {
            Some(&self.callee_id)
        } else if &self.callee_id == user {
            Some(&self.caller_id)
        } else {
            None
        }
    }
}
