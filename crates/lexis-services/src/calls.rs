//! Voice call signalling. Media never passes through the server; only the
//! call state and opaque signal blobs do.

use std::sync::Arc;

use lexis_core::entities::{CallState, VoiceCall};
use lexis_core::ids::{CallId, UserId};
use lexis_core::{Clock, LexisError, Result};
use lexis_store::{CallRepository, UserRepository};
use tracing::info;

pub struct CallService {
    users: Arc<dyn UserRepository>,
    calls: Arc<dyn CallRepository>,
    clock: Arc<dyn Clock>,
}

impl CallService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        calls: Arc<dyn CallRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            calls,
            clock,
        }
    }

    fn find(&self, id: &CallId) -> Result<VoiceCall> {
        self.calls
            .find(id)
            .ok_or_else(|| LexisError::not_found("Call not found"))
    }

    fn find_as_callee(&self, user: &UserId, id: &CallId) -> Result<VoiceCall> {
        let call = self.find(id)?;
        if &call.callee_id != user {
            return Err(LexisError::forbidden("Only the callee can answer this call"));
        }
        Ok(call)
    }

    fn find_as_party(&self, user: &UserId, id: &CallId) -> Result<VoiceCall> {
        let call = self.find(id)?;
        if !call.involves(user) {
            return Err(LexisError::forbidden("You are not part of this call"));
        }
        Ok(call)
    }

    pub fn initiate(&self, caller: &UserId, callee: &UserId) -> Result<VoiceCall> {
        if caller == callee {
            return Err(LexisError::validation("Cannot call yourself"));
        }
        let target = self
            .users
            .find_by_id(callee)
            .ok_or_else(|| LexisError::not_found("User not found"))?;
        if !target.online {
            return Err(LexisError::conflict("User is not online"));
        }
        let call = VoiceCall {
            call_id: CallId::new(),
            caller_id: caller.clone(),
            callee_id: callee.clone(),
            state: CallState::Ringing,
            started_at: self.clock.now(),
            answered_at: None,
        };
        self.calls.insert(call.clone())?;
        info!(call_id = %call.call_id, caller = %caller, callee = %callee, "call ringing");
        Ok(call)
    }

    pub fn accept(&self, user: &UserId, id: &CallId) -> Result<VoiceCall> {
        let _ = self.find_as_callee(user, id)?;
        let call = self.calls.activate(id)?;
        info!(call_id = %id, "call accepted");
        Ok(call)
    }

    pub fn reject(&self, user: &UserId, id: &CallId) -> Result<VoiceCall> {
        let _ = self.find_as_callee(user, id)?;
        let call = self.calls.remove_if_ringing(id)?;
        info!(call_id = %id, "call rejected");
        Ok(call)
    }

    pub fn end(&self, user: &UserId, id: &CallId) -> Result<VoiceCall> {
        let _ = self.find_as_party(user, id)?;
        let call = self
            .calls
            .remove(id)
            .ok_or_else(|| LexisError::not_found("Call not found"))?;
        info!(call_id = %id, ended_by = %user, "call ended");
        Ok(call)
    }

    /// Check that `user` may relay a signal on this call.
    pub fn signal(&self, user: &UserId, id: &CallId) -> Result<VoiceCall> {
        self.find_as_party(user, id)
    }

    /// Disconnect cleanup: end whatever call the user was in.
    pub fn end_for_user(&self, user: &UserId) -> Option<VoiceCall> {
        let call = self.calls.remove_for_user(user)?;
        info!(call_id = %call.call_id, user_id = %user, "call ended by disconnect");
        Some(call)
    }
}
