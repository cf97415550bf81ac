use lexis_core::entities::{CallState, VoiceCall};
use lexis_core::ids::{CallId, UserId};

use crate::error::StoreError;
use crate::store::{CallTable, EntityStore};

/// Voice calls that are ringing or active. Ended calls are removed.
pub trait CallRepository: Send + Sync {
    /// Fails with `Conflict` if either party is already in a call.
    fn insert(&self, call: VoiceCall) -> Result<(), StoreError>;
    fn find(&self, id: &CallId) -> Option<VoiceCall>;
    fn call_for_user(&self, user: &UserId) -> Option<VoiceCall>;

    /// Ringing → active. Fails with `InvalidTransition` otherwise.
    fn activate(&self, id: &CallId) -> Result<VoiceCall, StoreError>;
    fn remove(&self, id: &CallId) -> Option<VoiceCall>;
    /// Drop a call that has not been answered yet.
    fn remove_if_ringing(&self, id: &CallId) -> Result<VoiceCall, StoreError>;
    fn remove_for_user(&self, user: &UserId) -> Option<VoiceCall>;
}

pub struct MemoryCallRepo {
    store: EntityStore,
}

impl MemoryCallRepo {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

fn busy(t: &CallTable, user: &UserId) -> Option<CallId> {
    t.calls
        .values()
        .find(|c| c.involves(user))
        .map(|c| c.call_id.clone())
}

impl CallRepository for MemoryCallRepo {
    fn insert(&self, call: VoiceCall) -> Result<(), StoreError> {
        self.store.with_calls(|t| {
            if busy(t, &call.caller_id).is_some() {
                return Err(StoreError::Conflict("You are already in a call".into()));
            }
            if busy(t, &call.callee_id).is_some() {
                return Err(StoreError::Conflict("User is busy in another call".into()));
            }
            let _ = t.calls.insert(call.call_id.clone(), call);
            Ok(())
        })
    }

    fn find(&self, id: &CallId) -> Option<VoiceCall> {
        self.store.with_calls(|t| t.calls.get(id).cloned())
    }

    fn call_for_user(&self, user: &UserId) -> Option<VoiceCall> {
        self.store
            .with_calls(|t| t.calls.values().find(|c| c.involves(user)).cloned())
    }

    fn activate(&self, id: &CallId) -> Result<VoiceCall, StoreError> {
        let now = self.store.now();
        self.store.with_calls(|t| {
            let call = t
                .calls
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound("Call not found".into()))?;
            if call.state != CallState::Ringing {
                return Err(StoreError::InvalidTransition("Call is not ringing".into()));
            }
            call.state = CallState::Active;
            call.answered_at = Some(now);
            Ok(call.clone())
        })
    }

    fn remove(&self, id: &CallId) -> Option<VoiceCall> {
        self.store.with_calls(|t| t.calls.remove(id))
    }

    fn remove_if_ringing(&self, id: &CallId) -> Result<VoiceCall, StoreError> {
        self.store.with_calls(|t| match t.calls.get(id) {
            None => Err(StoreError::NotFound("Call not found".into())),
            Some(call) if call.state != CallState::Ringing => {
                Err(StoreError::InvalidTransition("Call is not ringing".into()))
            }
            Some(_) => t
                .calls
                .remove(id)
                .ok_or_else(|| StoreError::NotFound("Call not found".into())),
        })
    }

    fn remove_for_user(&self, user: &UserId) -> Option<VoiceCall> {
        self.store.with_calls(|t| {
            let id = busy(t, user)?;
            t.calls.remove(&id)
        })
    }
}
