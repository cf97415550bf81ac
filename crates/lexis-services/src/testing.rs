//! Shared wiring for service tests.

use std::sync::Arc;

use lexis_auth::{SessionManager, SessionPolicy};
use lexis_core::entities::{Level, NewUser, Role, User};
use lexis_core::{Clock, ManualClock};
use lexis_store::{EntityStore, Repositories};

use crate::{ChatLimits, Services};

pub(crate) struct Fixture {
    pub clock: Arc<ManualClock>,
    pub repos: Repositories,
    pub sessions: Arc<SessionManager>,
    pub services: Services,
}

impl Fixture {
    pub fn user(&self, email: &str, role: Role) -> User {
        self.repos
            .users
            .create(NewUser {
                fullname: email.split('@').next().unwrap_or(email).to_owned(),
                email: email.to_owned(),
                password: "pw".into(),
                level: Level::Beginner,
                role,
            })
            .unwrap()
    }
}

pub(crate) fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::starting_now());
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let store = EntityStore::with_clock(Arc::clone(&dyn_clock));
    let repos = Repositories::in_memory(&store);
    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&repos.sessions),
        Arc::clone(&dyn_clock),
        SessionPolicy::default(),
    ));
    let services = Services::new(
        &repos,
        Arc::clone(&sessions),
        dyn_clock,
        ChatLimits {
            max_message_chars: 20,
            history_limit: 5,
        },
    );
    Fixture {
        clock,
        repos,
        sessions,
        services,
    }
}
