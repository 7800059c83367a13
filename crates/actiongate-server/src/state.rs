//! Shared handler state.

use std::sync::Arc;

use actiongate_core::Storage;
use actiongate_dispatch::Dispatcher;
use actiongate_session::{Authenticator, SessionStore};

/// Everything the handlers need, cheap to clone per request.
#[derive(Clone, Debug)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub sessions: Arc<SessionStore>,
    pub authenticator: Arc<Authenticator>,
}

impl AppState {
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        sessions: Arc<SessionStore>,
        authenticator: Authenticator,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            authenticator: Arc::new(authenticator),
        }
    }

    /// Registry and log behind the dispatcher.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.dispatcher.storage()
    }
}
