//! Handler types and dependencies

use dashmap::DashSet;
use std::sync::Arc;
use teloxide::types::User;

use crate::game::{PlayerId, ScoreStore, SessionManager};
use crate::telegram::notifications::QuestionMessages;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub manager: Arc<SessionManager>,
    pub store: Arc<dyn ScoreStore>,
    /// Players whose next text message is their leaderboard name
    pub pending_names: Arc<DashSet<PlayerId>>,
    pub question_messages: Arc<QuestionMessages>,
    pub webapp_url: Option<String>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        manager: Arc<SessionManager>,
        question_messages: Arc<QuestionMessages>,
        webapp_url: Option<String>,
    ) -> Self {
        Self {
            store: Arc::clone(manager.store()),
            manager,
            pending_names: Arc::new(DashSet::new()),
            question_messages,
            webapp_url,
        }
    }
}

/// Telegram user ids fit in 52 bits, so the conversion only fails on garbage.
pub fn player_of(user: &User) -> Option<PlayerId> {
    i64::try_from(user.id.0).ok().map(PlayerId)
}
