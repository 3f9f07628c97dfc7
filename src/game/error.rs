use thiserror::Error;

use super::types::{Level, Topic};

/// Errors raised by the game core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// The topic has no unused question left for this session, or does not belong to the level.
    #[error("No question available for {level}/{topic}")]
    NoQuestionAvailable { level: Level, topic: Topic },

    /// A level/topic selection that could not be parsed or does not exist.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}
