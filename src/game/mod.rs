//! Game core: questions, countdowns, sessions and the score contract.

pub mod choices;
pub mod error;
pub mod manager;
pub mod question_bank;
pub mod score;
pub mod session;
pub mod timer;
pub mod types;

pub use error::GameError;
pub use manager::{AnswerOutcome, IgnoreReason, PlayOutcome, SessionManager};
pub use question_bank::{MathQuestionBank, QuestionBank};
pub use score::{CommittedTotal, LeaderboardEntry, MemoryScoreStore, ScoreCommit, ScoreStore};
pub use session::{CommitStatus, QuestionView, SessionReport};
pub use timer::{Timer, TimerEvent, TimerHandle};
pub use types::{Level, PlayerId, Question, SessionId, SessionState, Topic};
