//! Domain types shared by the question bank, the session manager and the transports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use uuid::Uuid;

use crate::core::config;

/// Opaque player identity (the Telegram user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PlayerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identity of one game session, unique across restarts.
pub type SessionId = Uuid;

/// Difficulty tier. Fixes the per-question timer budget and the leaderboard column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Level {
    School,
    #[strum(to_string = "university", serialize = "uni")]
    #[serde(alias = "uni")]
    University,
}

impl Level {
    /// Time a player has for every question of this level.
    pub fn timer_budget(self) -> Duration {
        match self {
            Level::School => config::game::school_timer(),
            Level::University => config::game::university_timer(),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Level::School => "School",
            Level::University => "University",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Level::School => "🎓",
            Level::University => "🏛️",
        }
    }

    /// Topics that belong to this level, in menu order.
    pub fn topics(self) -> impl Iterator<Item = Topic> {
        Topic::iter().filter(move |topic| topic.level() == self)
    }
}

/// Sub-category within a level; decides where questions come from and what they are worth.
///
/// The string form (`school_easy`, `uni_calculus`, ...) is used in callback data,
/// the Mini App API and the commit ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum Topic {
    #[strum(serialize = "school_easy")]
    #[serde(rename = "school_easy")]
    Easy,
    #[strum(serialize = "school_medium")]
    #[serde(rename = "school_medium")]
    Medium,
    #[strum(serialize = "uni_calculus")]
    #[serde(rename = "uni_calculus")]
    Calculus,
    #[strum(serialize = "uni_linalg")]
    #[serde(rename = "uni_linalg")]
    LinearAlgebra,
    #[strum(serialize = "uni_discrete")]
    #[serde(rename = "uni_discrete")]
    DiscreteMath,
}

impl Topic {
    pub fn level(self) -> Level {
        match self {
            Topic::Easy | Topic::Medium => Level::School,
            Topic::Calculus | Topic::LinearAlgebra | Topic::DiscreteMath => Level::University,
        }
    }

    /// Points awarded for one correct answer.
    pub fn points(self) -> u32 {
        match self {
            Topic::Easy => config::game::SCHOOL_EASY_POINTS,
            Topic::Medium => config::game::SCHOOL_MEDIUM_POINTS,
            Topic::Calculus | Topic::LinearAlgebra | Topic::DiscreteMath => config::game::UNIVERSITY_POINTS,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Topic::Easy => "Easy",
            Topic::Medium => "Medium",
            Topic::Calculus => "Calculus",
            Topic::LinearAlgebra => "Linear Algebra",
            Topic::DiscreteMath => "Discrete Math",
        }
    }

    /// "School – Easy", "University – Calculus", ...
    pub fn label(self) -> String {
        format!("{} – {}", self.level().display_name(), self.display_name())
    }
}

/// A multiple-choice problem. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub topic: Topic,
    pub prompt: String,
    pub answer: i64,
    /// Correct answer plus unique distractors, in presentation order
    pub choices: Vec<i64>,
    pub points: u32,
}

impl Question {
    pub fn is_correct(&self, answer: i64) -> bool {
        self.answer == answer
    }

    /// The wrong options, in presentation order.
    pub fn distractors(&self) -> impl Iterator<Item = i64> + '_ {
        self.choices.iter().copied().filter(move |choice| *choice != self.answer)
    }
}

/// Lifecycle state of a session. Everything except `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Active,
    /// Ended by the player (`/stop`) or because the topic ran out of questions
    Completed,
    /// The timer ran out before an answer was recorded
    Expired,
    /// A wrong answer was recorded before expiry
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Active)
    }
}
