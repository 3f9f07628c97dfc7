//! A single player's game session and its state transitions.
//!
//! `Session` knows nothing about maps, channels or storage; the manager
//! serializes access to it and acts on the transitions it reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use super::timer::{Timer, TimerEvent, TimerHandle};
use super::types::{Level, PlayerId, Question, SessionId, SessionState, Topic};

/// How an answer relates to the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerVerdict {
    /// Session already finished or the answer targets an older question
    Stale,
    /// The deadline passed before the answer was recorded
    Late,
    Correct,
    Wrong,
}

/// Outcome of the store commit attached to a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitStatus {
    Pending,
    Committed { total: i64, best: i64 },
    Failed { reason: String },
}

/// Summary of a session that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub player: PlayerId,
    pub level: Level,
    pub topic: Topic,
    pub state: SessionState,
    pub score: u32,
    pub correct_answers: u32,
    /// Expected answer of the question that ended the session by expiry or a wrong answer
    pub missed_answer: Option<i64>,
    pub commit: CommitStatus,
}

/// What a client needs to render the current question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub session_id: SessionId,
    pub seq: u32,
    pub level: Level,
    pub topic: Topic,
    pub label: String,
    pub prompt: String,
    pub choices: Vec<i64>,
    pub points: u32,
    pub time_limit_secs: u64,
    pub remaining_ms: u64,
    pub score: u32,
    pub correct_answers: u32,
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub player: PlayerId,
    pub level: Level,
    pub topic: Topic,
    pub state: SessionState,
    pub score: u32,
    pub correct_answers: u32,
    pub started_at: DateTime<Utc>,
    question: Option<Question>,
    seq: u32,
    asked: HashSet<String>,
    timer: Option<TimerHandle>,
}

impl Session {
    /// New session with no question issued yet. Level follows from the topic.
    pub fn new(player: PlayerId, topic: Topic) -> Self {
        Self {
            id: Uuid::new_v4(),
            player,
            level: topic.level(),
            topic,
            state: SessionState::Active,
            score: 0,
            correct_answers: 0,
            started_at: Utc::now(),
            question: None,
            seq: 0,
            asked: HashSet::new(),
            timer: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    /// Prompts issued so far in this session.
    pub fn asked(&self) -> &HashSet<String> {
        &self.asked
    }

    /// Makes `question` current and starts its countdown.
    ///
    /// The previous countdown is cancelled before the new one starts.
    pub fn issue(&mut self, question: Question, timer: &Timer) {
        if let Some(previous) = self.timer.take() {
            previous.cancel();
        }
        self.seq += 1;
        self.asked.insert(question.prompt.clone());
        self.question = Some(question);
        self.timer = Some(timer.start(
            self.level.timer_budget(),
            TimerEvent {
                player: self.player,
                session_id: self.id,
                seq: self.seq,
            },
        ));
    }

    /// Classifies an answer without changing the session.
    pub fn judge(&self, seq: u32, answer: i64) -> AnswerVerdict {
        let Some(question) = self.question.as_ref().filter(|_| self.is_active() && seq == self.seq) else {
            return AnswerVerdict::Stale;
        };
        if self.timer.as_ref().is_some_and(TimerHandle::is_expired) {
            return AnswerVerdict::Late;
        }
        if question.is_correct(answer) {
            AnswerVerdict::Correct
        } else {
            AnswerVerdict::Wrong
        }
    }

    /// Credits the current question. Returns the points awarded.
    pub fn award(&mut self) -> u32 {
        let points = self.question.as_ref().map_or(0, |question| question.points);
        self.score += points;
        self.correct_answers += 1;
        points
    }

    /// Applies a timer event. Returns the report if it ended the session.
    pub fn expire(&mut self, event: &TimerEvent) -> Option<SessionReport> {
        if event.session_id != self.id || event.seq != self.seq || !self.is_active() {
            return None;
        }
        Some(self.finish(SessionState::Expired))
    }

    /// Moves to a terminal state and stops the countdown.
    pub fn finish(&mut self, state: SessionState) -> SessionReport {
        debug_assert!(state.is_terminal());
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.state = state;

        let missed_answer = match state {
            SessionState::Expired | SessionState::Failed => self.question.as_ref().map(|question| question.answer),
            SessionState::Active | SessionState::Completed => None,
        };

        SessionReport {
            session_id: self.id,
            player: self.player,
            level: self.level,
            topic: self.topic,
            state,
            score: self.score,
            correct_answers: self.correct_answers,
            missed_answer,
            commit: CommitStatus::Pending,
        }
    }

    /// Current question as shown to the player, `None` once finished.
    pub fn view(&self) -> Option<QuestionView> {
        let question = self.question.as_ref().filter(|_| self.is_active())?;
        let remaining = self.timer.as_ref().map(TimerHandle::remaining).unwrap_or_default();

        Some(QuestionView {
            session_id: self.id,
            seq: self.seq,
            level: self.level,
            topic: self.topic,
            label: self.topic.label(),
            prompt: question.prompt.clone(),
            choices: question.choices.clone(),
            points: question.points,
            time_limit_secs: self.level.timer_budget().as_secs(),
            remaining_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            score: self.score,
            correct_answers: self.correct_answers,
        })
    }
}
