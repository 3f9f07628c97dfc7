//! Owner of all live game sessions.
//!
//! Sessions live in a [`DashMap`] keyed by player, each behind its own mutex.
//! The map shard lock may be taken before a session lock, never the other way
//! round: a finished session is released first and only then removed from the
//! map. Store commits always run with no lock held, after the uncommitted
//! report has been published to [`SessionManager::last_report`].

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

use super::error::GameError;
use super::question_bank::QuestionBank;
use super::score::{ScoreCommit, ScoreStore};
use super::session::{AnswerVerdict, CommitStatus, QuestionView, Session, SessionReport};
use super::timer::{Timer, TimerEvent};
use super::types::{Level, PlayerId, SessionState, Topic};
use crate::core::retry::{retry, RetryConfig};

type SharedSession = Arc<Mutex<Session>>;

/// Result of asking to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A new session with its first question
    Started(QuestionView),
    /// The player already had an active session; nothing was created
    Resumed(QuestionView),
    /// The topic had nothing to ask; the session ended right away
    Finished(SessionReport),
}

/// Why an answer had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    NoSession,
    StaleQuestion,
}

/// Result of submitting an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Points credited and the next question issued
    Correct { points: u32, next: QuestionView },
    /// The session ended (wrong, late, or the topic ran out)
    Finished(SessionReport),
    Ignored(IgnoreReason),
}

enum Opened {
    Active(SharedSession, QuestionView),
    Empty(SessionReport),
}

/// Runs every player's session state machine.
pub struct SessionManager {
    sessions: DashMap<PlayerId, SharedSession>,
    finished: DashMap<PlayerId, SessionReport>,
    bank: Arc<dyn QuestionBank>,
    store: Arc<dyn ScoreStore>,
    timer: Timer,
    reports: mpsc::UnboundedSender<SessionReport>,
    commit_retry: RetryConfig,
}

impl SessionManager {
    /// Creates the manager and starts its expiry listener.
    ///
    /// The receiver yields reports of sessions that ended because their timer
    /// ran out, so the transport can tell the player. Must be called inside a
    /// tokio runtime.
    pub fn new(
        bank: Arc<dyn QuestionBank>,
        store: Arc<dyn ScoreStore>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionReport>) {
        Self::with_commit_retry(bank, store, RetryConfig::commit())
    }

    pub fn with_commit_retry(
        bank: Arc<dyn QuestionBank>,
        store: Arc<dyn ScoreStore>,
        commit_retry: RetryConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionReport>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::unbounded_channel();

        let manager = Arc::new(Self {
            sessions: DashMap::new(),
            finished: DashMap::new(),
            bank,
            store,
            timer: Timer::new(event_tx),
            reports: report_tx,
            commit_retry,
        });
        spawn_expiry_listener(Arc::downgrade(&manager), event_rx);

        (manager, report_rx)
    }

    /// Starts a session for `topic`, or resumes the one already running.
    pub async fn start(&self, player: PlayerId, level: Level, topic: Topic) -> Result<PlayOutcome, GameError> {
        if topic.level() != level {
            return Err(GameError::InvalidSelection(format!("{} is not a {} topic", topic, level)));
        }

        let opened = match self.sessions.entry(player) {
            Entry::Occupied(mut entry) => {
                if let Some(view) = lock_session(entry.get()).view() {
                    log::debug!("Player {} already has an active session, resuming", player);
                    return Ok(PlayOutcome::Resumed(view));
                }
                // finished but not yet released by its owner
                let opened = self.open_session(player, topic);
                match &opened {
                    Opened::Active(session, _) => {
                        entry.insert(Arc::clone(session));
                    }
                    Opened::Empty(_) => {
                        entry.remove();
                    }
                }
                opened
            }
            Entry::Vacant(entry) => {
                let opened = self.open_session(player, topic);
                if let Opened::Active(session, _) = &opened {
                    entry.insert(Arc::clone(session));
                }
                opened
            }
        };

        match opened {
            Opened::Active(_, view) => {
                log::info!("Player {} started {} session {}", player, topic, view.session_id);
                Ok(PlayOutcome::Started(view))
            }
            Opened::Empty(report) => {
                self.publish(&report);
                Ok(PlayOutcome::Finished(self.conclude(report).await))
            }
        }
    }

    /// Records an answer for question `seq` of the player's session.
    pub async fn submit_answer(&self, player: PlayerId, seq: u32, answer: i64) -> AnswerOutcome {
        let Some(session) = self.session(player) else {
            return AnswerOutcome::Ignored(IgnoreReason::NoSession);
        };

        let report = {
            let mut guard = lock_session(&session);
            match guard.judge(seq, answer) {
                AnswerVerdict::Stale => return AnswerOutcome::Ignored(IgnoreReason::StaleQuestion),
                AnswerVerdict::Late => guard.finish(SessionState::Expired),
                AnswerVerdict::Wrong => guard.finish(SessionState::Failed),
                AnswerVerdict::Correct => {
                    let points = guard.award();
                    match self.bank.next(guard.level, guard.topic, guard.asked()) {
                        Ok(question) => {
                            guard.issue(question, &self.timer);
                            if let Some(next) = guard.view() {
                                return AnswerOutcome::Correct { points, next };
                            }
                            guard.finish(SessionState::Completed)
                        }
                        Err(e) => {
                            log::info!("Session {} ran out of questions: {}", guard.id, e);
                            guard.finish(SessionState::Completed)
                        }
                    }
                }
            }
        };

        self.retire(player, &session, &report);
        AnswerOutcome::Finished(self.conclude(report).await)
    }

    /// Ends the player's session by request. `None` if nothing was running.
    pub async fn stop(&self, player: PlayerId) -> Option<SessionReport> {
        let session = self.session(player)?;
        let report = {
            let mut guard = lock_session(&session);
            if !guard.is_active() {
                return None;
            }
            guard.finish(SessionState::Completed)
        };

        self.retire(player, &session, &report);
        Some(self.conclude(report).await)
    }

    /// Stops every running session and commits its score.
    pub async fn shutdown(&self) -> Vec<SessionReport> {
        let players: Vec<PlayerId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let mut reports = Vec::with_capacity(players.len());
        for player in players {
            if let Some(report) = self.stop(player).await {
                reports.push(report);
            }
        }
        reports
    }

    /// The active session's current question.
    pub fn current(&self, player: PlayerId) -> Option<QuestionView> {
        let session = self.session(player)?;
        let view = lock_session(&session).view();
        view
    }

    /// Most recent finished session of the player.
    pub fn last_report(&self, player: PlayerId) -> Option<SessionReport> {
        self.finished.get(&player).map(|report| report.value().clone())
    }

    pub fn has_active_session(&self, player: PlayerId) -> bool {
        self.current(player).is_some()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn store(&self) -> &Arc<dyn ScoreStore> {
        &self.store
    }

    async fn handle_expiry(&self, event: TimerEvent) {
        let Some(session) = self.session(event.player) else {
            return;
        };
        let expired = lock_session(&session).expire(&event);
        let Some(report) = expired else {
            log::debug!("Ignoring stale timer event {:?}", event);
            return;
        };

        self.retire(event.player, &session, &report);
        let report = self.conclude(report).await;
        if self.reports.send(report).is_err() {
            log::debug!("No listener for session reports");
        }
    }

    fn session(&self, player: PlayerId) -> Option<SharedSession> {
        self.sessions.get(&player).map(|entry| Arc::clone(entry.value()))
    }

    fn open_session(&self, player: PlayerId, topic: Topic) -> Opened {
        let mut session = Session::new(player, topic);
        match self.bank.next(session.level, topic, session.asked()) {
            Ok(question) => {
                session.issue(question, &self.timer);
                match session.view() {
                    Some(view) => Opened::Active(Arc::new(Mutex::new(session)), view),
                    None => Opened::Empty(session.finish(SessionState::Completed)),
                }
            }
            Err(e) => {
                log::warn!("Player {} asked for {} but nothing is available: {}", player, topic, e);
                Opened::Empty(session.finish(SessionState::Completed))
            }
        }
    }

    fn publish(&self, report: &SessionReport) {
        self.finished.insert(report.player, report.clone());
    }

    /// Publishes the pending report, then drops the map entry if it still points at `session`.
    fn retire(&self, player: PlayerId, session: &SharedSession, report: &SessionReport) {
        self.publish(report);
        self.sessions
            .remove_if(&player, |_, current| Arc::ptr_eq(current, session));
    }

    /// Commits the final score. The terminal state stays as-is even if the commit fails.
    async fn conclude(&self, mut report: SessionReport) -> SessionReport {
        let commit = ScoreCommit {
            session_id: report.session_id,
            player: report.player,
            level: report.level,
            delta: report.score,
        };

        let outcome = retry(&self.commit_retry, || self.store.add_points(&commit)).await;
        let attempts = outcome.attempts;
        report.commit = match outcome.into_result() {
            Ok(total) => CommitStatus::Committed {
                total: total.total,
                best: total.best,
            },
            Err(e) => {
                log::error!(
                    "Failed to commit session {} for player {} after {} attempts: {}",
                    report.session_id,
                    report.player,
                    attempts,
                    e
                );
                CommitStatus::Failed { reason: e.to_string() }
            }
        };

        log::info!(
            "Session {} of player {} ended {} with {} points ({} correct)",
            report.session_id,
            report.player,
            report.state,
            report.score,
            report.correct_answers
        );
        // a newer session may have been published meanwhile
        if let Some(mut last) = self.finished.get_mut(&report.player) {
            if last.session_id == report.session_id {
                *last = report.clone();
            }
        }
        report
    }
}

fn lock_session(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_expiry_listener(manager: Weak<SessionManager>, mut events: mpsc::UnboundedReceiver<TimerEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            tokio::spawn(async move {
                manager.handle_expiry(event).await;
            });
        }
        log::debug!("Session expiry listener stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppResult;
    use crate::game::question_bank::MathQuestionBank;
    use crate::game::score::{CommittedTotal, LeaderboardEntry, MemoryScoreStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Holds every commit until a permit is added.
    struct GatedStore {
        inner: MemoryScoreStore,
        gate: Semaphore,
        waiting: AtomicUsize,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: MemoryScoreStore::new(),
                gate: Semaphore::new(0),
                waiting: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScoreStore for GatedStore {
        async fn add_points(&self, commit: &ScoreCommit) -> AppResult<CommittedTotal> {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let _permit = self.gate.acquire().await;
            self.inner.add_points(commit).await
        }

        async fn standing(&self, player: PlayerId, level: Level) -> AppResult<CommittedTotal> {
            self.inner.standing(player, level).await
        }

        async fn register(&self, player: PlayerId, name: &str) -> AppResult<()> {
            self.inner.register(player, name).await
        }

        async fn player_name(&self, player: PlayerId) -> AppResult<Option<String>> {
            self.inner.player_name(player).await
        }

        async fn leaderboard(&self, level: Level, limit: usize) -> AppResult<Vec<LeaderboardEntry>> {
            self.inner.leaderboard(level, limit).await
        }
    }

    fn manager() -> (Arc<SessionManager>, mpsc::UnboundedReceiver<SessionReport>, Arc<MemoryScoreStore>) {
        let store = Arc::new(MemoryScoreStore::new());
        let (manager, reports) = SessionManager::new(Arc::new(MathQuestionBank::with_seed(3)), store.clone());
        (manager, reports, store)
    }

    fn started(outcome: PlayOutcome) -> QuestionView {
        match outcome {
            PlayOutcome::Started(view) => view,
            other => panic!("expected a new session, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_resumes() {
        let (manager, _reports, _) = manager();
        let player = PlayerId(1);
        let first = started(manager.start(player, Level::School, Topic::Easy).await.unwrap());

        match manager.start(player, Level::School, Topic::Medium).await.unwrap() {
            PlayOutcome::Resumed(view) => {
                assert_eq!(view.session_id, first.session_id);
                assert_eq!(view.topic, Topic::Easy);
            }
            other => panic!("expected resume, got {:?}", other),
        }
        assert_eq!(manager.active_sessions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_topic_is_rejected() {
        let (manager, _reports, _) = manager();
        let err = manager.start(PlayerId(1), Level::School, Topic::Calculus).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidSelection(_)));
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_commits_running_score() {
        let (manager, _reports, store) = manager();
        let player = PlayerId(5);
        let view = started(manager.start(player, Level::University, Topic::Calculus).await.unwrap());

        let answer = answer_for(&manager, player, &view);
        assert!(matches!(
            manager.submit_answer(player, view.seq, answer).await,
            AnswerOutcome::Correct { points: 3, .. }
        ));

        let report = manager.stop(player).await.unwrap();
        assert_eq!(report.state, SessionState::Completed);
        assert_eq!(report.score, 3);
        assert_eq!(report.commit, CommitStatus::Committed { total: 3, best: 3 });
        assert!(manager.stop(player).await.is_none());
        assert_eq!(store.standing(player, Level::University).await.unwrap().total, 3);
        assert_eq!(manager.last_report(player), Some(report));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_reported() {
        let (manager, mut reports, _) = manager();
        let player = PlayerId(9);
        started(manager.start(player, Level::School, Topic::Easy).await.unwrap());

        let report = reports.recv().await.unwrap();
        assert_eq!(report.player, player);
        assert_eq!(report.state, SessionState::Expired);
        assert!(report.missed_answer.is_some());
        assert!(manager.current(player).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_after_expiry_is_never_scored() {
        let (manager, mut reports, store) = manager();
        let player = PlayerId(2);
        let view = started(manager.start(player, Level::School, Topic::Easy).await.unwrap());
        let answer = answer_for(&manager, player, &view);

        let report = reports.recv().await.unwrap();
        assert_eq!(report.state, SessionState::Expired);

        assert_eq!(
            manager.submit_answer(player, view.seq, answer).await,
            AnswerOutcome::Ignored(IgnoreReason::NoSession)
        );
        assert_eq!(store.standing(player, Level::School).await.unwrap().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_is_visible_while_commit_is_in_flight() {
        let store = Arc::new(GatedStore::new());
        let (manager, _reports) = SessionManager::new(Arc::new(MathQuestionBank::with_seed(3)), store.clone());
        let player = PlayerId(4);
        started(manager.start(player, Level::School, Topic::Easy).await.unwrap());

        let stopping = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.stop(player).await }
        });
        while store.waiting.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert!(manager.current(player).is_none());
        let pending = manager.last_report(player).unwrap();
        assert_eq!(pending.state, SessionState::Completed);
        assert_eq!(pending.commit, CommitStatus::Pending);

        store.gate.add_permits(1);
        let report = stopping.await.unwrap().unwrap();
        assert!(matches!(report.commit, CommitStatus::Committed { .. }));
        assert_eq!(manager.last_report(player), Some(report));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_commits_running_sessions() {
        let (manager, _reports, store) = manager();
        let scorer = PlayerId(11);
        let view = started(manager.start(scorer, Level::University, Topic::Calculus).await.unwrap());
        started(manager.start(PlayerId(12), Level::School, Topic::Easy).await.unwrap());

        let answer = answer_for(&manager, scorer, &view);
        assert!(matches!(
            manager.submit_answer(scorer, view.seq, answer).await,
            AnswerOutcome::Correct { .. }
        ));

        let mut reports = manager.shutdown().await;
        reports.sort_by_key(|report| report.player);
        assert_eq!(reports.len(), 2);
        assert!(reports
            .iter()
            .all(|report| report.state == SessionState::Completed
                && matches!(report.commit, CommitStatus::Committed { .. })));
        assert_eq!(manager.active_sessions(), 0);
        assert_eq!(store.standing(scorer, Level::University).await.unwrap().total, 3);
        assert!(manager.shutdown().await.is_empty());
    }

    /// Peeks at the expected answer through the live session.
    fn answer_for(manager: &SessionManager, player: PlayerId, view: &QuestionView) -> i64 {
        let session = manager.session(player).unwrap();
        let guard = lock_session(&session);
        assert_eq!(guard.seq(), view.seq);
        guard.question().unwrap().answer
    }
}
