//! Shows timer-driven game endings in the chat.
//!
//! A question message is tracked per player together with the session it
//! belongs to. When the expiry report of that session arrives, the message is
//! replaced by the summary; reports of any other session are dropped.

use dashmap::DashMap;
use std::sync::Arc;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::mpsc;

use crate::core::retry::{retry, RetryConfig};
use crate::game::{PlayerId, SessionId, SessionReport};
use crate::telegram::format::report_text;
use crate::telegram::keyboards::game_over_keyboard;
use crate::telegram::markdown::edit_message_markdown_v2;
use crate::telegram::Bot;

/// Where a session's current question is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionMessage {
    pub session_id: SessionId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

pub type QuestionMessages = DashMap<PlayerId, QuestionMessage>;

/// Takes the tracked message of `player` if it still shows `session_id`.
pub fn take_question_message(
    messages: &QuestionMessages,
    player: PlayerId,
    session_id: SessionId,
) -> Option<QuestionMessage> {
    messages
        .remove_if(&player, |_, message| message.session_id == session_id)
        .map(|(_, message)| message)
}

/// Consumes expiry reports until the manager is dropped.
pub async fn run_report_notifier(
    bot: Bot,
    mut reports: mpsc::UnboundedReceiver<SessionReport>,
    messages: Arc<QuestionMessages>,
) {
    log::info!("Report notifier started");

    while let Some(report) = reports.recv().await {
        let Some(target) = take_question_message(&messages, report.player, report.session_id) else {
            log::debug!(
                "No question message for session {} of player {}, skipping report",
                report.session_id,
                report.player
            );
            continue;
        };

        notify_report(&bot, target, &report).await;
    }

    log::info!("Report channel closed, notifier stopped");
}

async fn notify_report(bot: &Bot, target: QuestionMessage, report: &SessionReport) {
    let text = report_text(report);
    let keyboard = game_over_keyboard(report.topic);

    let result = retry(&RetryConfig::telegram(), || {
        edit_message_markdown_v2(
            bot,
            target.chat_id,
            target.message_id,
            text.clone(),
            Some(keyboard.clone()),
        )
    })
    .await;

    let attempts = result.attempts;
    if let Err(e) = result.into_result() {
        log::warn!(
            "Failed to show report of session {} to chat {} after {} attempts: {}",
            report.session_id,
            target.chat_id,
            attempts,
            e
        );
    }
}
