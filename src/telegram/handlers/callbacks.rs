//! Inline button handlers

use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, InlineKeyboardMarkup, MessageId};

use super::types::{player_of, HandlerDeps, HandlerError};
use crate::core::config;
use crate::game::{AnswerOutcome, IgnoreReason, Level, PlayOutcome, PlayerId, QuestionView, SessionReport, Topic};
use crate::telegram::format;
use crate::telegram::keyboards::{
    answer_keyboard, game_over_keyboard, level_keyboard, rating_keyboard, topic_keyboard, CallbackAction,
};
use crate::telegram::markdown::edit_message_markdown_v2;
use crate::telegram::notifications::{take_question_message, QuestionMessage};
use crate::telegram::Bot;

/// Dispatches a button press by its callback data.
pub(super) async fn handle_callback(bot: &Bot, q: CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let callback_id = q.id.clone();
    let action = q.data.as_deref().and_then(CallbackAction::parse);
    let chat_id = q.message.as_ref().map(|m| m.chat().id);
    let message_id = q.message.as_ref().map(|m| m.id());

    let (Some(action), Some(chat_id), Some(message_id), Some(player)) = (action, chat_id, message_id, player_of(&q.from))
    else {
        log::debug!("Ignoring callback {:?} from {}", q.data, q.from.id);
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };

    let target = Target { chat_id, message_id };

    match action {
        CallbackAction::Menu => {
            bot.answer_callback_query(callback_id).await?;
            target.edit(bot, format::choose_level_text(), level_keyboard()).await?;
        }
        CallbackAction::Level(level) => {
            bot.answer_callback_query(callback_id).await?;
            target
                .edit(bot, format::choose_topic_text(level), topic_keyboard(level))
                .await?;
        }
        CallbackAction::Rating(level) => {
            bot.answer_callback_query(callback_id).await?;
            show_leaderboard(bot, deps, target, level).await?;
        }
        CallbackAction::Topic(topic) => {
            if !deps.store.is_registered(player).await? {
                bot.answer_callback_query(callback_id)
                    .text("Send /start and pick a name first")
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
            start_game(bot, deps, callback_id, player, target, topic).await?;
        }
        CallbackAction::Answer { seq, value } => {
            submit_answer(bot, deps, callback_id, player, target, seq, value).await?;
        }
    }
    Ok(())
}

/// The message a button belongs to.
#[derive(Debug, Clone, Copy)]
struct Target {
    chat_id: ChatId,
    message_id: MessageId,
}

impl Target {
    async fn edit(
        self,
        bot: &Bot,
        text: String,
        keyboard: InlineKeyboardMarkup,
    ) -> ResponseResult<()> {
        edit_message_markdown_v2(bot, self.chat_id, self.message_id, text, Some(keyboard)).await
    }

    fn tracking(self, view: &QuestionView) -> QuestionMessage {
        QuestionMessage {
            session_id: view.session_id,
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

async fn show_question(
    bot: &Bot,
    deps: &HandlerDeps,
    player: PlayerId,
    target: Target,
    text: String,
    view: &QuestionView,
) -> Result<(), HandlerError> {
    // Tracked first so an expiry during the edit still finds the message
    deps.question_messages.insert(player, target.tracking(view));
    target.edit(bot, text, answer_keyboard(view)).await?;
    Ok(())
}

async fn show_report(
    bot: &Bot,
    deps: &HandlerDeps,
    player: PlayerId,
    target: Target,
    report: &SessionReport,
) -> Result<(), HandlerError> {
    take_question_message(&deps.question_messages, player, report.session_id);
    target
        .edit(bot, format::report_text(report), game_over_keyboard(report.topic))
        .await?;
    Ok(())
}

async fn start_game(
    bot: &Bot,
    deps: &HandlerDeps,
    callback_id: CallbackQueryId,
    player: PlayerId,
    target: Target,
    topic: Topic,
) -> Result<(), HandlerError> {
    match deps.manager.start(player, topic.level(), topic).await {
        Ok(PlayOutcome::Started(view)) => {
            bot.answer_callback_query(callback_id).await?;
            show_question(bot, deps, player, target, format::question_text(&view), &view).await?;
        }
        Ok(PlayOutcome::Resumed(view)) => {
            bot.answer_callback_query(callback_id)
                .text("Your game is still running")
                .await?;
            show_question(bot, deps, player, target, format::question_text(&view), &view).await?;
        }
        Ok(PlayOutcome::Finished(report)) => {
            bot.answer_callback_query(callback_id).await?;
            show_report(bot, deps, player, target, &report).await?;
        }
        Err(e) => {
            log::warn!("Player {} could not start {}: {}", player, topic, e);
            bot.answer_callback_query(callback_id)
                .text(e.to_string())
                .show_alert(true)
                .await?;
        }
    }
    Ok(())
}

async fn submit_answer(
    bot: &Bot,
    deps: &HandlerDeps,
    callback_id: CallbackQueryId,
    player: PlayerId,
    target: Target,
    seq: u32,
    value: i64,
) -> Result<(), HandlerError> {
    match deps.manager.submit_answer(player, seq, value).await {
        AnswerOutcome::Correct { points, next } => {
            bot.answer_callback_query(callback_id)
                .text(format!("✅ +{}", points))
                .await?;
            show_question(bot, deps, player, target, format::correct_text(points, &next), &next).await?;
        }
        AnswerOutcome::Finished(report) => {
            bot.answer_callback_query(callback_id).await?;
            show_report(bot, deps, player, target, &report).await?;
        }
        AnswerOutcome::Ignored(IgnoreReason::StaleQuestion) => {
            bot.answer_callback_query(callback_id)
                .text("That question is already closed")
                .await?;
        }
        AnswerOutcome::Ignored(IgnoreReason::NoSession) => {
            bot.answer_callback_query(callback_id)
                .text("This game is over")
                .await?;
            if let Err(e) = bot.edit_message_reply_markup(target.chat_id, target.message_id).await {
                log::debug!("Failed to clear stale question buttons: {}", e);
            }
        }
    }
    Ok(())
}

async fn show_leaderboard(bot: &Bot, deps: &HandlerDeps, target: Target, level: Level) -> Result<(), HandlerError> {
    let entries = deps
        .store
        .leaderboard(level, config::players::LEADERBOARD_SIZE)
        .await?;
    target
        .edit(bot, format::leaderboard_text(level, &entries), rating_keyboard())
        .await?;
    Ok(())
}
