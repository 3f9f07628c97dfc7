//! Command handler implementations (/start, /play, /stop, /rating, /score, /cancel, /help)

use teloxide::prelude::*;
use teloxide::types::Message;
use teloxide::utils::command::BotCommands;

use super::types::{player_of, HandlerDeps, HandlerError};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::game::score::ANONYMOUS_NAME;
use crate::game::{Level, PlayerId};
use crate::telegram::bot::Command;
use crate::telegram::format::{self, escape_markdown_v2};
use crate::telegram::keyboards::{answer_keyboard, game_over_keyboard, level_keyboard, rating_keyboard, webapp_keyboard};
use crate::telegram::markdown::send_message_markdown_v2;
use crate::telegram::notifications::{take_question_message, QuestionMessage};
use crate::telegram::Bot;

fn sender(msg: &Message) -> Option<PlayerId> {
    msg.from.as_ref().and_then(player_of)
}

/// Marks the player as choosing a leaderboard name. Returns the current name, if any.
pub(super) async fn begin_registration(deps: &HandlerDeps, player: PlayerId) -> AppResult<Option<String>> {
    let name = deps.store.player_name(player).await?;
    deps.pending_names.insert(player);
    Ok(name)
}

/// Stores `text` as the player's name and closes the pending registration.
///
/// An invalid name leaves the registration open.
pub(super) async fn complete_registration(deps: &HandlerDeps, player: PlayerId, text: &str) -> AppResult<String> {
    deps.store.register(player, text).await?;
    deps.pending_names.remove(&player);
    Ok(text.trim().to_string())
}

/// Handle /start command: greet and wait for a (new) name
pub(super) async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(player) = sender(msg) else {
        return Ok(());
    };

    let name = begin_registration(deps, player).await?;
    if name.is_none() {
        log::info!("New player {} on /start, waiting for a name", player);
    }

    let keyboard = deps.webapp_url.as_deref().and_then(webapp_keyboard);
    send_message_markdown_v2(bot, msg.chat.id, format::welcome_text(name.as_deref()), keyboard).await?;
    Ok(())
}

/// Plain text while a name is pending
pub(super) async fn handle_name_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (Some(player), Some(text)) = (sender(msg), msg.text()) else {
        return Ok(());
    };

    match complete_registration(deps, player, text).await {
        Ok(name) => {
            log::info!("Player {} registered as {:?}", player, name);
            send_message_markdown_v2(bot, msg.chat.id, format::registered_text(&name), None).await?;
        }
        Err(AppError::Validation(reason)) => {
            let reply = format!("⚠️ {}\\. Try another name or /cancel\\.", escape_markdown_v2(&reason));
            send_message_markdown_v2(bot, msg.chat.id, reply, None).await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Handle /play command: the level picker, or the running question again
pub(super) async fn handle_play_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(player) = sender(msg) else {
        return Ok(());
    };

    if !deps.store.is_registered(player).await? {
        send_message_markdown_v2(bot, msg.chat.id, format::register_first_text(), None).await?;
        return Ok(());
    }

    match deps.manager.current(player) {
        Some(view) => {
            let sent =
                send_message_markdown_v2(bot, msg.chat.id, format::question_text(&view), Some(answer_keyboard(&view)))
                    .await?;
            deps.question_messages.insert(
                player,
                QuestionMessage {
                    session_id: view.session_id,
                    chat_id: msg.chat.id,
                    message_id: sent.id,
                },
            );
        }
        None => {
            send_message_markdown_v2(bot, msg.chat.id, format::choose_level_text(), Some(level_keyboard())).await?;
        }
    }
    Ok(())
}

/// Handle /stop command
pub(super) async fn handle_stop_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(player) = sender(msg) else {
        return Ok(());
    };

    let Some(report) = deps.manager.stop(player).await else {
        send_message_markdown_v2(bot, msg.chat.id, format::no_active_game_text(), None).await?;
        return Ok(());
    };

    // The old question message keeps its buttons otherwise
    if let Some(question) = take_question_message(&deps.question_messages, player, report.session_id) {
        if let Err(e) = bot.edit_message_reply_markup(question.chat_id, question.message_id).await {
            log::debug!("Failed to clear question buttons: {}", e);
        }
    }

    send_message_markdown_v2(
        bot,
        msg.chat.id,
        format::report_text(&report),
        Some(game_over_keyboard(report.topic)),
    )
    .await?;
    Ok(())
}

/// Handle /rating command
pub(super) async fn handle_rating_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let entries = deps
        .store
        .leaderboard(Level::School, config::players::LEADERBOARD_SIZE)
        .await?;
    send_message_markdown_v2(
        bot,
        msg.chat.id,
        format::leaderboard_text(Level::School, &entries),
        Some(rating_keyboard()),
    )
    .await?;
    Ok(())
}

/// Handle /score command
pub(super) async fn handle_score_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(player) = sender(msg) else {
        return Ok(());
    };

    let name = deps
        .store
        .player_name(player)
        .await?
        .unwrap_or_else(|| ANONYMOUS_NAME.to_string());
    let school = deps.store.standing(player, Level::School).await?;
    let university = deps.store.standing(player, Level::University).await?;

    send_message_markdown_v2(bot, msg.chat.id, format::score_text(&name, school, university), None).await?;
    Ok(())
}

/// Handle /cancel command
pub(super) async fn handle_cancel_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let cancelled = sender(msg).is_some_and(|player| deps.pending_names.remove(&player).is_some());
    let text = if cancelled {
        "Cancelled\\. Send /start to pick a name later\\."
    } else {
        "Nothing to cancel\\."
    };
    send_message_markdown_v2(bot, msg.chat.id, text, None).await?;
    Ok(())
}

/// Handle /help command
pub(super) async fn handle_help_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let mut req = bot.send_message(msg.chat.id, Command::descriptions().to_string());
    if let Some(keyboard) = deps.webapp_url.as_deref().and_then(webapp_keyboard) {
        req = req.reply_markup(keyboard);
    }
    req.await?;
    Ok(())
}
