//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::callbacks::handle_callback;
use super::commands::{
    handle_cancel_command, handle_help_command, handle_name_message, handle_play_command, handle_rating_command,
    handle_score_command, handle_start_command, handle_stop_command,
};
use super::types::{player_of, HandlerDeps, HandlerError};
use crate::telegram::bot::Command;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same schema is used in production and by the dispatcher tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_names = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        // Free text only matters while a player is choosing a name
        .branch(name_handler(deps_names))
        .branch(callback_handler(deps_callback))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await?,
                    Command::Play => handle_play_command(&bot, &msg, &deps).await?,
                    Command::Stop => handle_stop_command(&bot, &msg, &deps).await?,
                    Command::Rating => handle_rating_command(&bot, &msg, &deps).await?,
                    Command::Score => handle_score_command(&bot, &msg, &deps).await?,
                    Command::Cancel => handle_cancel_command(&bot, &msg, &deps).await?,
                    Command::Help => handle_help_command(&bot, &msg, &deps).await?,
                }
                Ok(())
            }
        },
    ))
}

/// Text from a player with a pending registration
fn name_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let pending = deps.pending_names.clone();

    Update::filter_message()
        .filter(move |msg: Message| {
            let is_name = msg.text().is_some_and(|text| !text.starts_with('/'));
            is_name
                && msg
                    .from
                    .as_ref()
                    .and_then(player_of)
                    .is_some_and(|player| pending.contains(&player))
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move { handle_name_message(&bot, &msg, &deps).await }
        })
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move { handle_callback(&bot, q, &deps).await }
    })
}
