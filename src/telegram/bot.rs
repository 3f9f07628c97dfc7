//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command menu registration

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Math quiz commands:")]
pub enum Command {
    #[command(description = "welcome and registration")]
    Start,
    #[command(description = "start a game or return to the current one")]
    Play,
    #[command(description = "end the current game and save the score")]
    Stop,
    #[command(description = "leaderboards")]
    Rating,
    #[command(description = "your points")]
    Score,
    #[command(description = "cancel name registration")]
    Cancel,
    #[command(description = "show this help")]
    Help,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token, invalid API URL or HTTP client failure
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) is not set");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // Check if local Bot API server is configured
    let bot = match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
///
/// # Returns
/// * `Ok(())` - Commands set successfully
/// * `Err(RequestError)` - Failed to set commands
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_list() {
        let commands = Command::descriptions();
        let command_list = format!("{}", commands);

        assert!(command_list.contains("Math quiz commands"));
        assert!(command_list.contains("/play"));
        assert!(command_list.contains("/rating"));
        assert_eq!(Command::bot_commands().len(), 7);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/play", "mathbot").unwrap(), Command::Play);
        assert_eq!(Command::parse("/stop@mathbot", "mathbot").unwrap(), Command::Stop);
        assert!(Command::parse("/download", "mathbot").is_err());
    }
}
