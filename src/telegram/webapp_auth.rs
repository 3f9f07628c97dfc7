use anyhow::{anyhow, bail, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;

use crate::core::config;

type HmacSha256 = Hmac<Sha256>;

/// The `user` object embedded in Telegram Web App init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl WebAppUser {
    /// Name used when the player never registered one through the bot.
    pub fn display_name(&self) -> &str {
        if !self.first_name.trim().is_empty() {
            &self.first_name
        } else {
            self.username.as_deref().unwrap_or(crate::game::score::ANONYMOUS_NAME)
        }
    }

    /// [`display_name`](Self::display_name) cut to the leaderboard name limit.
    ///
    /// Telegram first names may be twice as long as a leaderboard name.
    pub fn leaderboard_name(&self) -> String {
        self.display_name()
            .trim()
            .chars()
            .take(config::players::MAX_NAME_LEN)
            .collect()
    }
}

fn parse_params(init_data: &str) -> HashMap<String, String> {
    init_data
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let decoded_value = urlencoding::decode(value).ok()?;
            Some((key.to_string(), decoded_value.into_owned()))
        })
        .collect()
}

/// `key=value` lines of every field except `hash`, sorted by key.
fn data_check_string(params: &HashMap<String, String>) -> String {
    let mut check_pairs: Vec<String> = params
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    check_pairs.sort();
    check_pairs.join("\n")
}

/// HMAC keyed with `HMAC_SHA256("WebAppData", bot_token)`.
fn signer(bot_token: &str) -> Result<HmacSha256> {
    let mut secret_key_mac = HmacSha256::new_from_slice(b"WebAppData").map_err(|e| anyhow!("HMAC key: {}", e))?;
    secret_key_mac.update(bot_token.as_bytes());
    let secret_key = secret_key_mac.finalize().into_bytes();
    HmacSha256::new_from_slice(&secret_key).map_err(|e| anyhow!("HMAC key: {}", e))
}

/// Validates Telegram Web App init data and returns the user it was issued for.
///
/// Telegram signs the sorted `key=value` lines with a key derived from the bot
/// token. Data older than 24 hours is rejected.
pub fn validate_telegram_webapp_data(init_data: &str, bot_token: &str) -> Result<WebAppUser> {
    validate_at(init_data, bot_token, chrono::Utc::now().timestamp())
}

/// Same as [`validate_telegram_webapp_data`] with an explicit "now" (unix seconds).
pub fn validate_at(init_data: &str, bot_token: &str, now: i64) -> Result<WebAppUser> {
    if bot_token.is_empty() {
        bail!("Bot token is not configured");
    }

    let params = parse_params(init_data);
    let received_hash = params.get("hash").ok_or_else(|| anyhow!("Missing hash parameter"))?;
    let received_hash = hex::decode(received_hash).map_err(|_| anyhow!("Malformed hash parameter"))?;

    let mut mac = signer(bot_token)?;
    mac.update(data_check_string(&params).as_bytes());
    mac.verify_slice(&received_hash)
        .map_err(|_| anyhow!("Invalid hash - data may be tampered"))?;

    let auth_date: i64 = params
        .get("auth_date")
        .ok_or_else(|| anyhow!("Missing auth_date parameter"))?
        .parse()
        .map_err(|_| anyhow!("Malformed auth_date parameter"))?;
    let age_seconds = now - auth_date;
    if age_seconds > config::webapp::INIT_DATA_MAX_AGE_SECS {
        bail!("Init data is too old ({} seconds)", age_seconds);
    }

    let user_json = params.get("user").ok_or_else(|| anyhow!("Missing user parameter"))?;
    serde_json::from_str(user_json).map_err(|e| anyhow!("Failed to parse user JSON: {}", e))
}

/// Builds init data signed the way Telegram does it.
///
/// Used by tests and for driving the API locally.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> Result<String> {
    let params: HashMap<String, String> = fields
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    let mut mac = signer(bot_token)?;
    mac.update(data_check_string(&params).as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut encoded: Vec<String> = fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();
    encoded.push(format!("hash={}", hash));
    Ok(encoded.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456:test-token";
    const NOW: i64 = 1_700_000_000;

    fn signed(auth_date: i64) -> String {
        let auth_date = auth_date.to_string();
        sign_init_data(
            &[
                ("query_id", "AAE"),
                ("user", r#"{"id":42,"first_name":"Ada","username":"ada"}"#),
                ("auth_date", &auth_date),
            ],
            TOKEN,
        )
        .unwrap()
    }

    #[test]
    fn test_genuine_data_is_accepted() {
        let user = validate_at(&signed(NOW - 60), TOKEN, NOW).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.display_name(), "Ada");
        assert_eq!(user.username.as_deref(), Some("ada"));
    }

    #[test]
    fn test_tampered_data_is_rejected() {
        let tampered = signed(NOW).replace("%22id%22%3A42", "%22id%22%3A43");
        assert!(validate_at(&tampered, TOKEN, NOW).is_err());
        assert!(validate_at(&signed(NOW), "other:token", NOW).is_err());
    }

    #[test]
    fn test_old_data_is_rejected() {
        let err = validate_at(&signed(NOW - 86_401), TOKEN, NOW).unwrap_err();
        assert!(err.to_string().contains("too old"));
        assert!(validate_at(&signed(NOW - 86_400), TOKEN, NOW).is_ok());
    }

    #[test]
    fn test_missing_hash() {
        let init_data = "user=%7B%22id%22%3A123%7D&auth_date=1234567890";
        assert!(validate_at(init_data, TOKEN, NOW).is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let user = WebAppUser {
            id: 1,
            first_name: " ".to_string(),
            username: Some("bob".to_string()),
        };
        assert_eq!(user.display_name(), "bob");
    }

    #[test]
    fn test_leaderboard_name_is_cut_to_limit() {
        let user = WebAppUser {
            id: 1,
            first_name: "Ж".repeat(64),
            username: None,
        };
        let name = user.leaderboard_name();
        assert_eq!(name.chars().count(), config::players::MAX_NAME_LEN);
        assert!(crate::game::score::normalize_name(&name).is_ok());

        let short = WebAppUser {
            id: 2,
            first_name: " Ada ".to_string(),
            username: None,
        };
        assert_eq!(short.leaderboard_name(), "Ada");
    }
}
