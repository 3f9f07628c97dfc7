//! Inline keyboards and their callback data.
//!
//! Callback data formats:
//! - `lvl:<level>`: level picked, show topics
//! - `topic:<topic>`: start a game
//! - `ans:<seq>:<value>`: answer question `seq`
//! - `rate:<level>`: show a leaderboard
//! - `menu`: back to the level picker

use std::str::FromStr;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use url::Url;

use crate::game::{Level, QuestionView, Topic};

/// A decoded button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Level(Level),
    Topic(Topic),
    Answer { seq: u32, value: i64 },
    Rating(Level),
    Menu,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let (kind, rest) = data.split_once(':').unwrap_or((data, ""));
        match kind {
            "lvl" => Level::from_str(rest).ok().map(Self::Level),
            "topic" => Topic::from_str(rest).ok().map(Self::Topic),
            "ans" => {
                let (seq, value) = rest.split_once(':')?;
                Some(Self::Answer {
                    seq: seq.parse().ok()?,
                    value: value.parse().ok()?,
                })
            }
            "rate" => Level::from_str(rest).ok().map(Self::Rating),
            "menu" => Some(Self::Menu),
            _ => None,
        }
    }

    pub fn to_data(self) -> String {
        match self {
            Self::Level(level) => format!("lvl:{}", level),
            Self::Topic(topic) => format!("topic:{}", topic),
            Self::Answer { seq, value } => format!("ans:{}:{}", seq, value),
            Self::Rating(level) => format!("rate:{}", level),
            Self::Menu => "menu".to_string(),
        }
    }
}

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_data())
}

pub fn level_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(
            format!("{} {}", Level::School.emoji(), Level::School.display_name()),
            CallbackAction::Level(Level::School),
        ),
        button(
            format!("{} {}", Level::University.emoji(), Level::University.display_name()),
            CallbackAction::Level(Level::University),
        ),
    ]])
}

/// One row per topic of the level, plus a way back.
pub fn topic_keyboard(level: Level) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = level
        .topics()
        .map(|topic| {
            vec![button(
                format!("{} (+{})", topic.display_name(), topic.points()),
                CallbackAction::Topic(topic),
            )]
        })
        .collect();
    rows.push(vec![button("⬅️ Back", CallbackAction::Menu)]);
    InlineKeyboardMarkup::new(rows)
}

/// Answer options in rows of two.
pub fn answer_keyboard(view: &QuestionView) -> InlineKeyboardMarkup {
    let rows = view
        .choices
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|value| {
                    button(
                        value.to_string(),
                        CallbackAction::Answer {
                            seq: view.seq,
                            value: *value,
                        },
                    )
                })
                .collect()
        })
        .collect::<Vec<Vec<_>>>();
    InlineKeyboardMarkup::new(rows)
}

pub fn rating_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("🎓 School", CallbackAction::Rating(Level::School)),
        button("🏛️ University", CallbackAction::Rating(Level::University)),
    ]])
}

/// Shown under a game-over message.
pub fn game_over_keyboard(topic: Topic) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("🔁 Play again", CallbackAction::Topic(topic))],
        vec![
            button("📋 Topics", CallbackAction::Menu),
            button("🏆 Rating", CallbackAction::Rating(topic.level())),
        ],
    ])
}

/// Button that opens the Mini App, if the URL is usable.
pub fn webapp_keyboard(webapp_url: &str) -> Option<InlineKeyboardMarkup> {
    match Url::parse(webapp_url) {
        Ok(url) => Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(
            "🎮 Play in Mini App",
            WebAppInfo { url },
        )]])),
        Err(e) => {
            log::warn!("WEBAPP_URL is not a valid URL ({}): {}", webapp_url, e);
            None
        }
    }
}
