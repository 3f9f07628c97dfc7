//! Question sourcing per level and topic.
//!
//! School topics are generated on the fly; University topics draw from small
//! fixed catalogs and run dry once every entry was asked in a session.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use super::choices::{build_choices, spread_for};
use super::error::GameError;
use super::types::{Level, Question, Topic};
use crate::core::config;

/// Supplies questions that have not yet been asked in a session.
pub trait QuestionBank: Send + Sync {
    /// Returns a question for `level`/`topic` whose prompt is not in `asked`.
    ///
    /// Fails with [`GameError::NoQuestionAvailable`] when the topic does not
    /// belong to the level or has nothing unused left.
    fn next(&self, level: Level, topic: Topic, asked: &HashSet<String>) -> Result<Question, GameError>;
}

const CALCULUS: &[(&str, i64)] = &[
    ("d/dx (x²) at x=3 = ?", 6),
    ("d/dx (x³) at x=2 = ?", 12),
    ("d/dx (5x²) at x=1 = ?", 10),
    ("d/dx (x⁴) at x=1 = ?", 4),
    ("d/dx (3x² + 2x) at x=2 = ?", 14),
    ("d/dx (x³ − x) at x=1 = ?", 2),
    ("∫ 2x dx from 0 to 3 = ?", 9),
    ("∫ 1 dx from 0 to 5 = ?", 5),
    ("∫ 3x² dx from 0 to 2 = ?", 8),
    ("d/dx (4x³) at x=1 = ?", 12),
];

const LINEAR_ALGEBRA: &[(&str, i64)] = &[
    ("det [[2,3],[1,4]] = ?", 5),
    ("det [[1,0],[0,1]] = ?", 1),
    ("det [[3,8],[4,6]] = ?", -14),
    ("det [[5,1],[3,2]] = ?", 7),
    ("det [[2,0],[0,3]] = ?", 6),
    ("Trace of [[1,2],[3,4]] = ?", 5),
    ("Trace of [[5,0],[0,7]] = ?", 12),
    ("det [[1,2,0],[0,1,0],[0,0,3]] = ?", 3),
    ("det [[2,1],[1,2]] = ?", 3),
    ("Rank of [[1,0],[0,0]] = ?", 1),
];

const DISCRETE_MATH: &[(&str, i64)] = &[
    ("5! = ?", 120),
    ("C(6,2) = ?", 15),
    ("C(5,3) = ?", 10),
    ("P(4,2) = ?", 12),
    ("4! = ?", 24),
    ("C(7,3) = ?", 35),
    ("C(8,2) = ?", 28),
    ("6! / 4! = ?", 30),
    ("C(10,1) = ?", 10),
    ("P(5,3) = ?", 60),
];

/// The built-in question bank.
pub struct MathQuestionBank {
    rng: Mutex<StdRng>,
}

impl MathQuestionBank {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic bank for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Number of distinct catalog entries for a topic, `None` for generated topics.
    pub fn catalog_size(topic: Topic) -> Option<usize> {
        catalog(topic).map(<[_]>::len)
    }

    fn generate(rng: &mut StdRng, topic: Topic, asked: &HashSet<String>) -> Option<(String, i64)> {
        if let Some(entries) = catalog(topic) {
            let unused: Vec<&(&str, i64)> = entries.iter().filter(|(prompt, _)| !asked.contains(*prompt)).collect();
            return unused.choose(rng).map(|(prompt, answer)| (prompt.to_string(), *answer));
        }

        for _ in 0..config::game::MAX_GENERATION_ATTEMPTS {
            let (prompt, answer) = match topic {
                Topic::Easy => school_easy(rng),
                _ => school_medium(rng),
            };
            if !asked.contains(&prompt) {
                return Some((prompt, answer));
            }
        }
        None
    }
}

impl Default for MathQuestionBank {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionBank for MathQuestionBank {
    fn next(&self, level: Level, topic: Topic, asked: &HashSet<String>) -> Result<Question, GameError> {
        let unavailable = GameError::NoQuestionAvailable { level, topic };
        if topic.level() != level {
            return Err(unavailable);
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let (prompt, answer) = Self::generate(&mut rng, topic, asked).ok_or(unavailable)?;
        let choices = build_choices(
            answer,
            spread_for(level, answer),
            config::game::CHOICES_COUNT,
            &mut *rng,
        );

        Ok(Question {
            topic,
            prompt,
            answer,
            choices,
            points: topic.points(),
        })
    }
}

fn catalog(topic: Topic) -> Option<&'static [(&'static str, i64)]> {
    match topic {
        Topic::Calculus => Some(CALCULUS),
        Topic::LinearAlgebra => Some(LINEAR_ALGEBRA),
        Topic::DiscreteMath => Some(DISCRETE_MATH),
        Topic::Easy | Topic::Medium => None,
    }
}

fn school_easy(rng: &mut StdRng) -> (String, i64) {
    match rng.random_range(0..3) {
        0 => {
            let (a, b) = (rng.random_range(1..=50), rng.random_range(1..=50));
            (format!("{} + {} = ?", a, b), a + b)
        }
        1 => {
            let (a, b) = (rng.random_range(1..=50), rng.random_range(1..=50));
            (format!("{} - {} = ?", a, b), a - b)
        }
        _ => {
            let (a, b) = (rng.random_range(1..=12), rng.random_range(1..=12));
            (format!("{} × {} = ?", a, b), a * b)
        }
    }
}

fn school_medium(rng: &mut StdRng) -> (String, i64) {
    match rng.random_range(0..3) {
        0 => {
            let divisor: i64 = rng.random_range(2..=12);
            let quotient: i64 = rng.random_range(1..=20);
            (format!("{} ÷ {} = ?", divisor * quotient, divisor), quotient)
        }
        1 => {
            let base: i64 = rng.random_range(2..=9);
            let exp: u32 = rng.random_range(2..=3);
            (format!("{}^{} = ?", base, exp), base.pow(exp))
        }
        _ => {
            let a: i64 = rng.random_range(1..=20);
            let b: i64 = rng.random_range(1..=10);
            let c: i64 = rng.random_range(1..=10);
            (format!("{} + {} × {} = ?", a, b, c), a + b * c)
        }
    }
}
