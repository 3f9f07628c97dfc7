//! Answer options for multiple-choice questions.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;

use super::types::Level;
use crate::core::config;

/// How far distractors may stray from the correct answer.
///
/// University answers range from single digits to a few hundred, so the spread
/// grows with the magnitude to keep the options plausible.
pub fn spread_for(level: Level, answer: i64) -> i64 {
    match level {
        Level::School => config::game::SCHOOL_SPREAD,
        Level::University => config::game::UNIVERSITY_MIN_SPREAD.max(answer.abs() / 2),
    }
}

/// Builds `count` unique options that include `answer`, shuffled.
///
/// Distractors are drawn from `answer ± spread` (never `answer` itself). If the
/// random draws cannot fill the set, values just above the range are used.
pub fn build_choices<R: Rng + ?Sized>(answer: i64, spread: i64, count: usize, rng: &mut R) -> Vec<i64> {
    let spread = spread.max(1);
    let mut options = BTreeSet::new();
    options.insert(answer);

    let mut attempts = 0;
    while options.len() < count && attempts < 100 {
        let offset = rng.random_range(-spread..=spread);
        if offset != 0 {
            options.insert(answer + offset);
        }
        attempts += 1;
    }

    let mut fallback = 1;
    while options.len() < count {
        options.insert(answer + spread + fallback);
        fallback += 1;
    }

    let mut choices: Vec<i64> = options.into_iter().collect();
    choices.shuffle(rng);
    choices
}
