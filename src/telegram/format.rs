//! Message texts (MarkdownV2).

use crate::game::{CommitStatus, CommittedTotal, LeaderboardEntry, Level, QuestionView, SessionReport, SessionState};

/// Escapes special characters for MarkdownV2
///
/// Telegram MarkdownV2 requires escaping: _ * [ ] ( ) ~ ` > # + - = | { } . !
/// The backslash itself is escaped first.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        match c {
            '\\' | '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|' | '{' | '}'
            | '.' | '!' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }

    result
}

fn plural(count: u32, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

pub fn welcome_text(name: Option<&str>) -> String {
    match name {
        Some(name) => format!(
            "👋 Welcome back, *{}*\\!\n\nSend /play to start a game or /rating to see the leaders\\. \
             To change your leaderboard name, send the new one as a message, or /cancel\\.",
            escape_markdown_v2(name)
        ),
        None => "👋 Welcome to the *Math Quiz*\\!\n\nAnswer as many questions as you can before the timer runs \
                 out\\. One wrong answer ends the game\\.\n\nWhat name should the leaderboard show? Send it as a \
                 message, or /cancel\\."
            .to_string(),
    }
}

pub fn registered_text(name: &str) -> String {
    format!(
        "✅ Nice to meet you, *{}*\\!\n\nSend /play to start\\.",
        escape_markdown_v2(name)
    )
}

pub fn choose_level_text() -> String {
    "🧮 *Choose a level*".to_string()
}

pub fn choose_topic_text(level: Level) -> String {
    format!(
        "{} *{}*\n\nChoose a topic\\. You have {} seconds per question\\.",
        level.emoji(),
        level.display_name(),
        level.timer_budget().as_secs()
    )
}

pub fn question_text(view: &QuestionView) -> String {
    format!(
        "*{}* · question {}\n\n`{}`\n\n⏱ {} s · \\+{} · score {}",
        escape_markdown_v2(&view.label),
        view.seq,
        view.prompt.replace('\\', "\\\\").replace('`', "\\`"),
        view.time_limit_secs,
        plural(view.points, "point", "points"),
        view.score
    )
}

/// A correct answer followed by the next question.
pub fn correct_text(points: u32, next: &QuestionView) -> String {
    format!("✅ Correct, \\+{}\\!\n\n{}", plural(points, "point", "points"), question_text(next))
}

pub fn report_text(report: &SessionReport) -> String {
    let heading = match report.state {
        SessionState::Expired => "⏰ *Time's up\\!*",
        SessionState::Failed => "❌ *Wrong answer\\!*",
        SessionState::Completed | SessionState::Active => "🏁 *Game over*",
    };

    let mut text = heading.to_string();
    if let Some(answer) = report.missed_answer {
        text.push_str(&format!("\nThe right answer was *{}*\\.", escape_markdown_v2(&answer.to_string())));
    }
    text.push_str(&format!(
        "\n\n{}\nScore: *{}* \\({} correct\\)",
        escape_markdown_v2(&report.topic.label()),
        report.score,
        report.correct_answers
    ));

    match &report.commit {
        CommitStatus::Committed { total, best } => {
            text.push_str(&format!(
                "\n\n{} total: *{}* · best game: *{}*",
                report.level.display_name(),
                total,
                best
            ));
        }
        CommitStatus::Failed { .. } => {
            text.push_str("\n\n⚠️ Your score could not be saved right now\\. Please try again later\\.");
        }
        CommitStatus::Pending => {}
    }
    text
}

pub fn leaderboard_text(level: Level, entries: &[LeaderboardEntry]) -> String {
    let mut text = format!("🏆 *{} leaderboard*\n", level.display_name());
    if entries.is_empty() {
        text.push_str("\nNobody has scored yet\\. Be the first\\!");
        return text;
    }

    for (place, entry) in entries.iter().enumerate() {
        let medal = match place {
            0 => "🥇".to_string(),
            1 => "🥈".to_string(),
            2 => "🥉".to_string(),
            n => format!("{}\\.", n + 1),
        };
        text.push_str(&format!(
            "\n{} {} · *{}*",
            medal,
            escape_markdown_v2(&entry.username),
            entry.score
        ));
    }
    text
}

pub fn score_text(name: &str, school: CommittedTotal, university: CommittedTotal) -> String {
    format!(
        "📊 *{}*\n\n🎓 School: *{}* points · best game {}\n🏛️ University: *{}* points · best game {}",
        escape_markdown_v2(name),
        school.total,
        school.best,
        university.total,
        university.best
    )
}

pub fn no_active_game_text() -> String {
    "There is no game running\\. Send /play to start one\\.".to_string()
}

pub fn register_first_text() -> String {
    "Please send /start and pick a name first\\.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{PlayerId, Topic};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn report(state: SessionState, commit: CommitStatus) -> SessionReport {
        SessionReport {
            session_id: Uuid::nil(),
            player: PlayerId(1),
            level: Level::School,
            topic: Topic::Easy,
            state,
            score: 2,
            correct_answers: 2,
            missed_answer: Some(-3),
            commit,
        }
    }

    #[test]
    fn test_escape_markdown_v2() {
        assert_eq!(escape_markdown_v2("a-b.c!"), "a\\-b\\.c\\!");
        assert_eq!(escape_markdown_v2("C(6,2) = ?"), "C\\(6,2\\) \\= ?");
        assert_eq!(escape_markdown_v2("plain"), "plain");
    }

    #[test]
    fn test_welcome_back_offers_rename() {
        let text = welcome_text(Some("Ada L."));
        assert!(text.contains("*Ada L\\.*"));
        assert!(text.contains("new one as a message"));
        assert!(text.contains("/cancel"));
    }

    #[test]
    fn test_report_mentions_missed_answer_and_totals() {
        let text = report_text(&report(SessionState::Expired, CommitStatus::Committed { total: 10, best: 4 }));
        assert!(text.contains("Time's up"));
        assert!(text.contains("*\\-3*"));
        assert!(text.contains("total: *10*"));
    }

    #[test]
    fn test_failed_commit_is_surfaced() {
        let text = report_text(&report(
            SessionState::Failed,
            CommitStatus::Failed {
                reason: "busy".to_string(),
            },
        ));
        assert!(text.contains("could not be saved"));
        assert!(!text.contains("busy"));
    }

    #[test]
    fn test_leaderboard_text() {
        let entries = vec![
            LeaderboardEntry {
                player: PlayerId(1),
                username: "Ada_L".to_string(),
                score: 12,
            },
            LeaderboardEntry {
                player: PlayerId(2),
                username: "Bob".to_string(),
                score: 7,
            },
        ];
        let text = leaderboard_text(Level::School, &entries);
        assert!(text.contains("🥇 Ada\\_L · *12*"));
        assert!(text.contains("🥈 Bob · *7*"));
        assert!(leaderboard_text(Level::University, &[]).contains("Nobody"));
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "point", "points"), "1 point");
        assert_eq!(plural(3, "point", "points"), "3 points");
    }
}
