use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mathgame")]
#[command(author, version, about = "Telegram math quiz bot with a Mini App API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (and the Mini App API when WEBAPP_PORT is set)
    Run,

    /// Run only the Mini App API server
    Serve {
        /// Port to listen on (defaults to WEBAPP_PORT, then 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print a leaderboard from the database
    Leaderboard {
        /// school or university
        #[arg(short, long, default_value = "school")]
        level: String,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Apply pending database migrations and exit
    Migrate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::try_parse_from(["mathgame"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_leaderboard_args() {
        let cli = Cli::try_parse_from(["mathgame", "leaderboard", "--level", "university", "-n", "3"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Leaderboard {
                level: "university".to_string(),
                limit: 3
            })
        );
    }

    #[test]
    fn test_serve_port() {
        let cli = Cli::try_parse_from(["mathgame", "serve", "--port", "9000"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Serve { port: Some(9000) }));
    }
}
