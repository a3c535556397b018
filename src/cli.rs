use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "slack-harvest")]
#[command(about = "Export Slack channels, users, message history, threads and files")]
pub struct Cli {
    /// Directory in which to save output files (prints to stdout when omitted)
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Give the requested output in raw JSON format (no rendering)
    #[arg(long, global = true)]
    pub json: bool,

    /// Use extra delays between requests to avoid rate limiting
    #[arg(long, global = true)]
    pub gentle: bool,

    /// Give up after this many rate-limited attempts (default: retry forever)
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Restrict channel and user lists to a team (Enterprise Grid)
    #[arg(long, global = true)]
    pub team: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List all conversations in the workspace
    ListChannels,

    /// List all users in the workspace
    ListUsers,

    /// Export message history for every accessible conversation
    History {
        /// Restrict export to the given channel ID
        #[arg(short, long)]
        channel: Option<String>,

        /// Earliest message: Unix timestamp or YYYY-MM-DD
        #[arg(short, long)]
        from: Option<String>,

        /// Latest message: Unix timestamp or YYYY-MM-DD
        #[arg(short, long)]
        to: Option<String>,

        /// Also export reply threads
        #[arg(short, long)]
        replies: bool,
    },

    /// Export reply threads for every accessible conversation
    Replies {
        /// Earliest message: Unix timestamp or YYYY-MM-DD
        #[arg(short, long)]
        from: Option<String>,

        /// Latest message: Unix timestamp or YYYY-MM-DD
        #[arg(short, long)]
        to: Option<String>,
    },

    /// Download every file in the workspace (requires --output)
    Files,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_history_with_globals() {
        let cli = Cli::parse_from([
            "slack-harvest",
            "history",
            "--channel",
            "C1",
            "--from",
            "1700000000",
            "-r",
            "--json",
            "-o",
            "out",
        ]);

        assert!(cli.json);
        assert_eq!(cli.output.as_deref(), Some("out"));
        assert_eq!(
            cli.command,
            Commands::History {
                channel: Some("C1".to_string()),
                from: Some("1700000000".to_string()),
                to: None,
                replies: true,
            }
        );
    }

    #[test]
    fn test_parse_gentle_and_ceiling() {
        let cli = Cli::parse_from(["slack-harvest", "--gentle", "--max-attempts", "8", "list-users"]);

        assert!(cli.gentle);
        assert_eq!(cli.max_attempts, Some(8));
        assert_eq!(cli.command, Commands::ListUsers);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["slack-harvest"]).is_err());
    }
}
