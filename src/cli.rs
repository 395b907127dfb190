//! Command-line interface definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "grive-utils",
    version,
    about = "Preferences, version check and sync watcher for the grive Google Drive client",
    long_about = r#"
grive-utils wraps the grive command-line client:
1. Checks that the installed grive is recent enough (0.5.1 or newer)
2. Keeps sync settings (interval, rate caps, notifications) in a config file
3. Runs grive in the sync folder and reports what changed
4. Re-syncs periodically until stopped
"#
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use this config file instead of the per-user one
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the grive executable (defaults to searching PATH)
    #[arg(long, global = true)]
    pub grive: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that grive is installed and supported
    Check,

    /// Edit sync preferences
    Prefs,

    /// Show the current configuration
    Show,

    /// Run grive once in the sync folder
    Sync {
        /// Print changes as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Sync every configured interval until interrupted
    Watch {
        /// Print changes as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Pause periodic syncing
    Pause,

    /// Resume periodic syncing
    Resume,

    /// Open the sync folder in the file manager
    Open,

    /// Classify grive output lines read from stdin
    Parse {
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::parse_from(["grive-utils", "sync", "--json", "-c", "/tmp/cfg", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cfg")));
        assert!(matches!(cli.command, Commands::Sync { json: true }));
    }
}
