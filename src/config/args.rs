//! CLI argument parsing using clap

use clap::{Parser, Subcommand};

/// Service host command line
///
/// Without a command the process runs under the service control manager,
/// or in the foreground when started from a console.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbose output (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode - only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output to file
    #[arg(long, global = true)]
    pub log: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the installed service
    Start,

    /// Stop the running service
    Stop,

    /// Register the service with the service control manager
    Install {
        /// LocalSystem, LocalService, NetworkService or domain\username
        account: Option<String>,

        /// Password, required for user accounts
        password: Option<String>,
    },

    /// Remove the service from the service control manager
    Uninstall,

    /// Run the service in the foreground until Enter or Ctrl+C
    Run,
}

impl Args {
    /// Get the log level based on verbose/quiet flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => tracing::Level::INFO,
                1 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        }
    }
}
