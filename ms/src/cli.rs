//! CLI argument parsing for mapsync

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ms")]
#[command(author, version, about = "Mapping refresh notifications between workers and the coordinator", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run as coordinator: accept notifications and reconcile mappings
    Coordinator {
        /// Address to listen on (overrides config)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Tell the coordinator a resource's mapping may be stale
    Notify {
        /// Resource name
        #[arg(required = true)]
        resource: String,

        /// Resource instance id (default: not applicable)
        #[arg(short, long)]
        instance: Option<String>,

        /// Coordinator address (overrides config)
        #[arg(long)]
        coordinator: Option<String>,
    },

    /// Print the notification endpoint name
    Endpoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notify() {
        let cli = Cli::try_parse_from(["ms", "notify", "logs-2024", "-i", "inst-42", "--coordinator", "127.0.0.1:1"])
            .unwrap();
        match cli.command {
            Command::Notify {
                resource,
                instance,
                coordinator,
            } => {
                assert_eq!(resource, "logs-2024");
                assert_eq!(instance.as_deref(), Some("inst-42"));
                assert_eq!(coordinator.as_deref(), Some("127.0.0.1:1"));
            }
            other => panic!("Expected Notify, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["ms", "--log-level", "debug", "-c", "x.yml", "coordinator"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("x.yml")));
        assert!(matches!(cli.command, Command::Coordinator { listen: None }));
    }

    #[test]
    fn test_notify_requires_resource() {
        assert!(Cli::try_parse_from(["ms", "notify"]).is_err());
    }
}
