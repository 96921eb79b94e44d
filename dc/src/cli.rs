//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::device::DeviceAddr;

/// devicecoord - device operation coordination toolkit
#[derive(Parser)]
#[command(
    name = "dc",
    about = "Admission control, deadlines and resource monitoring for device operations",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/devicecoord/logs/devicecoord.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (overrides the config file)
    #[arg(short, long, global = true, help = "Log level: trace, debug, info, warn, error")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Manage device groups
    Groups {
        /// Group file (defaults to storage.groups-file)
        #[arg(long, global = true)]
        groups_file: Option<PathBuf>,

        #[command(subcommand)]
        command: GroupsCommand,
    },

    /// Run the coordinator sweeper, operation tracker and resource monitor
    Monitor {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Output format for the final sample
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Group subcommands
#[derive(Subcommand)]
pub enum GroupsCommand {
    /// List all groups, or one group
    List {
        /// Group name, e.g. @living
        name: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Add devices to a group, creating it if needed
    Add {
        name: String,

        /// Devices as <ip>/<object-id>, e.g. 192.168.1.10/013001
        #[arg(required = true)]
        devices: Vec<DeviceAddr>,
    },

    /// Remove devices from a group
    Remove {
        name: String,

        #[arg(required = true)]
        devices: Vec<DeviceAddr>,
    },

    /// Delete a group
    Delete { name: String },
}

/// Output format for list and monitor commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("devicecoord")
        .join("logs")
        .join("devicecoord.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["dc"]).is_err());
    }

    #[test]
    fn test_groups_add_parses_devices() {
        let cli = Cli::parse_from(["dc", "groups", "add", "@living", "192.168.1.10/013001", "192.168.1.11/029101"]);
        match cli.command {
            Command::Groups {
                command: GroupsCommand::Add { name, devices },
                groups_file,
            } => {
                assert_eq!(name, "@living");
                assert_eq!(devices.len(), 2);
                assert_eq!(devices[1].object.class(), 0x0291);
                assert!(groups_file.is_none());
            }
            _ => panic!("expected groups add"),
        }
    }

    #[test]
    fn test_groups_add_rejects_bad_device() {
        assert!(Cli::try_parse_from(["dc", "groups", "add", "@living", "not-a-device"]).is_err());
    }

    #[test]
    fn test_groups_add_requires_device() {
        assert!(Cli::try_parse_from(["dc", "groups", "add", "@living"]).is_err());
    }

    #[test]
    fn test_groups_file_after_subcommand() {
        let cli = Cli::parse_from(["dc", "groups", "delete", "@a", "--groups-file", "/tmp/g.json"]);
        match cli.command {
            Command::Groups { groups_file, .. } => assert_eq!(groups_file, Some(PathBuf::from("/tmp/g.json"))),
            _ => panic!("expected groups"),
        }
    }

    #[test]
    fn test_monitor_args() {
        let cli = Cli::parse_from(["dc", "--log-level", "debug", "monitor", "--seconds", "3", "--format", "json"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Monitor { seconds, format } => {
                assert_eq!(seconds, Some(3));
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected monitor"),
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
