use clap::{Parser, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackshot")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Back up an OpenStack server and its volumes, then restore it to how it was",
    long_about = None
)]
pub struct Cli {
    /// Server name to back up
    #[arg(short, long, required_unless_present = "completions")]
    pub server: Option<String>,

    /// Named cloud profile (--os-cloud)
    #[arg(short, long)]
    pub cloud: Option<String>,

    /// Region (--os-region-name)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Config file (default: ~/.config/stackshot/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Control-plane CLI to invoke
    #[arg(long, value_name = "PATH")]
    pub openstack_bin: Option<String>,

    /// Seconds between status checks
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Seconds to wait for a status before giving up
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// How observed statuses are compared with the expected one
    #[arg(long, value_enum)]
    pub match_mode: Option<MatchModeArg>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MatchModeArg {
    /// Trimmed status must equal the expected one
    Exact,
    /// Status must contain the expected one
    Contains,
}

impl From<MatchModeArg> for stackkit::MatchMode {
    fn from(arg: MatchModeArg) -> Self {
        match arg {
            MatchModeArg::Exact => Self::Exact,
            MatchModeArg::Contains => Self::Contains,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_server_required() {
        assert!(Cli::try_parse_from(["stackshot"]).is_err());
    }

    #[test]
    fn test_completions_without_server() {
        let cli = Cli::try_parse_from(["stackshot", "--completions", "bash"]).unwrap();
        assert_eq!(cli.completions, Some(Shell::Bash));
        assert!(cli.server.is_none());
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from(["stackshot", "-s", "web01", "-c", "prod", "-r", "east", "-vv"])
            .unwrap();
        assert_eq!(cli.server.as_deref(), Some("web01"));
        assert_eq!(cli.cloud.as_deref(), Some("prod"));
        assert_eq!(cli.region.as_deref(), Some("east"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_match_mode_value() {
        let cli =
            Cli::try_parse_from(["stackshot", "-s", "web01", "--match-mode", "contains"]).unwrap();
        assert_eq!(cli.match_mode, Some(MatchModeArg::Contains));
    }
}
