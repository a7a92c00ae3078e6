//! Configuration file and effective settings.
//!
//! The file is optional. Values from it are overridden by command-line flags
//! and then validated into [`Settings`].

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use stackkit::{CloudTarget, MatchMode, PollConfig};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cli::Cli;
use crate::paths;

// ============================================================================
// File Format
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cloud: CloudSection,
    pub poll: PollSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloudSection {
    /// Named cloud profile (`--os-cloud`)
    pub name: Option<String>,
    /// Region (`--os-region-name`)
    pub region: Option<String>,
    /// Control-plane CLI to invoke
    pub cli: String,
}

impl Default for CloudSection {
    fn default() -> Self {
        Self {
            name: None,
            region: None,
            cli: stackkit::backend::openstack::DEFAULT_CLI.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSection {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub match_mode: MatchMode,
}

impl Default for PollSection {
    fn default() -> Self {
        let defaults = PollConfig::default();
        Self {
            interval_secs: defaults.interval.as_secs(),
            timeout_secs: defaults.timeout.as_secs(),
            match_mode: defaults.match_mode,
        }
    }
}

impl Config {
    /// Load the config file.
    ///
    /// An explicit path must exist. Without one the default location is used
    /// and a missing file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = paths::config_file()?;
                if !path.exists() {
                    log::debug!("No config file at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };
        Self::load_from(&path)
    }

    /// Load and parse a config file at a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line overrides and validate.
    pub fn into_settings(self, cli: &Cli) -> Result<Settings> {
        let server = cli.server.as_deref().map(str::trim).unwrap_or_default();
        if server.is_empty() {
            bail!("A server name is required (--server)");
        }

        let cloud = cli.cloud.clone().or(self.cloud.name);
        let region = cli.region.clone().or(self.cloud.region);
        let program = cli
            .openstack_bin
            .clone()
            .unwrap_or_else(|| self.cloud.cli.clone());
        if program.trim().is_empty() {
            bail!("The control-plane CLI must not be empty");
        }

        let interval = cli.interval.unwrap_or(self.poll.interval_secs);
        let timeout = cli.timeout.unwrap_or(self.poll.timeout_secs);
        if interval == 0 {
            bail!("Poll interval must be at least 1 second");
        }
        let match_mode = cli
            .match_mode
            .map(MatchMode::from)
            .unwrap_or(self.poll.match_mode);

        Ok(Settings {
            server: server.to_string(),
            target: CloudTarget::new(cloud, region),
            program: paths::expand(&program).to_string_lossy().into_owned(),
            poll: PollConfig::new(Duration::from_secs(interval), Duration::from_secs(timeout))
                .with_match_mode(match_mode),
        })
    }
}

// ============================================================================
// Effective Settings
// ============================================================================

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: String,
    pub target: CloudTarget,
    /// Control-plane CLI, with `~` and variables expanded
    pub program: String,
    pub poll: PollConfig,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["stackshot"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cloud.cli, "openstack");
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.poll.timeout_secs, 300);
        assert_eq!(config.poll.match_mode, MatchMode::Exact);
    }

    #[test]
    fn test_parse_full_file() {
        let config = Config::parse(
            r#"
            [cloud]
            name = "prod"
            region = "RegionOne"
            cli = "/opt/osc/bin/openstack"

            [poll]
            interval_secs = 10
            timeout_secs = 120
            match_mode = "contains"
            "#,
        )
        .unwrap();

        assert_eq!(config.cloud.name.as_deref(), Some("prod"));
        assert_eq!(config.cloud.region.as_deref(), Some("RegionOne"));
        assert_eq!(config.cloud.cli, "/opt/osc/bin/openstack");
        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.poll.timeout_secs, 120);
        assert_eq!(config.poll.match_mode, MatchMode::Contains);
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = Config::parse("[poll]\ntimeout_secs = 600\n").unwrap();
        assert_eq!(config.poll.timeout_secs, 600);
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.cloud.cli, "openstack");
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(Config::parse("[poll]\ninterval = 5\n").is_err());
        assert!(Config::parse("[poll]\nmatch_mode = \"fuzzy\"\n").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[cloud]\nname = \"staging\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.cloud.name.as_deref(), Some("staging"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_settings_from_file_only() {
        let config = Config::parse("[cloud]\nname = \"prod\"\nregion = \"east\"\n").unwrap();
        let settings = config.into_settings(&cli(&["-s", "web01"])).unwrap();

        assert_eq!(settings.server, "web01");
        assert_eq!(
            settings.target,
            CloudTarget::new(Some("prod".to_string()), Some("east".to_string()))
        );
        assert_eq!(settings.program, "openstack");
        assert_eq!(settings.poll, PollConfig::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = Config::parse(
            "[cloud]\nname = \"prod\"\n[poll]\ninterval_secs = 30\nmatch_mode = \"contains\"\n",
        )
        .unwrap();
        let settings = config
            .into_settings(&cli(&[
                "--server",
                "db02",
                "--cloud",
                "lab",
                "--interval",
                "5",
                "--timeout",
                "50",
                "--match-mode",
                "exact",
            ]))
            .unwrap();

        assert_eq!(settings.target.cloud.as_deref(), Some("lab"));
        assert_eq!(settings.target.region, None);
        assert_eq!(settings.poll.interval, Duration::from_secs(5));
        assert_eq!(settings.poll.timeout, Duration::from_secs(50));
        assert_eq!(settings.poll.match_mode, MatchMode::Exact);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::default()
            .into_settings(&cli(&["-s", "web01", "--interval", "0"]))
            .unwrap_err();
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn test_zero_timeout_allowed() {
        let settings = Config::default()
            .into_settings(&cli(&["-s", "web01", "--timeout", "0"]))
            .unwrap();
        assert_eq!(settings.poll.timeout, Duration::ZERO);
    }

    #[test]
    fn test_blank_server_rejected() {
        assert!(Config::default().into_settings(&cli(&["-s", "  "])).is_err());
    }
}
