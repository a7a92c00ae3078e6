//! Path resolution for stackshot
//!
//! # Environment Variables
//!
//! - `STACKSHOT_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/stackshot`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `STACKSHOT_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/stackshot` (if set)
//! 3. `~/.config/stackshot`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "STACKSHOT_CONFIG_DIR";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the stackshot config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("stackshot");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("stackshot");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Default location of the config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand `~` and environment variables in a path.
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
    PathBuf::from(expanded)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    /// Serializes tests that touch the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with `vars` set (`Some`) or removed (`None`), restoring them afterwards
    fn with_env<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        let originals: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();

        for (key, value) in vars {
            // SAFETY: env access is serialized by ENV_LOCK
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }
        let result = f();
        for (key, value) in originals {
            // SAFETY: env access is serialized by ENV_LOCK
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env(&[(ENV_CONFIG_DIR, Some("/custom/config/path"))], || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/config/path"));
        });
    }

    #[test]
    fn test_config_dir_env_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        with_env(&[(ENV_CONFIG_DIR, Some("~/dotfiles/stackshot"))], || {
            assert_eq!(config_dir().unwrap(), home.join("dotfiles").join("stackshot"));
        });
    }

    #[test]
    fn test_xdg_config_home() {
        with_env(
            &[(ENV_CONFIG_DIR, None), ("XDG_CONFIG_HOME", Some("/xdg/config"))],
            || {
                assert_eq!(
                    config_file().unwrap(),
                    PathBuf::from("/xdg/config/stackshot/config.toml")
                );
            },
        );
    }

    #[test]
    fn test_default_config_dir() {
        let home = dirs::home_dir().unwrap();
        with_env(&[(ENV_CONFIG_DIR, None), ("XDG_CONFIG_HOME", None)], || {
            assert_eq!(config_dir().unwrap(), home.join(".config").join("stackshot"));
        });
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/usr/local/bin/openstack"), PathBuf::from("/usr/local/bin/openstack"));
    }

    #[test]
    fn test_expand_with_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/bin/openstack"), home.join("bin/openstack"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        assert_eq!(
            expand("$STACKSHOT_SURELY_UNSET_VAR/x"),
            PathBuf::from("$STACKSHOT_SURELY_UNSET_VAR/x")
        );
    }
}
