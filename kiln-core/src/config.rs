//! Compiler configuration.
//!
//! Read from `kiln/config.json` in the XDG config directories,
//! then overridden by `KILN_DEBUG` and `KILN_PASSES` env vars.

use crate::error::KilnError;
use log::{debug, info};
use nanoserde::DeJson;

/// Passes run by default, in this order
pub const DEFAULT_PASSES: [&str; 3] = ["simplify", "cse", "dce"];

/// Compiler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Debug mask.
    /// bit 0 config loading, bit 1 reductions, bit 2 passes, bit 3 IR dumps.
    pub debug: u32,
    /// Names of optimization passes in the order they are run
    pub passes: Vec<String>,
}

// All fields are optional, missing ones keep defaults
#[derive(DeJson, Debug, Default)]
struct ConfigFile {
    debug: Option<u32>,
    passes: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: 0,
            passes: DEFAULT_PASSES.iter().map(|p| (*p).into()).collect(),
        }
    }
}

impl Config {
    /// Load config from disk and env. Never fails, unreadable
    /// or invalid config files are ignored and defaults are used.
    #[must_use]
    pub fn load() -> Config {
        let mut config = Config::default();
        config.apply_env();
        let from_file = xdg::BaseDirectories::new()
            .map_err(|e| config.log(format_args!("Failed to find config directories, {e}")))
            .ok()
            .map(|bd| {
                let mut dirs = bd.get_config_dirs();
                dirs.push(bd.get_config_home());
                dirs
            })
            .and_then(|paths| {
                paths.into_iter().find_map(|mut path| {
                    path.push("kiln/config.json");
                    std::fs::read_to_string(&path).ok()
                })
            })
            .and_then(|file| {
                Config::from_json(&file)
                    .map_err(|e| config.log(format_args!("Failed to parse config.json, {e}")))
                    .ok()
            });
        if let Some(from_file) = from_file {
            config.log(format_args!("Config successfully read and parsed."));
            config = from_file;
        } else {
            config.log(format_args!("Config file not found, using defaults."));
        }
        // Env always wins over the file
        config.apply_env();
        config
    }

    /// Parse config from json, missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Config, KilnError> {
        let file = ConfigFile::deserialize_json(json)
            .map_err(|e| KilnError::ConfigError(format!("{e:?}").into()))?;
        let mut config = Config::default();
        if let Some(debug) = file.debug {
            config.debug = debug;
        }
        if let Some(passes) = file.passes {
            config.passes = passes;
        }
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(x) = std::env::var("KILN_DEBUG") {
            if let Ok(x) = x.parse::<u32>() {
                self.debug = x;
            }
        }
        if let Ok(x) = std::env::var("KILN_PASSES") {
            self.passes = x
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(Into::into)
                .collect();
        }
    }

    fn log(&self, args: core::fmt::Arguments<'_>) {
        if self.debug_config() {
            info!("{args}");
        } else {
            debug!("{args}");
        }
    }

    /// Log config loading
    #[must_use]
    pub const fn debug_config(&self) -> bool {
        self.debug % 2 == 1
    }

    /// Log constructed reductions
    #[must_use]
    pub const fn debug_reduce(&self) -> bool {
        (self.debug >> 1) % 2 == 1
    }

    /// Log pass runs
    #[must_use]
    pub const fn debug_passes(&self) -> bool {
        (self.debug >> 2) % 2 == 1
    }

    /// Dump IR after every pass
    #[must_use]
    pub const fn debug_ir(&self) -> bool {
        (self.debug >> 3) % 2 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"debug": 6}"#).unwrap();
        assert_eq!(config.debug, 6);
        assert_eq!(config.passes, Config::default().passes);
        assert!(!config.debug_config());
        assert!(config.debug_reduce());
        assert!(config.debug_passes());
        assert!(!config.debug_ir());
    }

    #[test]
    fn passes_from_json() {
        let config = Config::from_json(r#"{"passes": ["dce"]}"#).unwrap();
        assert_eq!(config.passes, ["dce"]);
    }

    #[test]
    fn invalid_json() {
        assert!(matches!(Config::from_json("{debug"), Err(KilnError::ConfigError(_))));
    }
}
