//! `caseconf.toml` configuration.
//!
//! # Example
//!
//! ```toml
//! [parse]
//! strict_merge = true
//!
//! [assign]
//! "core_Trace.has_changed[==][{bool}]" = "true"
//! "core_Tool.name" = "bulk_extractor"
//! ```
//!
//! Assignments are applied in key order, before any `--set` flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use caseconf_core::{Assignment, ParseOptions};
use serde::{Deserialize, Serialize};

/// Loaded when no `--config` is given and the file exists.
pub const DEFAULT_CONFIG_FILE: &str = "caseconf.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub parse: ParseSettings,
    /// `Class.property[==][{spec}]` (or `Class.property`) to raw value.
    #[serde(default)]
    pub assign: BTreeMap<String, String>,
}

/// `[parse]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParseSettings {
    #[serde(default)]
    pub strict_merge: bool,
}

/// Everything a command needs to turn a file into a graph.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub options: ParseOptions,
    pub assignments: Vec<Assignment>,
}

pub fn read_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Pick the config file: the explicit path, else `caseconf.toml` in the
/// working directory if present.
pub fn locate_config(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.is_file().then_some(default)
        }
    }
}

/// Merge the config file with command-line flags. Flags win; `--set`
/// assignments come after the file's.
pub fn resolve_settings(
    config: &Config,
    strict_merge: bool,
    sets: &[String],
) -> Result<Settings, String> {
    let mut assignments = Vec::with_capacity(config.assign.len() + sets.len());
    for (key, value) in &config.assign {
        let text = format!("{}={}", key, value);
        assignments.push(
            Assignment::parse(&text)
                .map_err(|e| format!("invalid [assign] entry '{}': {}", key, e.message))?,
        );
    }
    for set in sets {
        assignments.push(
            Assignment::parse(set).map_err(|e| format!("invalid --set '{}': {}", set, e.message))?,
        );
    }

    Ok(Settings {
        options: ParseOptions {
            strict_merge: strict_merge || config.parse.strict_merge,
        },
        assignments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(
            r#"
[parse]
strict_merge = true

[assign]
"core_Trace.has_changed[==][{bool}]" = "true"
"core_Tool.name" = "extractor"
"#,
        )
        .unwrap();
        assert!(config.parse.strict_merge);
        assert_eq!(config.assign.len(), 2);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("[parse]\nstrict = true\n").is_err());
    }

    #[test]
    fn flags_are_layered_over_the_file() {
        let mut config = Config::default();
        config
            .assign
            .insert("core_Tool.name".to_owned(), "from-file".to_owned());
        let settings =
            resolve_settings(&config, true, &["core_Tool.name=from-flag".to_owned()]).unwrap();
        assert!(settings.options.strict_merge);
        assert_eq!(settings.assignments.len(), 2);
        assert_eq!(settings.assignments[1].decl.raw_value, "from-flag");
    }

    #[test]
    fn bad_assignment_is_reported_with_its_source() {
        let err = resolve_settings(&Config::default(), false, &["nonsense".to_owned()]).unwrap_err();
        assert!(err.starts_with("invalid --set 'nonsense'"));
    }

    #[test]
    fn explicit_config_path_wins() {
        let p = Path::new("/somewhere/custom.toml");
        assert_eq!(locate_config(Some(p)), Some(p.to_path_buf()));
    }
}
