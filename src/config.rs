use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// User overlay location, relative to `$HOME`.
const USER_CONFIG: &str = "~/.config/cmdgate/config.toml";

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub commands: Commands,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Ask (rather than deny) for commands no rule covers.
    #[serde(default = "default_true")]
    pub ask_if_unspecified: bool,
    /// Run `ask` commands without prompting.
    #[serde(default)]
    pub auto_approve: bool,
    /// Kill commands that run longer than this. Absent means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Match `||` before `|` when splitting compound commands.
    #[serde(default)]
    pub longest_match_operators: bool,
    /// Treat an unquoted newline as a command separator.
    #[serde(default)]
    pub split_on_newline: bool,
    /// Treat a lone unquoted `&` as a command separator.
    #[serde(default)]
    pub split_on_background: bool,
    /// Evaluate the script of `bash -c '...'` as a full compound command.
    #[serde(default)]
    pub inspect_bash_scripts: bool,
    /// Evaluate `$(...)` and backtick contents as additional commands.
    #[serde(default)]
    pub inspect_substitutions: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ask_if_unspecified: true,
            auto_approve: false,
            timeout_secs: None,
            longest_match_operators: false,
            split_on_newline: false,
            split_on_background: false,
            inspect_bash_scripts: false,
            inspect_substitutions: false,
        }
    }
}

/// Rule lists. Entries are `command` or `command:filter`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Commands {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

/// Which rule list a persisted rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleList {
    Allow,
    Deny,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    commands: CommandsOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    ask_if_unspecified: Option<bool>,
    auto_approve: Option<bool>,
    timeout_secs: Option<u64>,
    longest_match_operators: Option<bool>,
    split_on_newline: Option<bool>,
    split_on_background: Option<bool>,
    inspect_bash_scripts: Option<bool>,
    inspect_substitutions: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct CommandsOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    allow: Vec<String>,
    #[serde(default)]
    deny: Vec<String>,
    #[serde(default)]
    remove_allow: Vec<String>,
    #[serde(default)]
    remove_deny: Vec<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

fn override_with<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

/// Expand a leading `~` (and `$VARS`) in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or_else(|_| shellexpand::tilde(path));
    PathBuf::from(expanded.into_owned())
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Defaults merged with `~/.config/cmdgate/config.toml`, if present.
    ///
    /// A broken user file is logged and ignored.
    pub fn load() -> Self {
        let path = expand_path(USER_CONFIG);
        let mut config = Self::default_config();
        if !path.exists() {
            return config;
        }
        match read_overlay(&path) {
            Ok(overlay) => config.apply_overlay(overlay),
            Err(e) => log::warn!("{e}; using defaults"),
        }
        config
    }

    /// Defaults merged with the overlay at `path` (`~` is expanded).
    pub fn load_from(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        let path = expand_path(path.as_ref());
        let overlay = read_overlay(&path)?;
        let mut config = Self::default_config();
        config.apply_overlay(overlay);
        Ok(config)
    }

    /// Write the full config as TOML, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let body = toml::to_string_pretty(self)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, body).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Append persisted rules to a list, skipping ones already present.
    pub fn record_rules<I, S>(&mut self, list: RuleList, rules: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target = match list {
            RuleList::Allow => &mut self.commands.allow,
            RuleList::Deny => &mut self.commands.deny,
        };
        merge_list(target, rules.into_iter().map(Into::into).collect(), &[], false);
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        override_with(&mut self.settings.ask_if_unspecified, s.ask_if_unspecified);
        override_with(&mut self.settings.auto_approve, s.auto_approve);
        if s.timeout_secs.is_some() {
            self.settings.timeout_secs = s.timeout_secs;
        }
        override_with(
            &mut self.settings.longest_match_operators,
            s.longest_match_operators,
        );
        override_with(&mut self.settings.split_on_newline, s.split_on_newline);
        override_with(&mut self.settings.split_on_background, s.split_on_background);
        override_with(&mut self.settings.inspect_bash_scripts, s.inspect_bash_scripts);
        override_with(
            &mut self.settings.inspect_substitutions,
            s.inspect_substitutions,
        );

        let c = overlay.commands;
        merge_list(
            &mut self.commands.allow,
            c.allow,
            &c.remove_allow,
            c.replace,
        );
        merge_list(&mut self.commands.deny, c.deny, &c.remove_deny, c.replace);
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

fn read_overlay(path: &Path) -> Result<ConfigOverlay, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
