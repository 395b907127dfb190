//! Configuration management for grive-utils
//!
//! Settings live in an INI file (`<user config dir>/grive-utils`) with a
//! single `[DEFAULT]` section. Every option has a built-in default, so the
//! file only needs to hold values the user changed.

use ini::{EscapePolicy, Ini, ParseOption, WriteOption};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{GriveUtilsError, Result};

const SECTION: &str = "DEFAULT";
const CONFIG_FILENAME: &str = "grive-utils";

/// Upper bound of the sync interval in minutes (30 days)
pub const MAX_INTERVAL: i64 = 43_200;
/// Upper bound of the rate caps in kbps
pub const MAX_RATE: i64 = 1_048_576;

/// The fixed set of options grive-utils understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// First-run authorization with grive has been done
    Init,
    Pause,
    /// Local sync root
    Path,
    /// Minutes between sync runs
    Interval,
    /// Upload cap in kbps, 0 for unlimited
    UpRate,
    /// Download cap in kbps, 0 for unlimited
    DownRate,
    Notify,
    LightPanel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Bool,
    Int,
    Str,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::Init,
        ConfigKey::Pause,
        ConfigKey::Path,
        ConfigKey::Interval,
        ConfigKey::UpRate,
        ConfigKey::DownRate,
        ConfigKey::Notify,
        ConfigKey::LightPanel,
    ];

    /// Option name as written in the config file
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::Init => "init",
            ConfigKey::Pause => "Pause",
            ConfigKey::Path => "Path",
            ConfigKey::Interval => "Interval",
            ConfigKey::UpRate => "UpRate",
            ConfigKey::DownRate => "DownRate",
            ConfigKey::Notify => "Notify",
            ConfigKey::LightPanel => "LightPanel",
        }
    }

    fn kind(self) -> ValueKind {
        match self {
            ConfigKey::Init | ConfigKey::Pause | ConfigKey::Notify | ConfigKey::LightPanel => {
                ValueKind::Bool
            }
            ConfigKey::Interval | ConfigKey::UpRate | ConfigKey::DownRate => ValueKind::Int,
            ConfigKey::Path => ValueKind::Str,
        }
    }

    /// Largest accepted value of an integer option
    fn max_value(self) -> Option<i64> {
        match self {
            ConfigKey::Interval => Some(MAX_INTERVAL),
            ConfigKey::UpRate | ConfigKey::DownRate => Some(MAX_RATE),
            _ => None,
        }
    }

    fn default_value(self) -> String {
        match self {
            ConfigKey::Init | ConfigKey::Pause | ConfigKey::LightPanel => "false".to_string(),
            ConfigKey::Notify => "true".to_string(),
            ConfigKey::Interval => "60".to_string(),
            ConfigKey::UpRate | ConfigKey::DownRate => "0".to_string(),
            ConfigKey::Path => default_sync_root().display().to_string(),
        }
    }
}

fn default_sync_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Google Drive")
}

fn parse_bool(key: ConfigKey, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(GriveUtilsError::InvalidValue {
            key: key.name(),
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}

fn parse_int(key: ConfigKey, value: &str) -> Result<i64> {
    let parsed: i64 = value.trim().parse().map_err(|_| GriveUtilsError::InvalidValue {
        key: key.name(),
        value: value.to_string(),
        expected: "an integer",
    })?;

    match key.max_value() {
        Some(max) if !(0..=max).contains(&parsed) => Err(GriveUtilsError::InvalidValue {
            key: key.name(),
            value: value.to_string(),
            expected: "a number in the allowed range",
        }),
        _ => Ok(parsed),
    }
}

/// In-memory view of the configuration file.
///
/// Loaded once, handed by reference to whoever needs it, and written back
/// only through [`ConfigStore::save`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
    /// Sections other than `[DEFAULT]`, written back untouched
    other_sections: Vec<(String, Vec<(String, String)>)>,
}

impl ConfigStore {
    /// Get the per-user config file path
    pub fn config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join(CONFIG_FILENAME))
            .ok_or_else(|| {
                GriveUtilsError::Config("Could not find user config directory".to_string())
            })
    }

    /// Defaults only, bound to `path` for a later save
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        let values = ConfigKey::ALL
            .iter()
            .map(|key| (key.name().to_string(), key.default_value()))
            .collect();

        Self {
            path: path.into(),
            values,
            other_sections: Vec::new(),
        }
    }

    /// Load from the per-user config path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path()?)
    }

    /// Load defaults and overlay the file at `path` if it exists
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::with_defaults(path);

        let content = match fs::read_to_string(&store.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {:?}, using defaults", store.path);
                return Ok(store);
            }
            Err(e) => return Err(e.into()),
        };

        let ini = Ini::load_from_str_opt(&content, Self::parse_options()).map_err(|e| {
            GriveUtilsError::ConfigParse {
                path: store.path.display().to_string(),
                message: e.to_string(),
            }
        })?;

        for (section, properties) in ini.iter() {
            match section {
                None if properties.iter().next().is_none() => {}
                None => {
                    return Err(GriveUtilsError::ConfigParse {
                        path: store.path.display().to_string(),
                        message: "options found before any section header".to_string(),
                    });
                }
                Some(SECTION) => {
                    for (name, value) in properties.iter() {
                        store.values.insert(name.to_string(), value.to_string());
                    }
                }
                Some(other) => {
                    let entries = properties
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();
                    store.other_sections.push((other.to_string(), entries));
                }
            }
        }

        store.validate()?;
        debug!("Loaded config from {:?}", store.path);
        Ok(store)
    }

    /// Write the whole mapping back, replacing the file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut ini = Ini::new();
        for (name, value) in &self.values {
            ini.with_section(Some(SECTION)).set(name.as_str(), value.as_str());
        }
        for (section, entries) in &self.other_sections {
            for (name, value) in entries {
                ini.with_section(Some(section.as_str()))
                    .set(name.as_str(), value.as_str());
            }
        }

        let mut buf = Vec::new();
        ini.write_to_opt(
            &mut buf,
            WriteOption {
                escape_policy: EscapePolicy::Nothing,
                ..Default::default()
            },
        )?;
        fs::write(&self.path, buf)?;

        debug!("Saved config to {:?}", self.path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw string value of an option
    pub fn get_str(&self, key: ConfigKey) -> &str {
        self.values
            .get(key.name())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn get_int(&self, key: ConfigKey) -> Result<i64> {
        parse_int(key, self.get_str(key))
    }

    pub fn get_bool(&self, key: ConfigKey) -> Result<bool> {
        parse_bool(key, self.get_str(key))
    }

    pub fn set_str(&mut self, key: ConfigKey, value: impl Into<String>) {
        self.values.insert(key.name().to_string(), value.into());
    }

    pub fn set_int(&mut self, key: ConfigKey, value: i64) {
        self.set_str(key, value.to_string());
    }

    pub fn set_bool(&mut self, key: ConfigKey, value: bool) {
        self.set_str(key, if value { "true" } else { "false" });
    }

    /// Local sync root
    pub fn sync_root(&self) -> PathBuf {
        PathBuf::from(self.get_str(ConfigKey::Path))
    }

    /// All options sorted by name, including any the file added
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn validate(&self) -> Result<()> {
        for key in ConfigKey::ALL {
            match key.kind() {
                ValueKind::Bool => {
                    self.get_bool(key)?;
                }
                ValueKind::Int => {
                    self.get_int(key)?;
                }
                ValueKind::Str => {}
            }
        }
        Ok(())
    }

    fn parse_options() -> ParseOption {
        ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..Default::default()
        }
    }
}
