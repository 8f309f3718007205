use derive_more::derive::From;
use serde::de::DeserializeOwned;

mod settings;

pub use settings::*;

#[derive(Debug, From)]
pub enum ConfigError {
    #[from(ignore)]
    IOError(std::io::Error),

    #[from(ignore)]
    DeserializationFailed(toml::de::Error),

    InvalidPath(std::path::PathBuf),
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::DeserializationFailed(value)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `value_from_path` returns the regular `toml::Value` object instead of a
/// defined type, for callers that want to poke at the raw table.
pub fn value_from_path<V: Into<std::path::PathBuf>>(target: V) -> ConfigResult<toml::Value> {
    from_path(target)
}

pub fn from_path<T, V>(target: V) -> ConfigResult<T>
where
    T: DeserializeOwned,
    V: Into<std::path::PathBuf>,
{
    let target_path = target.into();
    if target_path.is_dir() {
        return Err(ConfigError::InvalidPath(target_path));
    }

    let config_content = std::fs::read_to_string(target_path)?;
    let config_obj: T = toml::from_str(&config_content)?;
    Ok(config_obj)
}

/// `load_settings` reads [`Settings`] from `target` when given, falling back
/// to the defaults when no file was asked for.
pub fn load_settings(target: Option<&std::path::Path>) -> ConfigResult<Settings> {
    match target {
        Some(path) => from_path(path),
        None => Ok(Settings::default()),
    }
}
