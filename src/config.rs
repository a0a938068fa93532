use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_RANKING_DB_PATH: &str = ".data/ranking.json";
pub const DEFAULT_PROFILE_DB_PATH: &str = ".data/profiles.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub ranking_path: PathBuf,
    pub profile_path: PathBuf,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ranking_path: PathBuf::from(DEFAULT_RANKING_DB_PATH),
            profile_path: PathBuf::from(DEFAULT_PROFILE_DB_PATH),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset keys take defaults; set
    /// but malformed keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            None => defaults.port,
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "PORT",
                    value: raw,
                })?,
        };
        let ranking_path = path_or(lookup("RANKING_DB_PATH"), "RANKING_DB_PATH")?
            .unwrap_or(defaults.ranking_path);
        let profile_path = path_or(lookup("PROFILE_DB_PATH"), "PROFILE_DB_PATH")?
            .unwrap_or(defaults.profile_path);
        let static_dir = path_or(lookup("STATIC_DIR"), "STATIC_DIR")?;

        Ok(Self {
            port,
            ranking_path,
            profile_path,
            static_dir,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn path_or(raw: Option<String>, key: &'static str) -> Result<Option<PathBuf>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty { key }),
        Some(value) => Ok(Some(PathBuf::from(value.trim()))),
    }
}
