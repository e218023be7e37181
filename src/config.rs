use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::FsResult;

pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether [`crate::Session::file`] hands out traditional path-based handles.
    pub traditional: bool,
    /// Resolve a tree handle against the provider as soon as it is built.
    pub refresh_on_creation: bool,
    /// Buffer used by stream copies.
    pub buffer_size: usize,
    /// JSON file persisting the current root grant across sessions.
    pub grant_store: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            traditional: false,
            refresh_on_creation: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
            grant_store: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> FsResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> FsResult {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{ "traditional": true }"#).unwrap();
        assert!(config.traditional);
        assert!(config.refresh_on_creation);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.grant_store, None);
    }

    #[test]
    fn load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fsx.json");

        let config = Config { buffer_size: 512, grant_store: Some(dir.path().join("grant.json")), ..Config::default() };
        config.save(&file).unwrap();

        assert_eq!(Config::load(&file).unwrap(), config);
        assert!(Config::load(dir.path().join("absent.json")).is_err());
    }
}
