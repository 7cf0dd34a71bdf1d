// File-backed persistence of the series selection
use crate::domain::selection::Selection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read selection file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse selection file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigSaveError {
    #[error("failed to write selection file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize selection: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SelectionFile {
    #[serde(default)]
    active_series: BTreeMap<String, bool>,
}

#[derive(Debug, Clone)]
pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt files fall back to the default selection.
    pub fn load(&self) -> Selection {
        match self.try_load() {
            Ok(selection) => selection,
            Err(ConfigLoadError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no stored selection, using defaults");
                Selection::default()
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "ignoring stored selection");
                Selection::default()
            }
        }
    }

    fn try_load(&self) -> Result<Selection, ConfigLoadError> {
        let text = std::fs::read_to_string(&self.path)?;
        let file: SelectionFile = toml::from_str(&text)?;
        Ok(Selection::from_stored(&file.active_series))
    }

    pub fn save(&self, selection: &Selection) -> Result<(), ConfigSaveError> {
        let file = SelectionFile {
            active_series: selection.to_stored(),
        };
        let text = toml::to_string(&file)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}
