//! Scenario and analysis files in the data directory
//!
//! Directory structure:
//! ~/.reval/
//!   reval.log
//!   scenarios/
//!     harbor-hotel.yaml
//!     resort.yaml

use std::fs;
use std::path::{Path, PathBuf};

use reval_core::ScenarioConfig;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::io::atomic_write;

/// Error types for storage operations
#[derive(Debug)]
pub enum StorageError {
    Io(String),
    Parse(String),
    Serialize(String),
    NotFound(String),
    /// The file parsed but describes an unusable scenario
    Invalid(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "IO error: {msg}"),
            StorageError::Parse(msg) => write!(f, "Parse error: {msg}"),
            StorageError::Serialize(msg) => write!(f, "Serialization error: {msg}"),
            StorageError::NotFound(msg) => write!(f, "Not found: {msg}"),
            StorageError::Invalid(msg) => write!(f, "Invalid scenario: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Read any YAML document
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let content = fs::read_to_string(path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {e}", path.display())))?;
    serde_saphyr::from_str(&content)
        .map_err(|e| StorageError::Parse(format!("Failed to parse {}: {e}", path.display())))
}

/// Write any value as YAML
pub fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let yaml = serde_saphyr::to_string(value)
        .map_err(|e| StorageError::Serialize(format!("Failed to serialize: {e}")))?;
    atomic_write(path, &yaml)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {e}", path.display())))
}

/// Manages the data directory
pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the default data directory path (~/.reval/)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".reval")
    }

    fn scenarios_dir(&self) -> PathBuf {
        self.root.join("scenarios")
    }

    fn scenario_path(&self, name: &str) -> PathBuf {
        self.scenarios_dir()
            .join(format!("{}.yaml", sanitize_filename(name)))
    }

    pub fn exists(&self) -> bool {
        self.root.exists() && self.scenarios_dir().exists()
    }

    pub fn init(&self) -> Result<(), StorageError> {
        let dir = self.scenarios_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::Io(format!("Failed to create {}: {e}", dir.display())))
    }

    /// Resolve a scenario reference: an existing file path, or the name of a
    /// scenario saved in the data directory.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, StorageError> {
        let direct = PathBuf::from(reference);
        if direct.is_file() {
            return Ok(direct);
        }
        let named = self.scenario_path(reference);
        if named.is_file() {
            return Ok(named);
        }
        Err(StorageError::NotFound(format!(
            "no scenario file '{reference}' and no saved scenario named '{reference}' in {}",
            self.scenarios_dir().display()
        )))
    }

    /// Load and structurally validate a scenario
    pub fn load_scenario(&self, reference: &str) -> Result<ScenarioConfig, StorageError> {
        let path = self.resolve(reference)?;
        let scenario: ScenarioConfig = load_yaml(&path)?;
        scenario
            .validate()
            .map_err(|problems| StorageError::Invalid(problems.join("; ")))?;
        tracing::debug!(path = %path.display(), operations = scenario.operations.len(), "Loaded scenario");
        Ok(scenario)
    }

    pub fn save_scenario(&self, name: &str, scenario: &ScenarioConfig) -> Result<PathBuf, StorageError> {
        if !self.exists() {
            self.init()?;
        }
        let path = self.scenario_path(name);
        save_yaml(&path, scenario)?;
        Ok(path)
    }

    /// Names of saved scenarios, sorted
    pub fn list_scenarios(&self) -> Result<Vec<String>, StorageError> {
        let dir = self.scenarios_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir)
            .map_err(|e| StorageError::Io(format!("Failed to read scenarios directory: {e}")))?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
