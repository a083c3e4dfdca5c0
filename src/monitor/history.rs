use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{fs, io};
use tracing::debug;

/// The most recently accepted observation for one ordered currency pair.
///
/// `observed_at` is kept as the RFC 3339 string written to storage; records
/// with timestamps we cannot parse are still valid history and survive
/// pruning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatePoint {
    pub rate: f64,
    #[serde(rename = "timestamp")]
    pub observed_at: String,
    #[serde(rename = "update_time", default)]
    pub source_update_time: String,
}

/// Persistence for the pair-key -> latest accepted `RatePoint` mapping.
/// At most one entry per pair; the whole mapping is overwritten on save.
pub trait RateHistoryStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, RatePoint>>;
    fn save(&self, history: &HashMap<String, RatePoint>) -> Result<()>;
}

/// Reference store: a single JSON document keyed by pair string.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RateHistoryStore for JsonFileStore {
    fn load(&self) -> Result<HashMap<String, RatePoint>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No rate history at {}, starting empty", self.path.display());
                return Ok(HashMap::new());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read history: {}", self.path.display()));
            }
        };

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse history: {}", self.path.display()))
    }

    fn save(&self, history: &HashMap<String, RatePoint>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(history)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write history: {}", self.path.display()))
    }
}

/// In-memory store for tests and one-shot runs without persistence.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, RatePoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateHistoryStore for MemoryStore {
    fn load(&self) -> Result<HashMap<String, RatePoint>> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn save(&self, history: &HashMap<String, RatePoint>) -> Result<()> {
        *self.inner.lock().unwrap() = history.clone();
        Ok(())
    }
}
