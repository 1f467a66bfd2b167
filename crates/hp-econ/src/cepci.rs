//! Chemical Engineering Plant Cost Index by year.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{CostError, CostResult};

const BUILTIN_TABLE: &str = include_str!("../data/cepci.json");

/// Index values keyed by four-digit year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CepciTable {
    values: BTreeMap<i32, f64>,
}

impl CepciTable {
    pub fn from_json_str(json: &str) -> CostResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> CostResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Table shipped with the crate.
    pub fn builtin() -> CostResult<Arc<Self>> {
        static BUILTIN: OnceLock<Arc<CepciTable>> = OnceLock::new();
        if let Some(table) = BUILTIN.get() {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(Self::from_json_str(BUILTIN_TABLE)?);
        Ok(Arc::clone(BUILTIN.get_or_init(|| table)))
    }

    /// Load `path` once per process; later calls share the parsed table.
    pub fn cached(path: &Path) -> CostResult<Arc<Self>> {
        static CACHE: OnceLock<Mutex<HashMap<PathBuf, Arc<CepciTable>>>> = OnceLock::new();
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut guard = cache
            .lock()
            .map_err(|_| std::io::Error::other("CEPCI cache poisoned"))?;
        if let Some(table) = guard.get(path) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(Self::load(path)?);
        tracing::debug!(path = %path.display(), years = table.values.len(), "loaded CEPCI table");
        guard.insert(path.to_path_buf(), Arc::clone(&table));
        Ok(table)
    }

    pub fn index(&self, year: i32) -> CostResult<f64> {
        self.values
            .get(&year)
            .copied()
            .ok_or(CostError::MissingYear { year })
    }

    /// Price factor from `reference` to `current`.
    pub fn ratio(&self, current: i32, reference: i32) -> CostResult<f64> {
        Ok(self.index(current)? / self.index(reference)?)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.values.keys().copied()
    }
}
