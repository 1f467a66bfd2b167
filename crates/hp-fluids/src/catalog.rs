//! Refrigerant metadata catalog.
//!
//! A JSON map from display name (`"R1234ZE(E)"`) to the CoolProp identifier
//! and classification data. Temperatures are °C, pressures bar.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{FluidError, FluidResult};

const BUILTIN_CATALOG: &str = include_str!("../data/refrigerants.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefrigerantInfo {
    /// Identifier understood by the EOS backend.
    #[serde(rename = "CP")]
    pub cp: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "T_NBP")]
    pub t_nbp: f64,
    #[serde(rename = "T_crit")]
    pub t_crit: f64,
    #[serde(rename = "p_crit")]
    pub p_crit: f64,
    #[serde(rename = "ASHRAE34")]
    pub ashrae34: String,
    #[serde(rename = "ODP")]
    pub odp: f64,
    #[serde(rename = "GWP100")]
    pub gwp100: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefrigerantCatalog {
    entries: BTreeMap<String, RefrigerantInfo>,
}

impl RefrigerantCatalog {
    pub fn from_json_str(json: &str) -> FluidResult<Self> {
        serde_json::from_str(json).map_err(|e| FluidError::Catalog {
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> FluidResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| FluidError::Catalog {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&text)
    }

    /// Catalog shipped with the crate.
    pub fn builtin() -> FluidResult<Arc<Self>> {
        static BUILTIN: OnceLock<Arc<RefrigerantCatalog>> = OnceLock::new();
        if let Some(catalog) = BUILTIN.get() {
            return Ok(Arc::clone(catalog));
        }
        let catalog = Arc::new(Self::from_json_str(BUILTIN_CATALOG)?);
        Ok(Arc::clone(BUILTIN.get_or_init(|| catalog)))
    }

    /// Load `path` once per process; later calls share the parsed catalog.
    pub fn cached(path: &Path) -> FluidResult<Arc<Self>> {
        static CACHE: OnceLock<Mutex<HashMap<PathBuf, Arc<RefrigerantCatalog>>>> =
            OnceLock::new();
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut guard = cache.lock().map_err(|_| FluidError::Catalog {
            message: "catalog cache poisoned".into(),
        })?;
        if let Some(catalog) = guard.get(path) {
            return Ok(Arc::clone(catalog));
        }
        let catalog = Arc::new(Self::load(path)?);
        tracing::debug!(path = %path.display(), entries = catalog.len(), "loaded refrigerant catalog");
        guard.insert(path.to_path_buf(), Arc::clone(&catalog));
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RefrigerantInfo)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up by display name, case-insensitively, falling back to the
    /// backend identifier.
    pub fn lookup(&self, name: &str) -> FluidResult<&RefrigerantInfo> {
        let wanted = name.trim().to_ascii_uppercase();
        self.entries
            .iter()
            .find(|(display, _)| display.to_ascii_uppercase() == wanted)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(_, info)| info.cp.to_ascii_uppercase() == wanted)
            })
            .map(|(_, info)| info)
            .ok_or_else(|| FluidError::UnknownFluid {
                name: name.to_string(),
            })
    }

    /// Backend identifier for a display name.
    pub fn engine_id(&self, name: &str) -> FluidResult<&str> {
        self.lookup(name).map(|info| info.cp.as_str())
    }

    /// Display names whose name, identifier or type contains `query`.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.trim().to_ascii_lowercase();
        self.entries
            .iter()
            .filter(|(display, info)| {
                query.is_empty()
                    || display.to_ascii_lowercase().contains(&query)
                    || info.cp.to_ascii_lowercase().contains(&query)
                    || info.kind.to_ascii_lowercase().contains(&query)
            })
            .map(|(display, _)| display.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_parses() {
        let catalog = RefrigerantCatalog::builtin().unwrap();
        assert!(catalog.len() >= 5);
        let ammonia = catalog.lookup("R717").unwrap();
        assert_eq!(ammonia.cp, "Ammonia");
        assert_eq!(ammonia.ashrae34, "B2L");
    }

    #[test]
    fn lookup_is_case_insensitive_and_falls_back_to_cp() {
        let catalog = RefrigerantCatalog::builtin().unwrap();
        assert_eq!(catalog.engine_id("r1234ze(e)").unwrap(), "R1234ze(E)");
        assert_eq!(catalog.engine_id("CO2").unwrap(), "CO2");
        assert!(matches!(
            catalog.lookup("R9999"),
            Err(FluidError::UnknownFluid { .. })
        ));
    }

    #[test]
    fn search_by_type() {
        let catalog = RefrigerantCatalog::builtin().unwrap();
        let naturals = catalog.search("natural");
        assert!(naturals.contains(&"R744"));
        assert!(!naturals.contains(&"R134A"));
    }

    #[test]
    fn malformed_json_is_a_catalog_error() {
        let err = RefrigerantCatalog::from_json_str("{\"R1\": {\"CP\": 3}}").unwrap_err();
        assert!(matches!(err, FluidError::Catalog { .. }));
    }
}
