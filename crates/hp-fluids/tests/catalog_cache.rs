//! Process-wide catalog cache keyed by file path.

use std::sync::Arc;

use hp_fluids::{FluidError, RefrigerantCatalog};

#[test]
fn cached_catalog_is_shared_per_path() {
    let dir = std::env::temp_dir().join(format!("hp-fluids-catalog-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("refrigerants.json");
    std::fs::write(
        &path,
        r#"{"R290": {"CP": "n-Propane", "type": "HC", "T_NBP": -42.1, "T_crit": 96.7,
            "p_crit": 42.5, "ASHRAE34": "A3", "ODP": 0.0, "GWP100": 3.0}}"#,
    )
    .unwrap();

    let first = RefrigerantCatalog::cached(&path).unwrap();
    let second = RefrigerantCatalog::cached(&path).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.engine_id("R290").unwrap(), "n-Propane");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_file_is_reported() {
    let path = std::env::temp_dir().join("hp-fluids-does-not-exist.json");
    let err = RefrigerantCatalog::cached(&path).unwrap_err();
    assert!(matches!(err, FluidError::Catalog { .. }));
}
