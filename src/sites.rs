//! Site registry for export folders.
//!
//! Export files identify a site only by its plate (e.g. `GS1234`) and a
//! measurement only by its parameter name. Two JSON lookups kept next to the
//! exports turn those into readable site names and units:
//!
//! - `plate_info.json`: `{ "<plate>": "<site name>", ... }`
//! - `param_info.json`: `{ "<parameter>": "<unit>", ... }`
//!
//! A missing lookup file is not fatal; plates and parameters then fall back
//! to themselves and to "no unit".

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::ingest::IngestError;
use crate::logging::{self, Stage};

pub const PLATE_INFO_FILE: &str = "plate_info.json";
pub const PARAM_INFO_FILE: &str = "param_info.json";

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteCatalog {
    /// Plate → site name.
    pub plates: HashMap<String, String>,
    /// Parameter → unit.
    pub units: HashMap<String, String>,
}

impl SiteCatalog {
    /// Loads both lookups from `info_dir`.
    pub fn load(info_dir: &Path) -> Result<Self, IngestError> {
        Ok(Self {
            plates: load_lookup(&info_dir.join(PLATE_INFO_FILE))?,
            units: load_lookup(&info_dir.join(PARAM_INFO_FILE))?,
        })
    }

    /// Builds a catalog from in-memory JSON documents.
    pub fn from_json(plate_info: &str, param_info: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            plates: serde_json::from_str(plate_info)?,
            units: serde_json::from_str(param_info)?,
        })
    }

    /// The registered site name for `plate`, if any.
    pub fn site_name(&self, plate: &str) -> Option<&str> {
        self.plates.get(plate).map(String::as_str)
    }

    /// Column name used for `plate` in wide tables: the site name when
    /// registered, the plate itself otherwise.
    pub fn display_name(&self, plate: &str) -> String {
        self.site_name(plate).unwrap_or(plate).to_string()
    }

    pub fn unit(&self, parameter: &str) -> Option<&str> {
        self.units.get(parameter).map(String::as_str)
    }
}

fn load_lookup(path: &Path) -> Result<HashMap<String, String>, IngestError> {
    if !path.exists() {
        logging::warn(
            Stage::Ingest,
            None,
            &format!("{} not found, using an empty lookup", path.display()),
        );
        return Ok(HashMap::new());
    }
    let text = fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| IngestError::Json {
        path: path.display().to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const PLATES: &str = r#"{ "GS1234": "Kaituna at Te Matai", "GS2002": "Rangitaiki at Te Teko" }"#;
    const PARAMS: &str = r#"{ "Flow": "m^3/s", "Rainfall": "mm" }"#;

    #[test]
    fn test_display_name_prefers_registered_site() {
        let catalog = SiteCatalog::from_json(PLATES, PARAMS).unwrap();
        assert_eq!(catalog.display_name("GS1234"), "Kaituna at Te Matai");
        assert_eq!(
            catalog.display_name("GS9999"),
            "GS9999",
            "unregistered plates keep their own code"
        );
    }

    #[test]
    fn test_unit_lookup() {
        let catalog = SiteCatalog::from_json(PLATES, PARAMS).unwrap();
        assert_eq!(catalog.unit("Rainfall"), Some("mm"));
        assert_eq!(catalog.unit("Stage"), None);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PLATE_INFO_FILE), PLATES).unwrap();
        fs::write(dir.path().join(PARAM_INFO_FILE), PARAMS).unwrap();

        let catalog = SiteCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.plates.len(), 2);
        assert_eq!(catalog.site_name("GS2002"), Some("Rangitaiki at Te Teko"));
    }

    #[test]
    fn test_missing_lookup_files_give_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SiteCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog, SiteCatalog::default());
    }

    #[test]
    fn test_malformed_lookup_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PLATE_INFO_FILE), "[1, 2, 3]").unwrap();
        assert!(matches!(
            SiteCatalog::load(dir.path()),
            Err(IngestError::Json { .. })
        ));
    }
}
