//! Format-agnostic configuration loading

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::{Error, Result, io};

/// Format-agnostic configuration store.
///
/// Detects the format from the file extension:
/// - `.toml` -> TOML
/// - `.json` -> JSON
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = io::read_text(path)?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => toml::from_str(&content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "TOML".into(),
                message: e.to_string(),
            }),
            "json" => serde_json::from_str(&content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "JSON".into(),
                message: e.to_string(),
            }),
            _ => Err(Error::UnsupportedFormat { extension }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        document_root: String,
        #[serde(default)]
        writable: Vec<String>,
    }

    #[test]
    fn loads_toml_by_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("webperm.toml");
        fs::write(&path, "document_root = \"/srv/www\"\nwritable = [\"uploads\"]\n").unwrap();

        let sample: Sample = ConfigStore::new().load(&path).unwrap();
        assert_eq!(sample.document_root, "/srv/www");
        assert_eq!(sample.writable, vec!["uploads".to_string()]);
    }

    #[test]
    fn loads_json_by_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("webperm.json");
        fs::write(&path, r#"{"document_root": "/srv/www"}"#).unwrap();

        let sample: Sample = ConfigStore::new().load(&path).unwrap();
        assert_eq!(sample.document_root, "/srv/www");
        assert!(sample.writable.is_empty());
    }

    #[test]
    fn parse_error_names_format() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.toml");
        fs::write(&path, "document_root = ").unwrap();

        let err = ConfigStore::new().load::<Sample>(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { ref format, .. } if format == "TOML"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("webperm.ini");
        fs::write(&path, "x=1").unwrap();

        let err = ConfigStore::new().load::<Sample>(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }
}
