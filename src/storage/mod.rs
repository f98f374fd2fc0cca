use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

/// Last known installed state of one asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "last_modified")]
    pub last_modified_marker: Option<String>,
    #[serde(rename = "checksum", default)]
    pub digest: String,
}

pub type Metadata = BTreeMap<String, InstalledRecord>;

/// Whole-file JSON store for installed asset state. No locking, no partial writes.
#[derive(Clone, Debug)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Metadata, String> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("metadata: {} absent, starting empty", self.path.display());
                return Ok(Metadata::new());
            }
            Err(err) => return Err(format!("failed to read metadata: {err}")),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            format!(
                "failed to parse metadata {}: {e}",
                self.path.display()
            )
        })
    }

    pub fn save(&self, metadata: &Metadata) -> Result<(), String> {
        let bytes = serde_json::to_vec_pretty(metadata)
            .map_err(|e| format!("failed to serialize metadata: {e}"))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create metadata dir: {e}"))?;
        }
        fs::write(&self.path, &bytes).map_err(|e| format!("failed to write metadata: {e}"))?;
        debug!(
            "metadata: wrote {} records to {}",
            metadata.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(marker: Option<&str>) -> InstalledRecord {
        InstalledRecord {
            source_url: "https://example.test/a.js".into(),
            last_modified_marker: marker.map(str::to_owned),
            digest: "abc".into(),
        }
    }

    #[test]
    fn absent_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(tmp.path().join("installed_dependencies.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_overwrites_whole_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(tmp.path().join("nested").join("meta.json"));

        let mut metadata = Metadata::new();
        metadata.insert("libA".into(), record(Some("Tue, 01 Oct 2024 10:00:00 GMT")));
        metadata.insert("libB".into(), record(None));
        store.save(&metadata).unwrap();

        metadata.remove("libB");
        store.save(&metadata).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, metadata);
    }

    #[test]
    fn uses_documented_field_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(tmp.path().join("meta.json"));
        let mut metadata = Metadata::new();
        metadata.insert("libA".into(), record(None));
        store.save(&metadata).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["libA"]["url"], "https://example.test/a.js");
        assert!(value["libA"]["last_modified"].is_null());
        assert_eq!(value["libA"]["checksum"], "abc");
        assert!(raw.contains('\n'), "metadata should be pretty-printed");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("meta.json");
        fs::write(&path, "{not json").unwrap();
        assert!(MetadataStore::new(&path).load().is_err());
    }
}
