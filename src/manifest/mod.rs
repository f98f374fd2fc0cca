use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_json::Value;

use crate::util::url_extension;

/// How an asset lands in the target directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    /// Single file copied under its asset name.
    File,
    /// Archive whose members are extracted into the target directory.
    Bundle,
}

impl AssetKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(AssetKind::File),
            "folder" => Some(AssetKind::Bundle),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssetKind::File => "file",
            AssetKind::Bundle => "folder",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetSpec {
    pub name: String,
    pub source_url: String,
    pub kind: AssetKind,
    pub keep_extension: bool,
}

impl AssetSpec {
    pub fn file(name: &str, url: &str) -> Self {
        Self {
            name: name.to_owned(),
            source_url: url.to_owned(),
            kind: AssetKind::File,
            keep_extension: false,
        }
    }

    pub fn bundle(name: &str, url: &str) -> Self {
        Self {
            kind: AssetKind::Bundle,
            ..Self::file(name, url)
        }
    }

    /// Suffix appended to the asset name on disk (`.ext` or empty).
    ///
    /// Bundles always keep the extension so the staged archive stays recognisable;
    /// files only keep it when asked to.
    pub fn file_suffix(&self) -> String {
        let keep = match self.kind {
            AssetKind::Bundle => true,
            AssetKind::File => self.keep_extension,
        };
        match url_extension(&self.source_url) {
            Some(ext) if keep => format!(".{ext}"),
            _ => String::new(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.file_suffix())
    }
}

/// Declared assets in declaration order. Names are unique.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<AssetSpec>,
}

impl Manifest {
    pub fn new(entries: Vec<AssetSpec>) -> Self {
        let mut manifest = Manifest::default();
        for entry in entries {
            manifest.insert(entry);
        }
        manifest
    }

    /// Insert or replace by name; a replaced entry keeps its original position.
    fn insert(&mut self, spec: AssetSpec) {
        match self.entries.iter_mut().find(|e| e.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.entries.push(spec),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AssetSpec> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetSpec> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Parse manifest JSON. Any shape problem rejects the whole document.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| format!("manifest parse error: {e}"))?;
        let Value::Object(map) = value else {
            return Err("manifest root must be an object".into());
        };
        let mut manifest = Manifest::default();
        for (name, rule) in map {
            manifest.insert(parse_rule(&name, &rule)?);
        }
        Ok(manifest)
    }

    /// Built-in asset set used when no usable manifest is on disk.
    pub fn builtin() -> Self {
        Manifest::new(vec![
            AssetSpec::bundle(
                "bootstrap_icons",
                "https://github.com/twbs/icons/releases/download/v1.11.3/bootstrap-icons-1.11.3.zip",
            ),
            AssetSpec::bundle(
                "bootstrap",
                "https://github.com/twbs/bootstrap/releases/download/v5.3.3/bootstrap-5.3.3-dist.zip",
            ),
            AssetSpec {
                keep_extension: true,
                ..AssetSpec::file("jquery", "https://code.jquery.com/jquery-3.6.4.min.js")
            },
            AssetSpec::bundle(
                "enigmarimu",
                "https://rimueirnarn.github.io/package-snapshot/enigmarimu.js.zip",
            ),
            AssetSpec::file(
                "chart.min.js",
                "https://cdnjs.cloudflare.com/ajax/libs/Chart.js/4.4.1/chart.umd.js",
            ),
            AssetSpec::file(
                "chart.umd.js.map",
                "https://cdnjs.cloudflare.com/ajax/libs/Chart.js/4.4.1/chart.umd.js.map",
            ),
            AssetSpec::file(
                "countries.data.json",
                "https://restcountries.com/v3.1/all?fields=name,currencies",
            ),
        ])
    }
}

fn parse_rule(name: &str, rule: &Value) -> Result<AssetSpec, String> {
    match rule {
        Value::String(url) => Ok(AssetSpec::file(name, url)),
        Value::Array(items) => {
            let url = items
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| format!("{name}: first element must be a URL string"))?;
            let kind = match items.get(1) {
                None => AssetKind::File,
                Some(Value::String(kind)) => AssetKind::parse(kind)
                    .ok_or_else(|| format!("{name}: unknown install kind {kind:?}"))?,
                Some(other) => return Err(format!("{name}: install kind must be a string, got {other}")),
            };
            let keep_extension = match items.get(2) {
                None => false,
                Some(Value::Bool(keep)) => *keep,
                Some(other) => {
                    return Err(format!("{name}: keep_extension must be a bool, got {other}"));
                }
            };
            Ok(AssetSpec {
                name: name.to_owned(),
                source_url: url.to_owned(),
                kind,
                keep_extension,
            })
        }
        other => Err(format!("{name}: unsupported rule {other}")),
    }
}

/// Reads the manifest from disk, silently substituting the built-in set.
#[derive(Clone, Debug)]
pub struct ManifestLoader {
    path: PathBuf,
}

impl ManifestLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Manifest {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(
                    "manifest: {} unavailable ({err}); using built-in assets",
                    self.path.display()
                );
                return Manifest::builtin();
            }
        };
        match Manifest::parse(&raw) {
            Ok(manifest) => {
                debug!(
                    "manifest: loaded {} entries from {}",
                    manifest.len(),
                    self.path.display()
                );
                manifest
            }
            Err(err) => {
                warn!("manifest: {err}; using built-in assets");
                Manifest::builtin()
            }
        }
    }

    /// Copy a user-supplied manifest over the one in the config directory.
    pub fn seed_from(&self, source: &Path) -> Result<(), String> {
        let raw = fs::read(source)
            .map_err(|e| format!("failed to read manifest {}: {e}", source.display()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create config dir: {e}"))?;
        }
        fs::write(&self.path, raw)
            .map_err(|e| format!("failed to write manifest {}: {e}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(manifest: &Manifest) -> Vec<&str> {
        manifest.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn parses_bare_urls_and_tuples_in_declaration_order() {
        let manifest = Manifest::parse(
            r#"{
                "zeta": "https://example.test/z.js",
                "libB": ["https://example.test/b.zip", "folder"],
                "jquery": ["https://example.test/jquery.min.js", "file", true]
            }"#,
        )
        .unwrap();

        assert_eq!(names(&manifest), ["zeta", "libB", "jquery"]);
        assert_eq!(manifest.get("zeta"), Some(&AssetSpec::file("zeta", "https://example.test/z.js")));
        assert_eq!(manifest.get("libB").unwrap().kind, AssetKind::Bundle);
        assert!(!manifest.get("libB").unwrap().keep_extension);
        assert!(manifest.get("jquery").unwrap().keep_extension);
    }

    #[test]
    fn computes_on_disk_suffix() {
        let plain = AssetSpec::file("libA", "https://example.test/a.js");
        assert_eq!(plain.file_name(), "libA");

        let kept = AssetSpec {
            keep_extension: true,
            ..plain.clone()
        };
        assert_eq!(kept.file_name(), "libA.js");

        let bundle = AssetSpec::bundle("libB", "https://example.test/b.zip");
        assert_eq!(bundle.file_name(), "libB.zip");

        let no_ext = AssetSpec {
            keep_extension: true,
            ..AssetSpec::file("countries", "https://example.test/v3/all?fields=name")
        };
        assert_eq!(no_ext.file_name(), "countries");
    }

    #[test]
    fn rejects_malformed_documents() {
        for raw in [
            r#"["https://example.test/a.js"]"#,
            r#"{"libA": "https://example.test/a.js""#,
            r#"{"libA": 42}"#,
            r#"{"libA": ["https://example.test/a.zip", "archive"]}"#,
            r#"{"libA": ["https://example.test/a.js", "file", "yes"]}"#,
            r#"{"libA": []}"#,
        ] {
            assert!(Manifest::parse(raw).is_err(), "accepted {raw}");
        }
    }

    #[test]
    fn loader_falls_back_to_builtin_set() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("webui_dependencies.json");

        assert_eq!(ManifestLoader::new(&path).load(), Manifest::builtin());

        fs::write(&path, r#"["not", "an", "object"]"#).unwrap();
        assert_eq!(ManifestLoader::new(&path).load(), Manifest::builtin());

        fs::write(&path, r#"{"libA": "https://exam"#).unwrap();
        assert_eq!(ManifestLoader::new(&path).load(), Manifest::builtin());
    }

    #[test]
    fn loader_reads_valid_manifest_and_seeds_from_source() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("webui_dependencies.json");
        fs::write(&source, r#"{"libA": "https://example.test/a.js"}"#).unwrap();

        let loader = ManifestLoader::new(tmp.path().join("cfg").join("webui_dependencies.json"));
        loader.seed_from(&source).unwrap();
        let manifest = loader.load();
        assert_eq!(names(&manifest), ["libA"]);
    }

    #[test]
    fn builtin_set_covers_known_ui_assets() {
        let builtin = Manifest::builtin();
        assert_eq!(builtin.len(), 7);
        assert_eq!(builtin.get("bootstrap").unwrap().kind, AssetKind::Bundle);
        assert_eq!(builtin.get("jquery").unwrap().file_name(), "jquery.js");
        assert_eq!(builtin.get("chart.min.js").unwrap().file_name(), "chart.min.js");
    }
}
