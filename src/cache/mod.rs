use std::collections::HashSet;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

/// Staging entries that survive a cache clear.
pub const DEFAULT_EXCLUSIONS: [&str; 2] = ["README.md", "profile"];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
    pub reclaimed_bytes: u64,
}

impl ClearReport {
    /// One numbered line per entry actually removed.
    pub fn notices(&self) -> Vec<String> {
        self.removed
            .iter()
            .enumerate()
            .map(|(index, name)| removal_notice(index + 1, name))
            .collect()
    }
}

fn removal_notice(ordinal: usize, name: &str) -> String {
    format!("{ordinal:0>2} {name} is removed from cache")
}

#[derive(Clone, Debug)]
pub struct CacheJanitor {
    staging_dir: PathBuf,
}

impl CacheJanitor {
    pub fn new(staging_dir: impl AsRef<Path>) -> Self {
        Self {
            staging_dir: staging_dir.as_ref().to_path_buf(),
        }
    }

    pub fn default_exclusions() -> HashSet<String> {
        DEFAULT_EXCLUSIONS.iter().map(|s| (*s).to_owned()).collect()
    }

    /// Remove every staging entry whose name is not in `exclusions`.
    pub fn clear(&self, exclusions: &HashSet<String>) -> Result<ClearReport, String> {
        let mut names = match fs::read_dir(&self.staging_dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|name| !exclusions.contains(name))
                .collect::<Vec<_>>(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("cache: {} absent, nothing to clear", self.staging_dir.display());
                return Ok(ClearReport::default());
            }
            Err(err) => return Err(format!("failed to list cache: {err}")),
        };
        names.sort();
        Ok(self.remove_entries(names, remove_entry))
    }

    fn remove_entries(
        &self,
        names: Vec<String>,
        mut remove: impl FnMut(&Path) -> io::Result<()>,
    ) -> ClearReport {
        let mut report = ClearReport::default();
        for name in names {
            let path = self.staging_dir.join(&name);
            let size = disk_usage(&path);
            match remove(&path) {
                Ok(()) => report.reclaimed_bytes += size,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    warn!("cache: failed to remove {name}: {err}");
                    report.failed.push(name);
                    continue;
                }
            }
            debug!("{}", removal_notice(report.removed.len() + 1, &name));
            report.removed.push(name);
        }
        report
    }
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn disk_usage(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_everything_except_exclusions() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path();
        fs::write(staging.join("README.md"), b"keep").unwrap();
        fs::create_dir_all(staging.join("profile")).unwrap();
        fs::write(staging.join("libA"), b"12345").unwrap();
        fs::create_dir_all(staging.join("leftover/nested")).unwrap();
        fs::write(staging.join("leftover/nested/x.bin"), b"123").unwrap();

        let report = CacheJanitor::new(staging)
            .clear(&CacheJanitor::default_exclusions())
            .unwrap();

        assert_eq!(report.removed, ["leftover", "libA"]);
        assert_eq!(report.reclaimed_bytes, 8);
        assert!(staging.join("README.md").exists());
        assert!(staging.join("profile").is_dir());
        assert!(!staging.join("libA").exists());
        assert!(!staging.join("leftover").exists());
    }

    #[test]
    fn missing_staging_dir_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let report = CacheJanitor::new(tmp.path().join("temp"))
            .clear(&HashSet::new())
            .unwrap();
        assert_eq!(report, ClearReport::default());
    }

    #[test]
    fn failed_removal_leaves_no_gap_in_numbering() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path();
        for name in ["a", "b", "c"] {
            fs::write(staging.join(name), name).unwrap();
        }

        let janitor = CacheJanitor::new(staging);
        let names = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        let report = janitor.remove_entries(names, |path| {
            if path.ends_with("b") {
                Err(io::Error::new(ErrorKind::PermissionDenied, "locked"))
            } else {
                remove_entry(path)
            }
        });

        assert_eq!(report.removed, ["a", "c"]);
        assert_eq!(report.failed, ["b"]);
        assert_eq!(report.reclaimed_bytes, 2);
        assert_eq!(
            report.notices(),
            ["01 a is removed from cache", "02 c is removed from cache"]
        );
        assert!(staging.join("b").exists());
    }
}
