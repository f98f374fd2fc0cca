use std::fmt;
use std::path::Path;

use crate::integrity;
use crate::manifest::{AssetSpec, Manifest};
use crate::storage::Metadata;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetState {
    /// Never installed.
    Missing,
    /// Staged copy matches the recorded digest.
    Ok,
    /// Staged copy differs from the recorded digest.
    Stale,
    /// Recorded, but the staged copy is gone.
    Unstaged,
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetState::Missing => "missing",
            AssetState::Ok => "ok",
            AssetState::Stale => "stale",
            AssetState::Unstaged => "unstaged",
        };
        f.pad(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusLine {
    pub spec: AssetSpec,
    pub state: AssetState,
    pub last_modified: Option<String>,
}

/// Offline comparison of the manifest against recorded state and the staging area.
pub fn collect(
    manifest: &Manifest,
    metadata: &Metadata,
    staging_dir: &Path,
) -> Result<Vec<StatusLine>, String> {
    manifest
        .iter()
        .map(|spec| -> Result<StatusLine, String> {
            let Some(record) = metadata.get(&spec.name) else {
                return Ok(StatusLine {
                    spec: spec.clone(),
                    state: AssetState::Missing,
                    last_modified: None,
                });
            };
            let staged = staging_dir.join(spec.file_name());
            let state = if !staged.exists() {
                AssetState::Unstaged
            } else if integrity::digest(&staged, "")? == record.digest {
                AssetState::Ok
            } else {
                AssetState::Stale
            };
            Ok(StatusLine {
                spec: spec.clone(),
                state,
                last_modified: record.last_modified_marker.clone(),
            })
        })
        .collect()
}
