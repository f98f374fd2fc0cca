use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};

use crate::env::AppPaths;
use crate::integrity;
use crate::manifest::{AssetKind, AssetSpec, Manifest};
use crate::networking::AssetSource;
use crate::storage::{InstalledRecord, Metadata, MetadataStore};
use crate::util::url_file_name;

pub mod archive;
pub mod status;

use archive::{ArchiveKind, extract_archive, guess_archive_kind};

/// Result of one synchronization run. Every list is in manifest order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub installed: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl SyncReport {
    pub fn is_unchanged(&self) -> bool {
        self.installed.is_empty() && self.updated.is_empty()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.installed.is_empty() {
            lines.push(format!("-> Installed: {}", self.installed.join(" ")));
        }
        if !self.updated.is_empty() {
            lines.push(format!("-> Updated: {}", self.updated.join(" ")));
        }
        if !self.failed.is_empty() {
            let names: Vec<&str> = self.failed.iter().map(|(name, _)| name.as_str()).collect();
            lines.push(format!("-> Failed: {}", names.join(" ")));
        }
        if self.is_unchanged() {
            lines.push("-> No updates available".into());
        }
        lines
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Skipped,
    Installed,
    Updated,
}

/// Fetches, verifies and installs every manifest entry, one at a time.
pub struct InstallPipeline<S> {
    source: S,
    paths: AppPaths,
    show_progress: bool,
}

impl<S: AssetSource> InstallPipeline<S> {
    pub fn new(source: S, paths: AppPaths) -> Self {
        Self {
            source,
            paths,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Load metadata, process the manifest, then persist metadata once.
    pub async fn synchronize(&self, manifest: &Manifest, force: bool) -> Result<SyncReport, String> {
        self.paths
            .ensure_dirs()
            .map_err(|e| format!("unable to create install directories: {e}"))?;
        let store = MetadataStore::new(&self.paths.metadata_path);
        let mut metadata = store.load()?;
        debug!(
            "loaded {} records from {}",
            metadata.len(),
            store.path().display()
        );

        info!("-> Installing/updating webui dependencies");
        let report = self.run(manifest, &mut metadata, force).await;
        store.save(&metadata)?;
        Ok(report)
    }

    /// Process every entry against `metadata`, mutating it in place.
    ///
    /// A failing entry is logged and reported; its record is left as it was.
    pub async fn run(&self, manifest: &Manifest, metadata: &mut Metadata, force: bool) -> SyncReport {
        let mut report = SyncReport::default();
        for (index, spec) in manifest.iter().enumerate() {
            let ordinal = format!("{:0>2}", index + 1);
            match self.process(spec, metadata, force, &ordinal).await {
                Ok(Outcome::Skipped) => report.skipped.push(spec.name.clone()),
                Ok(Outcome::Installed) => report.installed.push(spec.name.clone()),
                Ok(Outcome::Updated) => report.updated.push(spec.name.clone()),
                Err(reason) => {
                    error!("  {ordinal} {} failed ({reason})", spec.name);
                    report.failed.push((spec.name.clone(), reason));
                }
            }
        }
        report
    }

    async fn process(
        &self,
        spec: &AssetSpec,
        metadata: &mut Metadata,
        force: bool,
        ordinal: &str,
    ) -> Result<Outcome, String> {
        let probe = self
            .source
            .probe(&spec.source_url)
            .await
            .map_err(|e| e.to_string())?;
        let file_name = spec.file_name();
        let staged = self.paths.staging_dir.join(&file_name);

        let previous = if force { None } else { metadata.get(&spec.name) };
        let outcome = match previous {
            Some(record) => {
                // A missing staged copy hashes to the recorded digest and still counts as unchanged.
                if probe.last_modified == record.last_modified_marker
                    && integrity::digest(&staged, &record.digest)? == record.digest
                {
                    info!("  {ordinal} {} is up-to-date. Skipping.", spec.name);
                    return Ok(Outcome::Skipped);
                }
                Outcome::Updated
            }
            None => Outcome::Installed,
        };

        info!(
            "  {ordinal} Downloading {} from {}...",
            spec.name, spec.source_url
        );
        let bar = self.progress_bar(&spec.name);
        let mut on_progress = {
            let bar = bar.clone();
            move |done: u64, total: Option<u64>| {
                if let Some(total) = total {
                    bar.set_length(total);
                }
                bar.set_position(done);
            }
        };
        let fetched = self
            .source
            .fetch(&spec.source_url, &staged, probe.content_length, &mut on_progress)
            .await;
        bar.finish_and_clear();
        let bytes = fetched.map_err(|e| e.to_string())?;
        debug!("{}: staged {} bytes at {}", spec.name, bytes, staged.display());

        self.install(spec, &staged, &file_name)?;

        let digest = integrity::digest(&staged, "")?;
        metadata.insert(
            spec.name.clone(),
            InstalledRecord {
                source_url: spec.source_url.clone(),
                last_modified_marker: probe.last_modified,
                digest,
            },
        );
        Ok(outcome)
    }

    fn install(&self, spec: &AssetSpec, staged: &Path, file_name: &str) -> Result<(), String> {
        let target = &self.paths.target_dir;
        let url_name = url_file_name(&spec.source_url).unwrap_or_default();
        let archive = guess_archive_kind(&url_name)
            .or_else(|| (spec.kind == AssetKind::Bundle).then_some(ArchiveKind::Zip));
        if let Some(kind) = archive {
            extract_archive(staged, target, kind)?;
            info!("         {} extracted to {}", spec.name, target.display());
        }
        if spec.kind == AssetKind::File {
            fs::copy(staged, target.join(file_name))
                .map_err(|e| format!("failed to copy {} into place: {e}", spec.name))?;
        }
        Ok(())
    }

    fn progress_bar(&self, name: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} ({bytes_per_sec})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix(format!("         {name}"));
        bar
    }
}
