use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use log::{info, warn};
use tar::Archive;
use zip::read::ZipArchive;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

pub fn guess_archive_kind(file_name: &str) -> Option<ArchiveKind> {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".zip") {
        Some(ArchiveKind::Zip)
    } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        Some(ArchiveKind::TarGz)
    } else {
        None
    }
}

/// Extract every member of `archive_path` beneath `dest`.
pub fn extract_archive(archive_path: &Path, dest: &Path, kind: ArchiveKind) -> Result<(), String> {
    info!("extracting {} as {:?}", archive_path.display(), kind);
    fs::create_dir_all(dest).map_err(|e| format!("unable to create target dir: {e}"))?;
    match kind {
        ArchiveKind::TarGz => extract_targz(archive_path, dest),
        ArchiveKind::Zip => extract_zip(archive_path, dest),
    }
}

fn extract_targz(archive_path: &Path, dest: &Path) -> Result<(), String> {
    let file = fs::File::open(archive_path).map_err(|e| format!("tar.gz open error: {e}"))?;
    let dec = GzDecoder::new(file);
    let mut archive = Archive::new(dec);
    archive
        .unpack(dest)
        .map_err(|e| format!("tar.gz extract error: {e}"))
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), String> {
    let file = fs::File::open(archive_path).map_err(|e| format!("zip open error: {e}"))?;
    let mut archive = ZipArchive::new(file).map_err(|e| format!("zip parse error: {e}"))?;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("zip entry error: {e}"))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("zip: skipping unsafe member path {}", entry.name());
            continue;
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| format!("zip dir create error: {e}"))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("zip parent dir error: {e}"))?;
        }
        let mut out_file =
            fs::File::create(&out_path).map_err(|e| format!("zip create file error: {e}"))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| format!("zip write error: {e}"))?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fixtures::{targz_bytes, zip_bytes};
    use super::*;

    #[test]
    fn guesses_archive_kind_from_name() {
        assert_eq!(guess_archive_kind("b.zip"), Some(ArchiveKind::Zip));
        assert_eq!(guess_archive_kind("B.ZIP"), Some(ArchiveKind::Zip));
        assert_eq!(guess_archive_kind("b.tar.gz"), Some(ArchiveKind::TarGz));
        assert_eq!(guess_archive_kind("b.tgz"), Some(ArchiveKind::TarGz));
        assert_eq!(guess_archive_kind("b.js"), None);
    }

    #[test]
    fn extracts_zip_members_with_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("b.zip");
        fs::write(
            &archive,
            zip_bytes(&[("dist/css/b.css", b"body{}"), ("dist/js/b.js", b"1;")]),
        )
        .unwrap();

        let dest = tmp.path().join("out");
        extract_archive(&archive, &dest, ArchiveKind::Zip).unwrap();
        assert_eq!(fs::read(dest.join("dist/css/b.css")).unwrap(), b"body{}");
        assert_eq!(fs::read(dest.join("dist/js/b.js")).unwrap(), b"1;");
    }

    #[test]
    fn extracts_tar_gz_members() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("b.tar.gz");
        fs::write(&archive, targz_bytes(&[("pkg/readme.txt", b"hello")])).unwrap();

        let dest = tmp.path().join("out");
        extract_archive(&archive, &dest, ArchiveKind::TarGz).unwrap();
        assert_eq!(fs::read(dest.join("pkg/readme.txt")).unwrap(), b"hello");
    }

    #[test]
    fn rejects_non_archive_content() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("b.zip");
        fs::write(&archive, b"<html>not found</html>").unwrap();
        assert!(extract_archive(&archive, tmp.path(), ArchiveKind::Zip).is_err());
    }
}
