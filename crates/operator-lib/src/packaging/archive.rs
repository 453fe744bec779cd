//! Gzip-compressed tar archives

use super::manifest::{Manifest, MANIFEST_FILE};
use crate::error::{PackagingError, PackagingStep};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One archive member: the name inside the archive and its source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub source: PathBuf,
}

impl Member {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

fn append<W: io::Write>(builder: &mut tar::Builder<W>, member: &Member) -> io::Result<()> {
    debug!(file = %member.source.display(), name = %member.name, "Adding file to archive");
    let mut file = File::open(&member.source)?;
    let metadata = file.metadata()?;
    let mut header = tar::Header::new_gnu();
    header.set_metadata(&metadata);
    builder.append_data(&mut header, &member.name, &mut file)
}

/// Write `members` into a new archive at `path`
pub fn write_archive(path: &Path, members: &[Member]) -> Result<(), PackagingError> {
    info!(archive = %path.display(), members = members.len(), "Generating tar.gz");
    let archive_err = |e: io::Error| PackagingError::io(PackagingStep::Archive, path, e);

    let file = File::create(path).map_err(archive_err)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for member in members {
        append(&mut builder, member)
            .map_err(|e| PackagingError::io(PackagingStep::Archive, &member.source, e))?;
    }
    let file = builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(archive_err)?;
    file.sync_all().map_err(archive_err)
}

/// Member names of an archive, in archive order
pub fn list_members(path: &Path) -> Result<Vec<String>, PackagingError> {
    let inspect_err = |e: io::Error| PackagingError::io(PackagingStep::Inspect, path, e);
    let file = File::open(path).map_err(inspect_err)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut names = Vec::new();
    for entry in archive.entries().map_err(inspect_err)? {
        let entry = entry.map_err(inspect_err)?;
        let name = entry.path().map_err(inspect_err)?;
        names.push(name.to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Decode the manifest stored in an archive
pub fn read_manifest(path: &Path) -> Result<Manifest, PackagingError> {
    let inspect_err = |e: io::Error| PackagingError::io(PackagingStep::Inspect, path, e);
    let file = File::open(path).map_err(inspect_err)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    for entry in archive.entries().map_err(inspect_err)? {
        let entry = entry.map_err(inspect_err)?;
        let is_manifest = entry.path().map_err(inspect_err)?.as_os_str() == MANIFEST_FILE;
        if is_manifest {
            return serde_json::from_reader(entry).map_err(|e| inspect_err(e.into()));
        }
    }
    Err(PackagingError::MissingManifest {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::OperatorStatus;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_members_keep_name_and_content() {
        let tmp = TempDir::new().unwrap();
        let csv = tmp.path().join("staged.csv");
        fs::write(&csv, "a,b\n1,2\n").unwrap();
        let archive = tmp.path().join("out.tar.gz");

        write_archive(&archive, &[Member::new("u_openshift_usage_report.0.csv", &csv)]).unwrap();

        let mut reader = tar::Archive::new(GzDecoder::new(File::open(&archive).unwrap()));
        let mut entry = reader.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.header().size().unwrap(), 8);
        assert_eq!(
            entry.path().unwrap().to_str().unwrap(),
            "u_openshift_usage_report.0.csv"
        );
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "a,b\n1,2\n");
    }

    #[test]
    fn test_read_manifest_from_archive() {
        let tmp = TempDir::new().unwrap();
        let manifest = Manifest::new("u", &OperatorStatus::new("c", "v"), &[], None);
        let manifest_path = tmp.path().join(MANIFEST_FILE);
        manifest.render(&manifest_path).unwrap();
        let archive = tmp.path().join("out.tar.gz");

        write_archive(&archive, &[Member::new(MANIFEST_FILE, &manifest_path)]).unwrap();

        assert_eq!(read_manifest(&archive).unwrap(), manifest);
        assert_eq!(list_members(&archive).unwrap(), vec![MANIFEST_FILE]);
    }

    #[test]
    fn test_archive_without_manifest() {
        let tmp = TempDir::new().unwrap();
        let csv = tmp.path().join("staged.csv");
        fs::write(&csv, "a\n").unwrap();
        let archive = tmp.path().join("out.tar.gz");
        write_archive(&archive, &[Member::new("report.csv", &csv)]).unwrap();

        let err = read_manifest(&archive).unwrap_err();
        assert!(matches!(err, PackagingError::MissingManifest { .. }));
    }
}
