use crate::utils::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SCRATCH_PREFIX: &str = "vsdx-";
pub const SCRATCH_SUFFIX: &str = ".vsdx";

/// An upload as handed over by the UI layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "diagram.vsdx".to_string());
        Ok(Self { name, bytes })
    }
}

/// A temporary `.vsdx` file that is removed when dropped, whatever the
/// exit path.
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    /// An empty scratch file, e.g. as a save target.
    pub fn create(dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX).suffix(SCRATCH_SUFFIX);
        let file = match dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        Ok(Self { file })
    }

    pub fn with_contents(bytes: &[u8], dir: Option<&Path>) -> Result<Self> {
        let mut scratch = Self::create(dir)?;
        scratch.file.write_all(bytes)?;
        scratch.file.flush()?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.file.path())?)
    }
}

/// Copies an upload to a scratch file so it can be opened by path.
pub fn intake(upload: &UploadedFile, scratch_dir: Option<&Path>) -> Result<ScratchFile> {
    let scratch = ScratchFile::with_contents(&upload.bytes, scratch_dir)?;
    tracing::debug!(
        file = %upload.name,
        bytes = upload.bytes.len(),
        scratch = %scratch.path().display(),
        "Upload copied to scratch file"
    );
    Ok(scratch)
}

/// Lists leftover scratch files in `dir` (ours only, by prefix and suffix).
pub fn scratch_files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(SCRATCH_PREFIX) && n.ends_with(SCRATCH_SUFFIX))
                    .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_file_has_fixed_suffix_and_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let upload = UploadedFile::new("network.vsdx", b"PK\x03\x04 bytes".to_vec());

        let scratch = intake(&upload, Some(dir.path())).unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with(".vsdx"));
        assert_eq!(scratch.read().unwrap(), upload.bytes);
        assert_eq!(scratch_files_in(dir.path()), vec![path.clone()]);

        drop(scratch);
        assert!(!path.exists());
        assert!(scratch_files_in(dir.path()).is_empty());
    }

    #[test]
    fn scratch_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = ScratchFile::create(Some(dir.path())).unwrap();
        let b = ScratchFile::create(Some(dir.path())).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn foreign_files_are_not_listed_as_scratch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.vsdx"), b"x").unwrap();
        std::fs::write(dir.path().join("vsdx-notes.txt"), b"x").unwrap();
        assert!(scratch_files_in(dir.path()).is_empty());
    }

    #[test]
    fn uploads_read_from_disk_keep_their_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Floor plan.vsdx");
        std::fs::write(&path, b"data").unwrap();
        let upload = UploadedFile::from_path(&path).unwrap();
        assert_eq!(upload.name, "Floor plan.vsdx");
        assert_eq!(upload.bytes, b"data");
    }
}
