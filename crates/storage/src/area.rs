use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::archive::{parse_version, split_name, versioned_name};
use crate::{StorageError, validate_name};

/// Name of the version-history subarea inside the file area.
pub const VERSION_DIR: &str = "versions";

/// The server's file area: a flat directory of current files plus a
/// `versions/` subdirectory holding archived prior revisions.
///
/// The area is exclusively owned by the server; sessions reach it through a
/// shared reference.
pub struct FileArea {
    root: PathBuf,
    versions: PathBuf,
    /// Serializes collision-detect, archive, and target creation so two
    /// concurrent uploads of the same name cannot interleave archive steps.
    upload_lock: Mutex<()>,
}

impl FileArea {
    /// Opens the area rooted at `root`, creating it and the version
    /// subdirectory as needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let versions = root.join(VERSION_DIR);
        std::fs::create_dir_all(&versions)?;
        Ok(Self {
            root,
            versions,
            upload_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerates current filenames, version history excluded, sorted.
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Returns the path of a current file for download.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(path)
    }

    /// Prepares the destination for an upload of `name`.
    ///
    /// If `name` already denotes a current file, the existing file is moved
    /// into the version subarea as `base_v{v}{ext}` and the new upload
    /// becomes current under `base_v{v+1}{ext}`; otherwise the upload is
    /// stored under `name` itself. The whole decision runs under one lock,
    /// and the target file is created (empty) before the lock is released so
    /// concurrent uploads always get distinct targets.
    ///
    /// Version numbers per base/extension are strictly increasing and never
    /// reused, even when intermediate archives have been deleted.
    pub async fn begin_upload(
        &self,
        name: &str,
    ) -> Result<(PathBuf, tokio::fs::File), StorageError> {
        validate_name(name)?;
        let _guard = self.upload_lock.lock().await;

        let current = self.root.join(name);
        let target = if current.exists() {
            let (base, ext) = split_name(name);
            let version = self.next_version(base, ext)?;
            let archived = self.versions.join(versioned_name(base, ext, version));
            std::fs::rename(&current, &archived)?;
            tracing::info!(
                %name,
                archived = %archived.display(),
                "archived previous revision"
            );
            self.root.join(versioned_name(base, ext, version + 1))
        } else {
            current
        };

        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&target)?;
        Ok((target, tokio::fs::File::from_std(file)))
    }

    /// Lowest version number greater than every one ever used for
    /// `base`/`ext`, scanning both the version subarea and the current area
    /// (the current file itself may carry a version suffix).
    fn next_version(&self, base: &str, ext: &str) -> Result<u32, StorageError> {
        let mut max = 0;
        for dir in [&self.versions, &self.root] {
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if let Some(v) = parse_version(&file_name, base, ext) {
                    max = max.max(v);
                }
            }
        }
        Ok(max + 1)
    }
}
