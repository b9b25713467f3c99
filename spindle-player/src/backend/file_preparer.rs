//! Local file preparer
//!
//! Materializes a source file as a uniquely named copy in the temp folder so
//! the library can be edited (or unmounted) while an item is queued. The name
//! is sanitized to `[A-Za-z0-9._-]` and prefixed with a process-wide counter
//! so two preparations of the same file never collide.
//!
//! A hard link is tried first; a full copy is the fallback (different
//! filesystem, or a platform without links). The prepared file is read once
//! so the first seconds of playback come from the page cache.

use super::SourcePreparer;
use crate::error::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

pub struct FilePreparer {
    root_folder: PathBuf,
    temp_folder: PathBuf,
    counter: AtomicU64,
}

impl FilePreparer {
    pub fn new(root_folder: impl Into<PathBuf>, temp_folder: impl Into<PathBuf>) -> Self {
        Self {
            root_folder: root_folder.into(),
            temp_folder: temp_folder.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn temp_folder(&self) -> &Path {
        &self.temp_folder
    }

    /// Absolute references are used as-is, relative ones are resolved
    /// against the root folder
    pub fn resolve(&self, source_ref: &str) -> PathBuf {
        let path = Path::new(source_ref);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_folder.join(path)
        }
    }

    fn temp_name(&self, source: &Path) -> String {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{:03}-{}", count, sanitize_file_name(&file_name))
    }
}

/// Keep ASCII alphanumerics, '.', '-' and '_'
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

impl SourcePreparer for FilePreparer {
    fn prepare(&self, source_ref: &str) -> Result<String> {
        let source = self.resolve(source_ref);
        if !source.is_file() {
            return Err(Error::Preparation {
                source_ref: source_ref.to_string(),
                reason: format!("no such file: {}", source.display()),
            });
        }

        std::fs::create_dir_all(&self.temp_folder)?;
        let target = self.temp_folder.join(self.temp_name(&source));
        match std::fs::remove_file(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = std::fs::hard_link(&source, &target) {
            debug!("Hard link failed ({}), copying {}", e, source.display());
            std::fs::copy(&source, &target)?;
        }

        // Warm the cache
        let mut file = std::fs::File::open(&target)?;
        io::copy(&mut file, &mut io::sink())?;

        debug!("Prepared {} -> {}", source_ref, target.display());
        Ok(target.to_string_lossy().into_owned())
    }

    fn cleanup(&self, source_ref: &str, local_ref: &str) {
        if local_ref.is_empty() {
            return;
        }
        let path = Path::new(local_ref);
        // Never delete anything outside the temp folder
        if !path.starts_with(&self.temp_folder) {
            debug!("Not removing {} for {}: outside temp folder", local_ref, source_ref);
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed prepared file {}", local_ref),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove prepared file {}: {}", local_ref, e),
        }
    }
}
