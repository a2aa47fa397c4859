//! Working directory layout.
//!
//! ```text
//! <workdir>/
//! ├── master/
//! │   ├── master0.mp4      fragment of work item 0
//! │   ├── master1.mp4
//! │   ├── list.txt         concat manifest
//! │   └── .render.lock     held while a render runs
//! ├── masterOutput.mp4     default master output
//! └── <name>.mp4           compliant conversions
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use easycut_common::error::{EasycutError, EasycutResult};
use easycut_project_model::Scheme;

pub const MASTER_DIR: &str = "master";
pub const MANIFEST_FILE: &str = "list.txt";
pub const DEFAULT_OUTPUT_NAME: &str = "masterOutput";
const LOCK_FILE: &str = ".render.lock";
const IMPORT_DIR: &str = "videos";

/// A render working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workdir {
    root: PathBuf,
}

impl Workdir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the workdir and its `master/` directory if missing.
    pub fn ensure(root: impl Into<PathBuf>) -> EasycutResult<Self> {
        let workdir = Self::new(root);
        workdir.ensure_master_dir()?;
        Ok(workdir)
    }

    pub fn ensure_master_dir(&self) -> EasycutResult<()> {
        std::fs::create_dir_all(self.master_dir()).map_err(|e| {
            EasycutError::config(format!(
                "Cannot create working directory {}: {e}",
                self.master_dir().display()
            ))
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn master_dir(&self) -> PathBuf {
        self.root.join(MASTER_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.master_dir().join(MANIFEST_FILE)
    }

    /// Fragment path for the work item at `index`; depends only on the
    /// index and the scheme's container.
    pub fn fragment_path(&self, index: usize, scheme: &Scheme) -> PathBuf {
        self.master_dir().join(scheme.fragment_name(index))
    }

    /// Master output base path (extension added by the scheme).
    pub fn default_output_base(&self) -> PathBuf {
        self.root.join(DEFAULT_OUTPUT_NAME)
    }

    /// Path of a compliant conversion named `name`.
    pub fn conversion_path(&self, name: &str, scheme: &Scheme) -> PathBuf {
        self.root.join(format!("{name}{}", scheme.file_suffix()))
    }

    fn lock_path(&self) -> PathBuf {
        self.master_dir().join(LOCK_FILE)
    }

    /// Take the render lock for this workdir.
    ///
    /// Fails with a precondition error when another render (in this or
    /// another process) holds it.
    pub fn lock(&self) -> EasycutResult<WorkdirLock> {
        self.ensure_master_dir()?;
        let path = self.lock_path();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path).unwrap_or_default();
                return Err(EasycutError::precondition(format!(
                    "Working directory {} is locked by another render (pid {})",
                    self.root.display(),
                    holder.trim()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let lock = WorkdirLock { path };
        write!(file, "{}", std::process::id())?;
        tracing::debug!(lock = %lock.path.display(), "Acquired workdir lock");
        Ok(lock)
    }

    /// Delete every `master<index>.<ext>` fragment left by earlier renders.
    /// The manifest and the lock file are kept. Returns how many files were
    /// removed.
    pub fn clear_fragments(&self) -> EasycutResult<usize> {
        let entries = match std::fs::read_dir(self.master_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_fragment_file(&path) {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, master = %self.master_dir().display(), "Cleared old fragments");
        }
        Ok(removed)
    }

    /// Remove a lock left behind by a render that did not exit cleanly.
    /// Returns whether a lock file was present.
    pub fn clear_stale_lock(&self) -> EasycutResult<bool> {
        match std::fs::remove_file(self.lock_path()) {
            Ok(()) => {
                tracing::warn!(workdir = %self.root.display(), "Removed stale render lock");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_fragment_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("master"))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

/// Exclusive render lock on a workdir, released on drop.
#[derive(Debug)]
pub struct WorkdirLock {
    path: PathBuf,
}

impl Drop for WorkdirLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), "Failed to release workdir lock: {e}");
        }
    }
}

/// Copy `original` into the `videos/` directory next to `project_file`.
///
/// The copy is named `<stem>_<unix millis><ext>` so repeated imports of
/// the same file never collide.
pub async fn import_media(original: &Path, project_file: &Path) -> EasycutResult<PathBuf> {
    if !original.is_file() {
        return Err(EasycutError::FileNotFound {
            path: original.to_path_buf(),
        });
    }
    let project_dir = project_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let videos_dir = project_dir.join(IMPORT_DIR);
    tokio::fs::create_dir_all(&videos_dir).await?;

    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string());
    let ext = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let millis = chrono::Utc::now().timestamp_millis();
    let target = videos_dir.join(format!("{stem}_{millis}{ext}"));

    tokio::fs::copy(original, &target).await?;
    tracing::info!(
        from = %original.display(),
        to = %target.display(),
        "Imported media into project"
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use easycut_common::error::ErrorKind;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("easycut_test_workdir_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_layout_paths() {
        let workdir = Workdir::new("/wd");
        let scheme = Scheme {
            format: "mkv".to_string(),
            ..Scheme::default()
        };
        assert_eq!(workdir.fragment_path(2, &scheme), PathBuf::from("/wd/master/master2.mkv"));
        assert_eq!(workdir.manifest_path(), PathBuf::from("/wd/master/list.txt"));
        assert_eq!(workdir.default_output_base(), PathBuf::from("/wd/masterOutput"));
        assert_eq!(
            workdir.conversion_path("clip", &scheme),
            PathBuf::from("/wd/clip.mkv")
        );
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let workdir = Workdir::ensure(temp_root("lock")).unwrap();

        let lock = workdir.lock().unwrap();
        let err = workdir.lock().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);

        drop(lock);
        let relock = workdir.lock();
        assert!(relock.is_ok());
        drop(relock);

        std::fs::remove_dir_all(workdir.root()).ok();
    }

    #[test]
    fn test_clear_fragments_keeps_manifest_and_lock() {
        let workdir = Workdir::ensure(temp_root("clear_fragments")).unwrap();
        let lock = workdir.lock().unwrap();
        for name in ["master0.mp4", "master1.mp4", "master12.mkv", "list.txt", "masterplan.txt"] {
            std::fs::write(workdir.master_dir().join(name), b"x").unwrap();
        }

        assert_eq!(workdir.clear_fragments().unwrap(), 3);

        let mut left: Vec<String> = std::fs::read_dir(workdir.master_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec![".render.lock", "list.txt", "masterplan.txt"]);

        drop(lock);
        std::fs::remove_dir_all(workdir.root()).ok();
    }

    #[test]
    fn test_clear_stale_lock() {
        let workdir = Workdir::ensure(temp_root("stale")).unwrap();
        let lock = workdir.lock().unwrap();
        std::mem::forget(lock);

        assert!(workdir.clear_stale_lock().unwrap());
        assert!(!workdir.clear_stale_lock().unwrap());
        assert!(workdir.lock().is_ok());

        std::fs::remove_dir_all(workdir.root()).ok();
    }

    #[tokio::test]
    async fn test_import_media_copies_with_timestamped_name() {
        let root = temp_root("import");
        std::fs::create_dir_all(&root).unwrap();
        let original = root.join("holiday clip.mov");
        std::fs::write(&original, b"media").unwrap();
        let project_file = root.join("project").join("edit.json");

        let copied = import_media(&original, &project_file).await.unwrap();
        assert_eq!(copied.parent().unwrap(), root.join("project").join("videos"));
        let name = copied.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("holiday clip_"));
        assert!(name.ends_with(".mov"));
        assert_eq!(std::fs::read(&copied).unwrap(), b"media");

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_import_missing_media() {
        let err = import_media(Path::new("/nonexistent/a.mov"), Path::new("/tmp/p.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, EasycutError::FileNotFound { .. }));
    }
}
