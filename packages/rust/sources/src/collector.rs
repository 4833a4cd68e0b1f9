//! Source collection into an isolated staging area.
//!
//! Documentation sources are copied out of a repository checkout so the
//! compiler only ever sees the files we chose, under the same relative paths.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use repodocs_shared::{RepoDocsError, Result};

/// Original source path → staged copy, for one repository.
#[derive(Debug, Clone, Default)]
pub struct StagedFileMap {
    source_root: PathBuf,
    staging_root: PathBuf,
    forward: BTreeMap<PathBuf, PathBuf>,
    reverse: HashMap<PathBuf, PathBuf>,
}

impl StagedFileMap {
    fn new(source_root: &Path, staging_root: &Path) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            staging_root: staging_root.to_path_buf(),
            ..Self::default()
        }
    }

    fn insert(&mut self, original: PathBuf, staged: PathBuf) {
        self.reverse.insert(staged.clone(), original.clone());
        self.forward.insert(original, staged);
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Staged copy of an original source file.
    pub fn staged(&self, original: &Path) -> Option<&Path> {
        self.forward.get(original).map(PathBuf::as_path)
    }

    /// Original source file behind a staged copy.
    pub fn original(&self, staged: &Path) -> Option<&Path> {
        self.reverse.get(staged).map(PathBuf::as_path)
    }

    /// Path of the original relative to the sources root, `/`-separated.
    pub fn source_relative(&self, staged: &Path) -> Option<String> {
        let original = self.original(staged)?;
        let rel = original.strip_prefix(&self.source_root).ok()?;
        Some(to_slash(rel))
    }

    /// Pairs in original-path order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.forward
            .iter()
            .map(|(o, s)| (o.as_path(), s.as_path()))
    }
}

/// Copy every file under `source_root` with the given extension into
/// `staging_root`, keeping relative paths.
///
/// Any previous staging tree is removed first. When nothing matches, no
/// staging directory is created and the returned map is empty.
#[instrument(skip_all, fields(source_root = %source_root.display(), extension))]
pub fn collect_sources(
    source_root: &Path,
    staging_root: &Path,
    extension: &str,
) -> Result<StagedFileMap> {
    remove_dir_if_exists(staging_root)?;

    let mut map = StagedFileMap::new(source_root, staging_root);

    if !source_root.is_dir() {
        debug!("source root missing, nothing to stage");
        return Ok(map);
    }

    for entry in WalkDir::new(source_root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source_root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            RepoDocsError::io(path, source)
        })?;

        if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(source_root)
            .map_err(|e| RepoDocsError::validation(format!("{}: {e}", entry.path().display())))?;
        let staged = staging_root.join(rel);

        if let Some(parent) = staged.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RepoDocsError::io(parent, e))?;
        }
        copy_preserving_mtime(entry.path(), &staged)?;

        debug!(file = %rel.display(), "staged source");
        map.insert(entry.path().to_path_buf(), staged);
    }

    info!(files = map.len(), "sources collected");
    Ok(map)
}

/// Copy contents and permissions, then carry over the modification time.
fn copy_preserving_mtime(from: &Path, to: &Path) -> Result<()> {
    std::fs::copy(from, to).map_err(|e| RepoDocsError::io(from, e))?;

    let modified = std::fs::metadata(from)
        .and_then(|meta| meta.modified())
        .map_err(|e| RepoDocsError::io(from, e))?;
    std::fs::File::options()
        .write(true)
        .open(to)
        .and_then(|file| file.set_modified(modified))
        .map_err(|e| RepoDocsError::io(to, e))?;
    Ok(())
}

/// Remove a directory tree, ignoring one that does not exist.
pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(path = %dir.display(), "removed stale directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RepoDocsError::io(dir, e)),
    }
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Render a relative path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
