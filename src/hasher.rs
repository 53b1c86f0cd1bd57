//! Recursive, content-addressable folder hashing.
//!
//! Every directory level is processed as a structured fan-out: one task per
//! surviving sibling, all joined before the parent's digest is composed. File
//! reads happen on the blocking pool and may be gated by an [`Executor`] to
//! bound how many files are open at once. Directory recursion never holds an
//! executor slot, so a small capacity cannot deadlock a deep tree.

use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::task::JoinSet;

use crate::core::Hash32;
use crate::error::HashError;
use crate::executor::Executor;
use crate::filter::{EntryKind, Filter, Selection};
use crate::tree::FolderHash;

type Pending<T> = Pin<Box<dyn Future<Output = Result<T, HashError>> + Send>>;

/// Hashes the folder at `root`.
///
/// The root node is named `label` when given, otherwise after the folder
/// itself. See [`FolderHasher`] for the details.
pub async fn hash_folder(
    root: impl AsRef<Utf8Path>,
    label: Option<&str>,
    filter: Option<Filter>,
) -> Result<FolderHash, HashError> {
    let mut hasher = FolderHasher::new();

    if let Some(label) = label {
        hasher = hasher.label(label);
    }

    if let Some(filter) = filter {
        hasher = hasher.filter(filter);
    }

    hasher.hash(root).await
}

/// Configurable folder hasher.
///
/// # Example
///
/// ```rust,no_run
/// # use dirsum::{Executor, Filter, FolderHasher};
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let tree = FolderHasher::new()
///     .label("project")
///     .filter(Filter::exclude_names([".git", "target"]))
///     .executor(Executor::new(16).unwrap())
///     .hash("./")
///     .await
///     .unwrap();
///
/// println!("{}", tree.hash);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct FolderHasher {
    label: Option<String>,
    filter: Option<Filter>,
    executor: Option<Executor>,
}

impl FolderHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name given to the root node instead of the folder's base name.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Decides which entries take part in the hash. Without a filter every
    /// entry is included.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Runs every file read through `executor`, bounding how many files are
    /// read concurrently.
    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Walks the folder at `root` and returns its hash tree.
    ///
    /// The root node is always returned, even when nothing inside it
    /// survived filtering. Nested directories without any surviving file are
    /// left out of their parent entirely.
    ///
    /// An entry that vanishes between being listed and being statted is
    /// skipped. Any other I/O failure aborts the whole walk, no partial tree
    /// is returned.
    pub async fn hash(&self, root: impl AsRef<Utf8Path>) -> Result<FolderHash, HashError> {
        let root = root.as_ref().to_owned();
        let name = match &self.label {
            Some(label) => label.clone(),
            None => root
                .file_name()
                .map(str::to_owned)
                .unwrap_or_else(|| root.to_string()),
        };

        tracing::debug!(%root, "hashing folder");
        let children =
            hash_children(self.executor.clone(), root.clone(), self.filter.clone()).await?;
        let tree = FolderHash::dir(name, children)?;
        tracing::debug!(%root, hash = %tree.hash, "folder hashed");

        Ok(tree)
    }
}

/// Reads and digests the file at `path`, inside an executor slot if one is
/// configured.
async fn digest(executor: Option<Executor>, path: Utf8PathBuf) -> Result<Hash32, HashError> {
    let read = async move {
        let file = path.clone();
        tokio::task::spawn_blocking(move || Hash32::hash_file(file))
            .await?
            .map_err(|source| HashError::Read { path, source })
    };

    match executor {
        Some(executor) => executor.submit(read).await,
        None => read.await,
    }
}

/// Kind of a listed entry, as the filter sees it. Only symlinks cost a stat.
///
/// An entry that is already gone is reported as a file, the stat in
/// [`hash_entry`] then decides whether it is skipped.
async fn entry_kind(entry: &tokio::fs::DirEntry, path: &Utf8Path) -> Result<EntryKind, HashError> {
    let file_type = match entry.file_type().await {
        Ok(file_type) => file_type,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(EntryKind::File),
        Err(source) => {
            return Err(HashError::Stat {
                path: path.to_owned(),
                source,
            });
        }
    };

    let is_dir = if file_type.is_symlink() {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.is_dir(),
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(source) => {
                return Err(HashError::Stat {
                    path: path.to_owned(),
                    source,
                });
            }
        }
    } else {
        file_type.is_dir()
    };

    Ok(if is_dir { EntryKind::Directory } else { EntryKind::File })
}

/// Lists `dir` and hashes every surviving entry concurrently.
fn hash_children(
    executor: Option<Executor>,
    dir: Utf8PathBuf,
    filter: Option<Filter>,
) -> Pending<Vec<FolderHash>> {
    Box::pin(async move {
        let read_dir_err = |source: std::io::Error| HashError::ReadDir {
            path: dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(read_dir_err)?;
        let mut tasks = JoinSet::new();

        while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| HashError::NonUtf8Path(entry.path()))?;
            let path = dir.join(&name);

            let below = match &filter {
                None => None,
                Some(filter) => match filter.select(&path, entry_kind(&entry, &path).await?) {
                    Selection::Exclude => continue,
                    Selection::Include => Some(filter.clone()),
                    Selection::IncludeSubtreeUnfiltered => None,
                },
            };

            tasks.spawn(hash_entry(executor.clone(), path, name, below));
        }

        // Release the descriptor before waiting on the subtrees, otherwise
        // every level of the walk keeps one open.
        drop(entries);

        // Dropping the set on error aborts the remaining siblings.
        let mut children = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            if let Some(child) = joined?? {
                children.push(child);
            }
        }

        Ok(children)
    })
}

async fn hash_entry(
    executor: Option<Executor>,
    path: Utf8PathBuf,
    name: String,
    filter: Option<Filter>,
) -> Result<Option<FolderHash>, HashError> {
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(%path, "entry disappeared before it could be hashed, skipping");
            return Ok(None);
        }
        Err(source) => return Err(HashError::Stat { path, source }),
    };

    if metadata.is_dir() {
        let children = hash_children(executor, path, filter).await?;

        if children.is_empty() {
            return Ok(None);
        }

        return Ok(Some(FolderHash::dir(name, children)?));
    }

    let hash = digest(executor, path).await?;
    Ok(Some(FolderHash::file(name, hash)))
}
