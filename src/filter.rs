use std::sync::Arc;

use camino::Utf8Path;
use glob::Pattern;

use crate::error::FilterError;

/// What the folder hasher should do with a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Hash the entry. Directories are descended into with the filter still
    /// applied to their contents.
    Include,
    /// Skip the entry and everything below it.
    Exclude,
    /// Hash the entry and everything below it without consulting the filter
    /// again.
    IncludeSubtreeUnfiltered,
}

/// Whether a directory entry is a directory or something to be read as a
/// file. Symlinks are reported as what they point to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Predicate deciding which entries take part in a folder hash.
///
/// The predicate receives the full path of every entry, which is the root
/// path joined with the entry's relative path.
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&Utf8Path, EntryKind) -> Selection + Send + Sync>);

impl Filter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Utf8Path) -> Selection + Send + Sync + 'static,
    {
        Self(Arc::new(move |path, _| f(path)))
    }

    /// Like [`Filter::new`], but the predicate is also told whether the
    /// entry is a directory. The kind comes from the directory listing, so
    /// asking for it costs no extra stat except for symlinks.
    pub fn with_kind<F>(f: F) -> Self
    where
        F: Fn(&Utf8Path, EntryKind) -> Selection + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Builds a filter from glob patterns.
    ///
    /// An entry matching any `exclude` pattern is excluded, at any depth.
    /// Otherwise it is included when `include` is empty or one of its
    /// patterns matches. The patterns are matched against the full entry
    /// path, so they usually start with `**/`.
    ///
    /// Directories that don't match an include pattern are still descended
    /// into, otherwise `**/*.rs` could never reach a nested source file. A
    /// file is also included when one of its ancestors matches an include
    /// pattern, so `**/src` takes everything below `src`. Without exclude
    /// patterns such a directory is taken as a whole, unfiltered.
    pub fn globs<I, E>(include: I, exclude: E) -> Result<Self, FilterError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let include = compile(include)?;
        let exclude = compile(exclude)?;

        Ok(Self::with_kind(move |path, kind| {
            if matches(&exclude, path) {
                return Selection::Exclude;
            }

            if include.is_empty() {
                return Selection::Include;
            }

            let included = matches(&include, path);

            match kind {
                EntryKind::Directory if included && exclude.is_empty() => {
                    Selection::IncludeSubtreeUnfiltered
                }
                EntryKind::Directory => Selection::Include,
                EntryKind::File
                    if included || path.ancestors().skip(1).any(|a| matches(&include, a)) =>
                {
                    Selection::Include
                }
                EntryKind::File => Selection::Exclude,
            }
        }))
    }

    /// Excludes every entry whose base name is one of `names`, at any depth.
    pub fn exclude_names<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        Self::new(move |path| match path.file_name() {
            Some(name) if names.iter().any(|n| n == name) => Selection::Exclude,
            _ => Selection::Include,
        })
    }

    pub fn select(&self, path: &Utf8Path, kind: EntryKind) -> Selection {
        (self.0)(path, kind)
    }
}

fn matches(patterns: &[Pattern], path: &Utf8Path) -> bool {
    patterns.iter().any(|p| p.matches(path.as_str()))
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Filter(..)")
    }
}

fn compile<I>(patterns: I) -> Result<Vec<Pattern>, FilterError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| Pattern::new(p.as_ref()).map_err(|e| FilterError::new(p.as_ref(), e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: EntryKind = EntryKind::File;
    const DIR: EntryKind = EntryKind::Directory;

    fn select(filter: &Filter, path: &str, kind: EntryKind) -> Selection {
        filter.select(Utf8Path::new(path), kind)
    }

    #[test]
    fn test_closure_filter() {
        let filter = Filter::new(|path| {
            if path.extension() == Some("tmp") {
                Selection::Exclude
            } else {
                Selection::Include
            }
        });

        assert_eq!(select(&filter, "a/b.tmp", FILE), Selection::Exclude);
        assert_eq!(select(&filter, "a/b.txt", FILE), Selection::Include);
        assert_eq!(select(&filter, "a/dir.tmp", DIR), Selection::Exclude);
    }

    #[test]
    fn test_exclude_names() {
        let filter = Filter::exclude_names([".git", "target"]);

        assert_eq!(select(&filter, "repo/.git", DIR), Selection::Exclude);
        assert_eq!(select(&filter, "repo/crate/target", DIR), Selection::Exclude);
        assert_eq!(select(&filter, "repo/src", DIR), Selection::Include);
        assert_eq!(select(&filter, "repo/target.rs", FILE), Selection::Include);
    }

    #[test]
    fn test_glob_exclude() {
        let filter = Filter::globs(Vec::<&str>::new(), ["**/*.log"]).unwrap();

        assert_eq!(select(&filter, "root/out.log", FILE), Selection::Exclude);
        assert_eq!(select(&filter, "root/deep/err.log", FILE), Selection::Exclude);
        assert_eq!(select(&filter, "root/main.rs", FILE), Selection::Include);
    }

    #[test]
    fn test_glob_include() {
        let filter = Filter::globs(["root/**/*.rs", "root/assets"], Vec::<&str>::new()).unwrap();

        assert_eq!(select(&filter, "root/src/lib.rs", FILE), Selection::Include);
        assert_eq!(select(&filter, "root/README.md", FILE), Selection::Exclude);
        // not matched, but may contain matches
        assert_eq!(select(&filter, "root/src", DIR), Selection::Include);
        assert_eq!(
            select(&filter, "root/assets", DIR),
            Selection::IncludeSubtreeUnfiltered
        );
    }

    #[test]
    fn test_exclude_applies_inside_included_dir() {
        let filter = Filter::globs(["**/src"], ["**/*.tmp"]).unwrap();

        assert_eq!(select(&filter, "root/src", DIR), Selection::Include);
        assert_eq!(select(&filter, "root/src/main.rs", FILE), Selection::Include);
        assert_eq!(select(&filter, "root/src/deep/mod.rs", FILE), Selection::Include);
        assert_eq!(select(&filter, "root/src/junk.tmp", FILE), Selection::Exclude);
        assert_eq!(select(&filter, "root/docs/guide.md", FILE), Selection::Exclude);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Filter::globs(["[unclosed"], Vec::<&str>::new()).unwrap_err();
        assert!(err.to_string().contains("[unclosed"));
    }
}
