//! The result of hashing a folder: a tree of names and fingerprints that
//! mirrors the surviving part of the directory structure.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::core::Hash32;

/// One hashed file system entry.
///
/// Files carry the digest of their contents. Directories carry the digest of
/// their children's names and hashes, so two directories hash the same iff
/// they have the same entries with the same contents. Directories without any
/// surviving descendant file are never materialized, except for the root of a
/// hash which is always returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderHash {
    /// Base name of the entry, or the label given for the root.
    pub name: String,
    /// Lowercase hex digest.
    pub hash: String,
    /// Children sorted by name. `None` for files and for directories with
    /// nothing left in them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FolderHash>>,
}

/// A difference between two snapshots of the same tree, by leaf path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added(Utf8PathBuf),
    Removed(Utf8PathBuf),
    Modified(Utf8PathBuf),
}

impl Change {
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Added(path) | Self::Removed(path) | Self::Modified(path) => path,
        }
    }
}

impl FolderHash {
    pub(crate) fn file(name: impl Into<String>, hash: Hash32) -> Self {
        Self {
            name: name.into(),
            hash: hash.to_hex(),
            children: None,
        }
    }

    /// Builds a directory node, hashing the keyed mapping of its children.
    pub(crate) fn dir(
        name: impl Into<String>,
        mut children: Vec<Self>,
    ) -> serde_json::Result<Self> {
        children.sort_by(|a, b| a.name.cmp(&b.name));

        let mapping: BTreeMap<String, String> = children
            .iter()
            .map(|child| (child.name.clone(), child.hash.clone()))
            .collect();

        Ok(Self {
            name: name.into(),
            hash: Hash32::hash_mapping(&mapping)?.to_hex(),
            children: (!children.is_empty()).then_some(children),
        })
    }

    pub fn is_dir(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> &[FolderHash] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Finds a descendant by its `/`-separated path relative to this node.
    /// An empty path resolves to the node itself.
    pub fn get(&self, path: impl AsRef<Utf8Path>) -> Option<&FolderHash> {
        path.as_ref()
            .components()
            .try_fold(self, |node, part| {
                node.children()
                    .iter()
                    .find(|child| child.name == part.as_str())
            })
    }

    /// Lists every leaf below this node with its path relative to this node.
    pub fn files(&self) -> Vec<(Utf8PathBuf, &FolderHash)> {
        let mut acc = Vec::new();
        let mut stack: Vec<(Utf8PathBuf, &FolderHash)> = self
            .children()
            .iter()
            .rev()
            .map(|child| (Utf8PathBuf::from(child.name.clone()), child))
            .collect();

        while let Some((path, node)) = stack.pop() {
            match &node.children {
                Some(children) => {
                    for child in children.iter().rev() {
                        stack.push((path.join(&child.name), child));
                    }
                }
                None => acc.push((path, node)),
            }
        }

        acc
    }

    /// Compares this snapshot (the old one) with `other` (the new one) and
    /// reports which leaves were added, removed or modified. Subtrees with
    /// equal hashes are skipped without being visited.
    pub fn diff(&self, other: &FolderHash) -> Vec<Change> {
        let mut changes = Vec::new();
        diff_children(Utf8Path::new(""), self, other, &mut changes);
        changes
    }
}

fn diff_children(prefix: &Utf8Path, old: &FolderHash, new: &FolderHash, acc: &mut Vec<Change>) {
    let old: BTreeMap<&str, &FolderHash> =
        old.children().iter().map(|c| (c.name.as_str(), c)).collect();
    let new: BTreeMap<&str, &FolderHash> =
        new.children().iter().map(|c| (c.name.as_str(), c)).collect();

    for (&name, &before) in &old {
        let path = prefix.join(name);

        match new.get(name) {
            None => collect_leaves(path, before, acc, Change::Removed),
            Some(&after) if before.hash == after.hash && before.is_dir() == after.is_dir() => {}
            Some(&after) => match (before.is_dir(), after.is_dir()) {
                (true, true) => diff_children(&path, before, after, acc),
                (false, false) => acc.push(Change::Modified(path)),
                _ => {
                    collect_leaves(path.clone(), before, acc, Change::Removed);
                    collect_leaves(path, after, acc, Change::Added);
                }
            },
        }
    }

    for (&name, &after) in &new {
        if !old.contains_key(name) {
            collect_leaves(prefix.join(name), after, acc, Change::Added);
        }
    }
}

fn collect_leaves(
    path: Utf8PathBuf,
    node: &FolderHash,
    acc: &mut Vec<Change>,
    f: fn(Utf8PathBuf) -> Change,
) {
    if node.is_dir() {
        for (rel, _) in node.files() {
            acc.push(f(path.join(rel)));
        }
    } else {
        acc.push(f(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, content: &str) -> FolderHash {
        FolderHash::file(name, Hash32::hash(content))
    }

    fn sample() -> FolderHash {
        let sub = FolderHash::dir("sub", vec![leaf("b.txt", "y")]).unwrap();
        FolderHash::dir("root", vec![sub, leaf("a.txt", "x")]).unwrap()
    }

    #[test]
    fn test_children_sorted() {
        let root = sample();
        let names: Vec<_> = root.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "sub"]);
    }

    #[test]
    fn test_empty_dir_has_no_children() {
        let empty = FolderHash::dir("empty", vec![]).unwrap();
        assert!(empty.children.is_none());
        assert!(!empty.is_dir());
        assert_eq!(empty.hash, Hash32::hash_mapping(&BTreeMap::new()).unwrap().to_hex());
    }

    #[test]
    fn test_child_order_irrelevant() {
        let a = FolderHash::dir("d", vec![leaf("1", "a"), leaf("2", "b"), leaf("3", "c")]).unwrap();
        let b = FolderHash::dir("d", vec![leaf("3", "c"), leaf("1", "a"), leaf("2", "b")]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_get() {
        let root = sample();
        assert_eq!(root.get("sub/b.txt").unwrap().hash, Hash32::hash("y").to_hex());
        assert_eq!(root.get("").unwrap().name, "root");
        assert!(root.get("sub/missing").is_none());
        assert!(root.get("a.txt/nested").is_none());
    }

    #[test]
    fn test_files() {
        let root = sample();
        let paths: Vec<_> = root.files().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, [Utf8PathBuf::from("a.txt"), Utf8PathBuf::from("sub/b.txt")]);
    }

    #[test]
    fn test_serialize_omits_children_of_files() {
        let json = serde_json::to_value(sample()).unwrap();

        assert_eq!(json["name"], "root");
        assert!(json["children"][0].get("children").is_none());
        assert_eq!(json["children"][1]["children"][0]["name"], "b.txt");

        let back: FolderHash = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_diff() {
        let old = sample();
        let sub = FolderHash::dir("sub", vec![leaf("b.txt", "z"), leaf("c.txt", "new")]).unwrap();
        let new = FolderHash::dir("root", vec![sub]).unwrap();

        let changes = old.diff(&new);

        assert_eq!(
            changes,
            [
                Change::Removed("a.txt".into()),
                Change::Modified("sub/b.txt".into()),
                Change::Added("sub/c.txt".into()),
            ]
        );
        assert!(old.diff(&old).is_empty());

        let paths: Vec<_> = changes.iter().map(|c| c.path().as_str()).collect();
        assert_eq!(paths, ["a.txt", "sub/b.txt", "sub/c.txt"]);
    }

    #[test]
    fn test_diff_file_replaced_by_dir() {
        let old = FolderHash::dir("root", vec![leaf("x", "file")]).unwrap();
        let dir = FolderHash::dir("x", vec![leaf("inner", "data")]).unwrap();
        let new = FolderHash::dir("root", vec![dir]).unwrap();

        assert_eq!(
            old.diff(&new),
            [Change::Removed("x".into()), Change::Added("x/inner".into())]
        );
    }
}
