//! Index (staging area) for git.
//!
//! Provides reading, writing, and manipulation of the git index file (`.git/index`).
//! The index sits between the working tree and the object database, tracking which
//! files are staged for the next commit.

pub mod entry;
pub mod extensions;
mod read;
mod write;

use std::collections::BTreeSet;
use std::path::Path;

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_object::{FileMode, ObjectType};
use git_odb::ObjectDatabase;

pub use entry::{EntryFlags, IndexEntry, StatData};
pub use error::IndexError;
pub use extensions::tree::{CacheTree, CacheTreeRecord};
pub use extensions::RawExtension;

mod error {
    use std::path::PathBuf;

    #[derive(Debug, thiserror::Error)]
    pub enum IndexError {
        #[error("invalid index header: {0}")]
        InvalidHeader(String),

        #[error("unsupported index version: {0}")]
        UnsupportedVersion(u32),

        #[error("index checksum mismatch")]
        ChecksumMismatch,

        #[error("invalid index entry at offset {offset}: {reason}")]
        InvalidEntry { offset: usize, reason: String },

        #[error("invalid extension '{sig}': {reason}")]
        InvalidExtension { sig: String, reason: String },

        #[error("path names of length >= 0xFFF are not supported")]
        LongPathUnsupported,

        #[error("entry padding contained non-NUL bytes")]
        BadPadding,

        #[error("extended entry flag set in a version-2 index")]
        UnsupportedExtendedFlag,

        #[error("invariant violated: {0}")]
        InvariantViolated(String),

        #[error("lock failed: {path}")]
        LockFailed { path: PathBuf },

        #[error(transparent)]
        Io(#[from] std::io::Error),

        #[error(transparent)]
        Odb(#[from] git_odb::OdbError),
    }
}

/// Merge stage for index entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Normal entry (stage 0).
    Normal,
    /// Base version in merge conflict (stage 1).
    Base,
    /// Ours version in merge conflict (stage 2).
    Ours,
    /// Theirs version in merge conflict (stage 3).
    Theirs,
}

impl Stage {
    pub fn as_u8(&self) -> u8 {
        match self {
            Stage::Normal => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    pub fn from_u8(n: u8) -> Result<Self, IndexError> {
        match n {
            0 => Ok(Stage::Normal),
            1 => Ok(Stage::Base),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            _ => Err(IndexError::InvalidEntry {
                offset: 0,
                reason: format!("invalid stage: {n}"),
            }),
        }
    }
}

/// Clean/Dirty state of an in-memory index relative to its `checksum` field.
/// Clean means `checksum` is known to equal `SHA-1(serialize())`; Dirty means
/// a mutation has happened since the checksum was last computed. Persistence
/// (`write_to`) is only permitted while Clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Clean,
    Dirty,
}

/// The git index (staging area).
pub struct Index {
    /// Index format version (2 or 3).
    version: u32,
    /// Cache entries sorted by (path, stage).
    entries: Vec<IndexEntry>,
    /// Cache tree extension.
    cache_tree: Option<CacheTree>,
    /// Unknown extensions (preserved for round-trip).
    unknown_extensions: Vec<RawExtension>,
    /// Checksum of the index file as of the last `update_checksum()`.
    checksum: ObjectId,
    /// Clean/Dirty state.
    state: IndexState,
}

impl Index {
    /// Create a new empty index. Starts Dirty: no checksum has been computed yet.
    pub fn new() -> Self {
        Self {
            version: 2,
            entries: Vec::new(),
            cache_tree: None,
            unknown_extensions: Vec::new(),
            checksum: ObjectId::NULL,
            state: IndexState::Dirty,
        }
    }

    /// Read the index from a file (memory-mapped for large indices).
    /// The parsed index is Clean: its stored checksum was just verified against
    /// the file's contents.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let file = std::fs::File::open(path.as_ref())?;
        let data = unsafe { memmap2::Mmap::map(&file) }?;
        read::parse_index(&data)
    }

    /// Write the index to a file (atomic, using lock file). Requires the
    /// index to be Clean; call `update_checksum()` first if it is Dirty.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        if self.state != IndexState::Clean {
            return Err(IndexError::InvariantViolated(
                "index is dirty; call update_checksum() before writing".into(),
            ));
        }
        write::write_index(self, path.as_ref())
    }

    /// Exact bytes of header ‖ entries ‖ tree-cache ‖ opaque-extensions,
    /// i.e. everything that precedes the trailing checksum.
    pub fn serialize(&self) -> Result<Vec<u8>, IndexError> {
        write::serialize_body(self)
    }

    /// Recompute `checksum = SHA-1(serialize())` and move to Clean.
    pub fn update_checksum(&mut self) -> Result<(), IndexError> {
        let body = write::serialize_body(self)?;
        let digest = git_hash::hasher::Hasher::digest(git_hash::HashAlgorithm::Sha1, &body)
            .map_err(|_| IndexError::InvariantViolated("checksum computation failed".into()))?;
        self.checksum = digest;
        self.state = IndexState::Clean;
        Ok(())
    }

    /// Current Clean/Dirty state.
    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by path and stage.
    pub fn get(&self, path: &BStr, stage: Stage) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.path[..] == path[..] && e.stage == stage)
    }

    /// Get all entries for a path (all stages).
    pub fn get_all(&self, path: &BStr) -> Vec<&IndexEntry> {
        self.entries
            .iter()
            .filter(|e| e.path[..] == path[..])
            .collect()
    }

    /// All entries with the given name (basename) or full relative path.
    pub fn entries_for(&self, name: &BStr) -> Vec<&IndexEntry> {
        self.entries
            .iter()
            .filter(|e| {
                e.path[..] == name[..]
                    || e.path.rfind_byte(b'/').map(|pos| &e.path[pos + 1..]) == Some(&name[..])
            })
            .collect()
    }

    /// Add or update an entry. Maintains sorted order, invalidates the
    /// ancestor chain of the entry's containing directory in the tree-cache,
    /// and marks the index Dirty.
    pub fn add(&mut self, entry: IndexEntry) {
        // Remove existing entry with same path and stage
        self.entries
            .retain(|e| !(e.path == entry.path && e.stage == entry.stage));

        if let Some(ref mut tree) = self.cache_tree {
            tree.invalidate(BStr::new(&parent_dir_of(BStr::new(&entry.path))));
        }

        // Insert in sorted position
        let pos = self
            .entries
            .binary_search_by(|e| cmp_entries(e, &entry))
            .unwrap_or_else(|pos| pos);
        self.entries.insert(pos, entry);
        self.state = IndexState::Dirty;
    }

    /// Stage a worktree file: read its content, write a blob, append an
    /// entry, invalidate ancestor tree-cache records, recompute the checksum,
    /// and persist the index.
    pub fn add_file(
        &mut self,
        workdir: impl AsRef<Path>,
        rel_path: &BStr,
        odb: &ObjectDatabase,
        index_path: impl AsRef<Path>,
    ) -> Result<(), IndexError> {
        let abs_path = workdir
            .as_ref()
            .join(git_utils::path::GitPath::new(rel_path.as_bytes()).to_os_path());
        let link_meta = std::fs::symlink_metadata(&abs_path)?;
        let mode = file_mode_from_metadata(&link_meta);

        let content = if mode == FileMode::Symlink {
            read_symlink_bytes(&abs_path)?
        } else {
            std::fs::read(&abs_path)?
        };

        let oid = odb.write_raw(ObjectType::Blob, &content)?;
        let stat = StatData::from_metadata(&link_meta);

        let entry = IndexEntry {
            path: BString::from(rel_path.as_bytes()),
            oid,
            mode,
            stage: Stage::Normal,
            stat,
            flags: EntryFlags::default(),
        };

        self.add(entry);
        self.update_checksum()?;
        self.write_to(index_path)?;
        Ok(())
    }

    /// Remove entries matching a path and stage. Returns true if any were removed.
    pub fn remove(&mut self, path: &BStr, stage: Stage) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.path[..] == path[..] && e.stage == stage));
        let removed = self.entries.len() < before;

        if removed {
            if let Some(ref mut tree) = self.cache_tree {
                tree.invalidate(BStr::new(&parent_dir_of(path)));
            }
            self.state = IndexState::Dirty;
        }

        removed
    }

    /// Check if the path has conflicts (stages 1, 2, or 3).
    pub fn has_conflicts(&self, path: &BStr) -> bool {
        self.entries
            .iter()
            .any(|e| e.path[..] == path[..] && e.stage != Stage::Normal)
    }

    /// Get all conflicted paths.
    pub fn conflicts(&self) -> Vec<&BStr> {
        let mut paths: Vec<&BStr> = self
            .entries
            .iter()
            .filter(|e| e.stage != Stage::Normal)
            .map(|e| e.path.as_ref())
            .collect();
        paths.dedup();
        paths
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Get the index version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Get the cache tree (if available).
    pub fn cache_tree(&self) -> Option<&CacheTree> {
        self.cache_tree.as_ref()
    }

    /// Get the cache tree mutably.
    pub fn cache_tree_mut(&mut self) -> Option<&mut CacheTree> {
        self.cache_tree.as_mut()
    }

    /// Set the cache tree.
    pub fn set_cache_tree(&mut self, tree: Option<CacheTree>) {
        self.cache_tree = tree;
    }

    /// For every index entry, decompose its parent directory into its
    /// ancestor chain (`./`, `./a`, `./a/b`, ...) and classify each ancestor
    /// as needing a brand-new tree-cache record (`to_create`) or a refresh
    /// of an invalidated one (`to_refresh`). The root is always included in
    /// `to_refresh` whenever anything needs work.
    pub fn classify_dirs(&self) -> (BTreeSet<BString>, BTreeSet<BString>) {
        let mut to_create = BTreeSet::new();
        let mut to_refresh = BTreeSet::new();

        for entry in &self.entries {
            for ancestor in ancestor_chain(BStr::new(&entry.path)) {
                match self
                    .cache_tree
                    .as_ref()
                    .and_then(|tree| tree.records.iter().find(|r| r.path == ancestor))
                {
                    None => {
                        to_create.insert(ancestor);
                    }
                    Some(record) if !record.is_valid() => {
                        to_refresh.insert(ancestor);
                    }
                    Some(_) => {}
                }
            }
        }

        if !to_create.is_empty() || !to_refresh.is_empty() {
            to_refresh.insert(BString::from(extensions::tree::ROOT_PATH));
        }

        (to_create, to_refresh)
    }

    /// Assert invariants (1) `header.num_entries == |entries|` — trivially
    /// true by construction, since this type has no separate stored count —
    /// (2) the checksum matches the serialized bytes when `read_from_disk` is
    /// set, and the tree-cache hash-presence invariant (a record has a stored
    /// hash iff it is valid).
    pub fn validate(&self, read_from_disk: bool) -> Result<(), IndexError> {
        if let Some(ref tree) = self.cache_tree {
            for record in &tree.records {
                if record.is_valid() != record.oid.is_some() {
                    return Err(IndexError::InvariantViolated(
                        "cache-tree record's hash presence disagrees with its validity".into(),
                    ));
                }
            }
            tree.validate()?;
        }

        if read_from_disk {
            let body = write::serialize_body(self)?;
            let computed =
                git_hash::hasher::Hasher::digest(git_hash::HashAlgorithm::Sha1, &body)
                    .map_err(|_| IndexError::ChecksumMismatch)?;
            if computed.as_bytes() != self.checksum.as_bytes() {
                return Err(IndexError::ChecksumMismatch);
            }
        }

        Ok(())
    }

    /// Create a tree hierarchy from the current index state.
    pub fn write_tree(&self, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
        write::write_tree_from_index(self, odb)
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two index entries for sort order: by path, then by stage.
fn cmp_entries(a: &IndexEntry, b: &IndexEntry) -> std::cmp::Ordering {
    a.path.cmp(&b.path).then(a.stage.as_u8().cmp(&b.stage.as_u8()))
}

/// Canonical (`./`-rooted) path of the directory containing `path`.
fn parent_dir_of(path: &BStr) -> BString {
    match path.rfind_byte(b'/') {
        Some(pos) => CacheTree::canonical_dir(BStr::new(&path[..pos])),
        None => BString::from(extensions::tree::ROOT_PATH),
    }
}

/// The ancestor chain of directories containing `path`: `./`, `./a`, `./a/b`, ...
/// (not including `path` itself).
fn ancestor_chain(path: &BStr) -> Vec<BString> {
    let mut chain = vec![BString::from(extensions::tree::ROOT_PATH)];
    let components: Vec<&[u8]> = path.split(|&b| b == b'/').collect();
    if components.len() <= 1 {
        return chain;
    }

    let mut current = BString::from(extensions::tree::ROOT_PATH);
    for component in &components[..components.len() - 1] {
        current = extensions::tree::join_child(BStr::new(&current), component);
        chain.push(current.clone());
    }
    chain
}

#[cfg(unix)]
fn file_mode_from_metadata(meta: &std::fs::Metadata) -> FileMode {
    use std::os::unix::fs::PermissionsExt;
    if meta.file_type().is_symlink() {
        FileMode::Symlink
    } else if meta.permissions().mode() & 0o111 != 0 {
        FileMode::Executable
    } else {
        FileMode::Regular
    }
}

#[cfg(not(unix))]
fn file_mode_from_metadata(meta: &std::fs::Metadata) -> FileMode {
    if meta.file_type().is_symlink() {
        FileMode::Symlink
    } else {
        FileMode::Regular
    }
}

#[cfg(unix)]
fn read_symlink_bytes(path: &Path) -> std::io::Result<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    Ok(std::fs::read_link(path)?.as_os_str().as_bytes().to_vec())
}

#[cfg(not(unix))]
fn read_symlink_bytes(path: &Path) -> std::io::Result<Vec<u8>> {
    Ok(std::fs::read_link(path)?.to_string_lossy().into_owned().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryFlags, StatData};
    use extensions::tree::CacheTreeRecord;

    fn entry(path: &str) -> IndexEntry {
        IndexEntry {
            path: BString::from(path),
            oid: ObjectId::NULL,
            mode: FileMode::Regular,
            stage: Stage::Normal,
            stat: StatData::default(),
            flags: EntryFlags::default(),
        }
    }

    #[test]
    fn new_index_is_dirty_until_checksum_updated() {
        let mut index = Index::new();
        assert_eq!(index.state(), IndexState::Dirty);
        assert!(index.write_to("/nonexistent/path").is_err());
        index.update_checksum().unwrap();
        assert_eq!(index.state(), IndexState::Clean);
    }

    #[test]
    fn add_marks_dirty_again() {
        let mut index = Index::new();
        index.update_checksum().unwrap();
        index.add(entry("a.txt"));
        assert_eq!(index.state(), IndexState::Dirty);
    }

    #[test]
    fn add_invalidates_ancestor_chain() {
        let mut index = Index::new();
        let mut tree = CacheTree::default();
        tree.records.push(CacheTreeRecord {
            path: BString::from(extensions::tree::ROOT_PATH),
            entry_count: 2,
            subtree_count: 1,
            oid: Some(ObjectId::NULL),
        });
        tree.records.push(CacheTreeRecord {
            path: BString::from("./a"),
            entry_count: 1,
            subtree_count: 0,
            oid: Some(ObjectId::NULL),
        });
        index.set_cache_tree(Some(tree));

        index.add(entry("a/new.txt"));

        let tree = index.cache_tree().unwrap();
        assert!(!tree.get_by_dir(BStr::new("./")).is_empty());
        assert!(!tree.get_by_dir(BStr::new("./"))[0].is_valid());
        assert!(!tree.get_by_dir(BStr::new("./a"))[0].is_valid());
    }

    #[test]
    fn classify_dirs_reports_missing_and_invalidated() {
        let mut index = Index::new();
        let mut tree = CacheTree::default();
        tree.records.push(CacheTreeRecord {
            path: BString::from(extensions::tree::ROOT_PATH),
            entry_count: -1,
            subtree_count: 0,
            oid: None,
        });
        index.set_cache_tree(Some(tree));
        index.add(entry("a/b/new.txt"));

        let (to_create, to_refresh) = index.classify_dirs();
        assert!(to_create.contains(&BString::from("./a")));
        assert!(to_create.contains(&BString::from("./a/b")));
        assert!(to_refresh.contains(&BString::from(extensions::tree::ROOT_PATH)));
    }

    #[test]
    fn validate_rejects_inconsistent_cache_tree_hash_presence() {
        let mut index = Index::new();
        let mut tree = CacheTree::default();
        tree.records.push(CacheTreeRecord {
            path: BString::from(extensions::tree::ROOT_PATH),
            entry_count: 1,
            subtree_count: 0,
            oid: None, // inconsistent: valid but missing hash
        });
        index.set_cache_tree(Some(tree));
        assert!(index.validate(false).is_err());
    }

    #[test]
    fn entries_for_matches_basename_or_full_path() {
        let mut index = Index::new();
        index.add(entry("src/main.rs"));
        assert_eq!(index.entries_for(BStr::new("main.rs")).len(), 1);
        assert_eq!(index.entries_for(BStr::new("src/main.rs")).len(), 1);
        assert_eq!(index.entries_for(BStr::new("other.rs")).len(), 0);
    }
}
