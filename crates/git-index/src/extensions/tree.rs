//! Cache tree extension (TREE).
//!
//! Caches the tree OIDs that committing the current index would produce, so
//! unchanged directories need not be re-hashed. The extension is a flat,
//! depth-first list of records rather than a materialized tree: each record
//! knows how many of its immediate successors in the list are its direct
//! subtrees (`subtree_count`), which is enough to reconstruct the hierarchy
//! without pointers.
//!
//! Record paths are stored in full (`./`, `./a`, `./a/b`, ...) rather than as
//! bare basenames; the basename used on the wire is recovered at emit time
//! from the last path component.

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;

use crate::IndexError;

/// A single record in the flat tree-cache list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTreeRecord {
    /// Full path of the directory this record covers (`./` for the root).
    pub path: BString,
    /// Number of index entries covered by this subtree, or -1 if invalidated.
    pub entry_count: i64,
    /// Number of immediate child records that follow this one in the list.
    pub subtree_count: usize,
    /// Tree OID, present only when `entry_count >= 0`.
    pub oid: Option<ObjectId>,
}

impl CacheTreeRecord {
    /// Is this record currently valid (has a usable cached hash)?
    pub fn is_valid(&self) -> bool {
        self.entry_count >= 0
    }

    /// Basename recovered from the full path (empty for the root).
    pub fn basename(&self) -> &BStr {
        if self.path.as_bytes() == ROOT_PATH.as_bytes() {
            BStr::new(b"")
        } else {
            match self.path.rfind_byte(b'/') {
                Some(pos) => BStr::new(&self.path[pos + 1..]),
                None => BStr::new(&self.path[..]),
            }
        }
    }
}

/// Path of the root record.
pub const ROOT_PATH: &str = "./";

/// Cache tree extension: a flat, depth-first list of directory records.
#[derive(Debug, Clone, Default)]
pub struct CacheTree {
    pub records: Vec<CacheTreeRecord>,
}

impl CacheTree {
    /// Extension signature.
    pub const SIGNATURE: &'static [u8; 4] = b"TREE";

    /// Parse a TREE extension body (without the signature/length header).
    pub fn parse(data: &[u8]) -> Result<Self, IndexError> {
        // Stack of (full path of an ancestor directory, remaining direct
        // children still to be read for it).
        let mut stack: Vec<(BString, usize)> = Vec::new();
        let mut records = Vec::new();
        let mut cursor = 0usize;

        while cursor < data.len() {
            while let Some((_, remaining)) = stack.last() {
                if *remaining == 0 {
                    stack.pop();
                } else {
                    break;
                }
            }

            let name_end = data[cursor..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| IndexError::InvalidExtension {
                    sig: "TREE".into(),
                    reason: "missing basename terminator".into(),
                })?
                + cursor;
            let basename = &data[cursor..name_end];
            cursor = name_end + 1;

            let sp_pos = data[cursor..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| IndexError::InvalidExtension {
                    sig: "TREE".into(),
                    reason: "missing entry count".into(),
                })?
                + cursor;
            let entry_count: i64 = std::str::from_utf8(&data[cursor..sp_pos])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| IndexError::InvalidExtension {
                    sig: "TREE".into(),
                    reason: "invalid entry count".into(),
                })?;
            cursor = sp_pos + 1;

            let nl_pos = data[cursor..]
                .iter()
                .position(|&b| b == b'\n')
                .ok_or_else(|| IndexError::InvalidExtension {
                    sig: "TREE".into(),
                    reason: "missing subtree count".into(),
                })?
                + cursor;
            let subtree_count: usize = std::str::from_utf8(&data[cursor..nl_pos])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| IndexError::InvalidExtension {
                    sig: "TREE".into(),
                    reason: "invalid subtree count".into(),
                })?;
            cursor = nl_pos + 1;

            let oid = if entry_count >= 0 {
                if cursor + 20 > data.len() {
                    return Err(IndexError::InvalidExtension {
                        sig: "TREE".into(),
                        reason: "truncated OID".into(),
                    });
                }
                let oid = ObjectId::from_bytes(&data[cursor..cursor + 20], git_hash::HashAlgorithm::Sha1)
                    .map_err(|_| IndexError::InvalidExtension {
                        sig: "TREE".into(),
                        reason: "invalid OID".into(),
                    })?;
                cursor += 20;
                Some(oid)
            } else {
                None
            };

            let full_path = match stack.last() {
                None => BString::from(ROOT_PATH),
                Some((parent_path, _)) => join_child(BStr::new(parent_path), basename),
            };

            if let Some((_, remaining)) = stack.last_mut() {
                *remaining -= 1;
            }

            records.push(CacheTreeRecord {
                path: full_path.clone(),
                entry_count,
                subtree_count,
                oid,
            });
            stack.push((full_path, subtree_count));
        }

        Ok(CacheTree { records })
    }

    /// Serialize to the raw extension body (without signature/length header).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for record in &self.records {
            buf.extend_from_slice(record.basename());
            buf.push(0);
            buf.extend_from_slice(record.entry_count.to_string().as_bytes());
            buf.push(b' ');
            buf.extend_from_slice(record.subtree_count.to_string().as_bytes());
            buf.push(b'\n');
            if record.entry_count >= 0 {
                if let Some(ref oid) = record.oid {
                    buf.extend_from_slice(oid.as_bytes());
                }
            }
        }
        buf
    }

    /// Canonicalize a worktree-relative directory path into the record-path
    /// convention used by this extension (`./` for the root).
    pub fn canonical_dir(path: &BStr) -> BString {
        if path.is_empty() || path.as_bytes() == b"." {
            BString::from(ROOT_PATH)
        } else if path.starts_with(b"./") {
            BString::from(path.as_bytes())
        } else {
            let mut p = BString::from(ROOT_PATH);
            p.extend_from_slice(path);
            p
        }
    }

    /// Is `ancestor` a proper ancestor of, or equal to, `dir`?
    fn covers(ancestor: &BStr, dir: &BStr) -> bool {
        if ancestor.as_bytes() == dir.as_bytes() {
            return true;
        }
        if ancestor.as_bytes() == ROOT_PATH.as_bytes() {
            return true;
        }
        let prefix = {
            let mut p = ancestor.to_vec();
            p.push(b'/');
            p
        };
        dir.starts_with(&prefix)
    }

    /// Invalidate the record for `dir` and every currently-valid ancestor of it.
    /// `dir` should already be in the record-path convention (see
    /// [`canonical_dir`](Self::canonical_dir)).
    pub fn invalidate(&mut self, dir: &BStr) {
        for record in &mut self.records {
            if record.is_valid() && Self::covers(BStr::new(&record.path), dir) {
                record.entry_count = -1;
                record.oid = None;
            }
        }
    }

    /// Insert a new leaf record, preserving depth-first ordering. The parent
    /// directory of `new.path` must already have a record.
    pub fn insert(&mut self, new: CacheTreeRecord) -> Result<(), IndexError> {
        if new.path.as_bytes() == ROOT_PATH.as_bytes() {
            if !self.records.is_empty() {
                return Err(IndexError::InvalidExtension {
                    sig: "TREE".into(),
                    reason: "cannot insert root into a non-empty tree-cache".into(),
                });
            }
            self.records.push(new);
            return Ok(());
        }

        let parent_path = parent_dir(&new.path);
        let parent_idx = self
            .records
            .iter()
            .position(|r| r.path == parent_path)
            .ok_or_else(|| IndexError::InvalidExtension {
                sig: "TREE".into(),
                reason: format!("parent directory {:?} has no tree-cache record", parent_path),
            })?;

        // Advance past the parent and all of its (recursively counted)
        // existing subtrees to find the insertion point.
        let mut idx = parent_idx + 1;
        let mut remaining = self.records[parent_idx].subtree_count;
        while remaining > 0 {
            remaining -= 1;
            remaining += self.records[idx].subtree_count;
            idx += 1;
        }

        self.records.insert(idx, new);
        self.records[parent_idx].subtree_count += 1;
        Ok(())
    }

    /// Return every record whose full path or basename equals `path`.
    pub fn get_by_dir(&self, path: &BStr) -> Vec<&CacheTreeRecord> {
        self.records
            .iter()
            .filter(|r| r.path.as_bytes() == path.as_bytes() || r.basename().as_bytes() == path.as_bytes())
            .collect()
    }

    /// Does any record's full path equal `path` exactly?
    pub fn is_dir(&self, path: &BStr) -> bool {
        self.records.iter().any(|r| r.path.as_bytes() == path.as_bytes())
    }

    /// Get the root record, if present.
    pub fn root(&self) -> Option<&CacheTreeRecord> {
        self.records.first()
    }

    /// Tree OID for the root, if currently valid.
    pub fn root_oid(&self) -> Option<&ObjectId> {
        self.root().filter(|r| r.is_valid()).and_then(|r| r.oid.as_ref())
    }

    /// Re-emit and check the extension's reported byte length is internally
    /// consistent (no truncation, no stray trailing bytes).
    pub fn validate(&self) -> Result<(), IndexError> {
        let bytes = self.serialize();
        let reparsed = Self::parse(&bytes)?;
        if reparsed.records.len() != self.records.len() {
            return Err(IndexError::InvalidExtension {
                sig: "TREE".into(),
                reason: "re-parse produced a different record count".into(),
            });
        }
        Ok(())
    }
}

/// Join a basename onto a parent's full path, in the `./`-rooted record convention.
pub(crate) fn join_child(parent: &BStr, basename: &[u8]) -> BString {
    if parent.as_bytes() == ROOT_PATH.as_bytes() {
        let mut p = BString::from(ROOT_PATH);
        p.extend_from_slice(basename);
        p
    } else {
        let mut p = BString::from(parent.as_bytes());
        p.push(b'/');
        p.extend_from_slice(basename);
        p
    }
}

/// Parent directory path of `path`, in the `./`-rooted record convention.
fn parent_dir(path: &BStr) -> BString {
    match path.rfind_byte(b'/') {
        Some(pos) => {
            let parent = &path[..pos];
            if parent.is_empty() || parent.as_bytes() == b"." {
                BString::from(ROOT_PATH)
            } else {
                BString::from(parent)
            }
        }
        None => BString::from(ROOT_PATH),
    }
}
