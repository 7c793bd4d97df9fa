//! Index file writing.

use std::io::Write;
use std::path::Path;

use git_hash::{HashAlgorithm, ObjectId};
use git_hash::hasher::Hasher;
use git_object::{FileMode, ObjectType, Tree, TreeEntry};
use git_odb::ObjectDatabase;

use crate::entry::IndexEntry;
use crate::extensions::tree::CacheTree;
use crate::{Index, IndexError, Stage};

/// Magic bytes at the start of every index file.
const INDEX_SIGNATURE: &[u8; 4] = b"DIRC";

/// Paths of this length or longer cannot be round-tripped through the
/// 12-bit `name_len` flags field, so they are rejected at write time too.
const NAME_LEN_MASK: usize = 0xFFF;

/// Write the index to a file atomically using a lock file. Writes the
/// already-computed `checksum` field verbatim — callers go through
/// `Index::write_to`, which enforces the Clean/Dirty state machine.
pub fn write_index(index: &Index, path: &Path) -> Result<(), IndexError> {
    let mut lock = git_utils::lockfile::LockFile::acquire(path)
        .map_err(|_| IndexError::LockFailed {
            path: path.to_path_buf(),
        })?;

    let mut data = serialize_body(index)?;
    data.extend_from_slice(index.checksum.as_bytes());

    lock.write_all(&data)?;
    lock.commit().map_err(|_| IndexError::LockFailed {
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Serialize header ‖ entries ‖ tree-cache ‖ opaque-extensions — everything
/// that precedes the trailing checksum.
pub(crate) fn serialize_body(index: &Index) -> Result<Vec<u8>, IndexError> {
    let mut buf = Vec::new();

    let needs_extended = index.entries.iter().any(|e| e.flags.has_extended());
    let version = if needs_extended {
        index.version.max(3)
    } else {
        index.version.max(2)
    };

    buf.extend_from_slice(INDEX_SIGNATURE);
    buf.extend_from_slice(&version.to_be_bytes());
    buf.extend_from_slice(&(index.entries.len() as u32).to_be_bytes());

    for entry in index.iter() {
        write_entry(&mut buf, entry, version)?;
    }

    if let Some(ref tree) = index.cache_tree {
        let tree_data = tree.serialize();
        buf.extend_from_slice(CacheTree::SIGNATURE);
        buf.extend_from_slice(&(tree_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&tree_data);
    }

    // Opaque extensions (preserved verbatim for round-trip).
    for ext in &index.unknown_extensions {
        buf.extend_from_slice(&ext.signature);
        buf.extend_from_slice(&(ext.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&ext.data);
    }

    Ok(buf)
}

/// Serialize the full on-disk bytes, recomputing the checksum fresh rather
/// than trusting `index.checksum`. Used by `Index::update_checksum` and by
/// tests that need a complete file without going through the public API.
pub(crate) fn serialize_index_bytes(index: &Index) -> Result<Vec<u8>, IndexError> {
    let mut buf = serialize_body(index)?;
    let checksum = Hasher::digest(HashAlgorithm::Sha1, &buf)
        .map_err(|_| IndexError::InvariantViolated("checksum computation failed".into()))?;
    buf.extend_from_slice(checksum.as_bytes());
    Ok(buf)
}

/// Write a single cache entry. Emits 16-bit extra-flags only when `version`
/// is 3 or higher and the entry actually needs them.
fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry, version: u32) -> Result<(), IndexError> {
    if entry.path.len() >= NAME_LEN_MASK {
        return Err(IndexError::LongPathUnsupported);
    }

    let entry_start = buf.len();

    // Stat data (40 bytes)
    buf.extend_from_slice(&entry.stat.ctime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ctime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.dev.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ino.to_be_bytes());
    buf.extend_from_slice(&entry.mode.raw().to_be_bytes());
    buf.extend_from_slice(&entry.stat.uid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.gid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.size.to_be_bytes());

    // OID (20 bytes)
    buf.extend_from_slice(entry.oid.as_bytes());

    // Flags (16 bits)
    let extended = version >= 3 && entry.flags.has_extended();
    let name_len = entry.path.len() as u16; // < NAME_LEN_MASK, checked above
    let mut flags: u16 = name_len;
    flags |= (entry.stage.as_u8() as u16) << 12;
    if entry.flags.assume_valid {
        flags |= 0x8000;
    }
    if extended {
        flags |= 0x4000;
    }
    buf.extend_from_slice(&flags.to_be_bytes());

    if extended {
        let mut extra_flags: u16 = 0;
        if entry.flags.skip_worktree {
            extra_flags |= 0x4000;
        }
        if entry.flags.intent_to_add {
            extra_flags |= 0x2000;
        }
        buf.extend_from_slice(&extra_flags.to_be_bytes());
    }

    // Path
    buf.extend_from_slice(&entry.path);

    // Pad using C git formula so the record length is a multiple of 8.
    let flags_size: usize = if extended { 4 } else { 2 };
    let entry_size = (40 + 20 + flags_size + entry.path.len() + 8) & !7;
    let current_len = buf.len() - entry_start;
    let padding = entry_size - current_len;
    for _ in 0..padding {
        buf.push(0);
    }

    Ok(())
}

/// Create a tree hierarchy from the current index entries.
pub fn write_tree_from_index(index: &Index, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
    // Only include stage-0 entries
    let entries: Vec<&IndexEntry> = index.iter().filter(|e| e.stage == Stage::Normal).collect();

    if entries.is_empty() {
        // Write an empty tree
        let tree = Tree::new();
        let tree_bytes = tree.serialize_content();
        return Ok(odb.write_raw(ObjectType::Tree, &tree_bytes)?);
    }

    build_tree(&entries, b"", odb)
}

/// Recursively build tree objects from sorted index entries.
fn build_tree(
    entries: &[&IndexEntry],
    prefix: &[u8],
    odb: &ObjectDatabase,
) -> Result<ObjectId, IndexError> {
    let mut tree_entries: Vec<TreeEntry> = Vec::new();
    let mut i = 0;

    while i < entries.len() {
        let entry = entries[i];
        let path = &entry.path[prefix.len()..];

        if let Some(slash_pos) = path.iter().position(|&b| b == b'/') {
            // This is a subtree entry
            let dir_name = &path[..slash_pos];
            // Collect all entries under this subtree
            let subtree_end = entries[i..]
                .iter()
                .position(|e| {
                    let p = &e.path[prefix.len()..];
                    !p.starts_with(dir_name) || (p.len() > slash_pos && p[slash_pos] != b'/')
                })
                .map(|pos| i + pos)
                .unwrap_or(entries.len());

            let subtree_entries = &entries[i..subtree_end];

            // Build prefix for recursion
            let mut new_prefix = prefix.to_vec();
            new_prefix.extend_from_slice(dir_name);
            new_prefix.push(b'/');

            let subtree_oid = build_tree(subtree_entries, &new_prefix, odb)?;

            tree_entries.push(TreeEntry {
                mode: FileMode::Tree,
                name: dir_name.into(),
                oid: subtree_oid,
            });

            i = subtree_end;
        } else {
            // Direct entry (blob/symlink/gitlink)
            tree_entries.push(TreeEntry {
                mode: entry.mode,
                name: path.into(),
                oid: entry.oid,
            });
            i += 1;
        }
    }

    let mut tree = Tree::new();
    tree.entries = tree_entries;
    tree.sort();
    let tree_bytes = tree.serialize_content();
    Ok(odb.write_raw(ObjectType::Tree, &tree_bytes)?)
}
