//! Repository discovery, initialization, and central access for all git subsystems.
//!
//! This crate is the only one in the workspace that emits `log` records. It does so
//! as an opt-in facade: no logger implementation is linked in, so a consuming
//! application wires up `env_logger` or similar to see anything. Only the
//! outermost caller-facing operations log (open/discover/init, index load/write);
//! the lower-level data-structure crates stay silent.

mod discover;
mod error;
mod init;

pub use error::{RepoError, EXIT_FAILURE, EXIT_FATAL, EXIT_SUCCESS};

use std::path::{Path, PathBuf};

use git_config::ConfigSet;
use git_hash::{HashAlgorithm, ObjectId};
use git_index::Index;
use git_odb::ObjectDatabase;

/// Type of repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    /// Normal repo with a working tree.
    Normal,
    /// Bare repo (no working tree).
    Bare,
    /// Linked worktree sharing objects/refs with a main repo.
    LinkedWorktree,
}

/// Result of repository discovery before full opening.
#[derive(Debug)]
pub struct DiscoveredRepo {
    pub git_dir: PathBuf,
    pub work_tree: Option<PathBuf>,
    pub common_dir: PathBuf,
    pub kind: RepositoryKind,
}

/// Options for repository initialization.
pub struct InitOptions {
    pub bare: bool,
    pub default_branch: Option<String>,
    pub hash_algorithm: HashAlgorithm,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            bare: false,
            default_branch: None,
            hash_algorithm: HashAlgorithm::Sha1,
        }
    }
}

/// What `HEAD` currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadTarget {
    /// `HEAD` is a symbolic ref pointing at a branch, e.g. `refs/heads/master`.
    Symbolic(String),
    /// `HEAD` directly names an object (detached HEAD).
    Detached(ObjectId),
}

/// The central repository struct tying all subsystems together.
pub struct Repository {
    /// Path to the .git directory.
    git_dir: PathBuf,
    /// Path to the working tree (None for bare repos).
    work_tree: Option<PathBuf>,
    /// Path to the common dir (for worktrees; same as git_dir for normal repos).
    common_dir: PathBuf,
    /// Object database.
    odb: ObjectDatabase,
    /// Merged configuration.
    config: ConfigSet,
    /// Index (lazy-loaded). None means not yet loaded.
    index: Option<Index>,
    /// Path to the index file.
    index_path: PathBuf,
    /// Hash algorithm.
    hash_algo: HashAlgorithm,
    /// Repository kind.
    kind: RepositoryKind,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("work_tree", &self.work_tree)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open an existing repository at the given path.
    ///
    /// `path` should point to either the `.git` directory or the working tree root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        log::debug!("opening repository at {}", path.display());
        let discovered = if path.join("HEAD").is_file() && path.join("objects").is_dir() {
            discover::open_git_dir(path)?
        } else if path.join(".git").exists() {
            discover::open_git_dir_from_work_tree(path)?
        } else {
            return Err(RepoError::NotFound(path.to_path_buf()));
        };
        Self::from_discovered(discovered)
    }

    /// Discover a repository starting from the given directory, walking up.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, RepoError> {
        log::debug!("discovering repository from {}", start.as_ref().display());
        let discovered = discover::discover_git_dir(start.as_ref())?;
        Self::from_discovered(discovered)
    }

    /// Initialize a new repository at the given path.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let opts = InitOptions::default();
        let discovered = init::init_repository(path.as_ref(), &opts)?;
        Self::from_discovered(discovered)
    }

    /// Initialize a new bare repository at the given path.
    pub fn init_bare(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let opts = InitOptions {
            bare: true,
            ..Default::default()
        };
        let discovered = init::init_repository(path.as_ref(), &opts)?;
        Self::from_discovered(discovered)
    }

    /// Initialize a new repository with custom options.
    pub fn init_opts(path: impl AsRef<Path>, opts: &InitOptions) -> Result<Self, RepoError> {
        let discovered = init::init_repository(path.as_ref(), opts)?;
        Self::from_discovered(discovered)
    }

    /// Build a Repository from a DiscoveredRepo.
    fn from_discovered(discovered: DiscoveredRepo) -> Result<Self, RepoError> {
        let DiscoveredRepo {
            git_dir,
            work_tree,
            common_dir,
            kind,
        } = discovered;

        let objects_dir = common_dir.join("objects");
        let odb = ObjectDatabase::open(&objects_dir)?;

        let config = ConfigSet::load(Some(&git_dir))?;

        let hash_algo = match config.get_string("extensions.objectformat") {
            Ok(Some(ref name)) => HashAlgorithm::from_name(name).unwrap_or(HashAlgorithm::Sha1),
            _ => HashAlgorithm::Sha1,
        };

        let index_path = git_dir.join("index");

        Ok(Repository {
            git_dir,
            work_tree,
            common_dir,
            odb,
            config,
            index: None,
            index_path,
            hash_algo,
            kind,
        })
    }

    // --- Path accessors ---

    /// Path to the .git directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Path to the working tree (None for bare repos).
    pub fn work_tree(&self) -> Option<&Path> {
        self.work_tree.as_deref()
    }

    /// Path to the common directory (shared in worktrees).
    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }

    /// Repository kind.
    pub fn kind(&self) -> RepositoryKind {
        self.kind
    }

    /// Is this a bare repository?
    pub fn is_bare(&self) -> bool {
        self.kind == RepositoryKind::Bare
    }

    // --- Subsystem accessors ---

    /// Access the object database.
    pub fn odb(&self) -> &ObjectDatabase {
        &self.odb
    }

    /// Access the configuration.
    pub fn config(&self) -> &ConfigSet {
        &self.config
    }

    /// Access the configuration mutably.
    pub fn config_mut(&mut self) -> &mut ConfigSet {
        &mut self.config
    }

    /// Access the index (lazy-loaded).
    pub fn index(&mut self) -> Result<&Index, RepoError> {
        if self.index.is_none() {
            self.load_index()?;
        }
        Ok(self.index.as_ref().unwrap())
    }

    /// Access the index mutably (lazy-loaded).
    pub fn index_mut(&mut self) -> Result<&mut Index, RepoError> {
        if self.index.is_none() {
            self.load_index()?;
        }
        Ok(self.index.as_mut().unwrap())
    }

    /// Replace the cached index with the given one.
    pub fn set_index(&mut self, index: Index) {
        self.index = Some(index);
    }

    /// Write the current in-memory index back to disk. The index must be
    /// Clean (call `update_checksum()` after mutating it first).
    pub fn write_index(&self) -> Result<(), RepoError> {
        if let Some(ref idx) = self.index {
            log::debug!("writing index to {}", self.index_path.display());
            if let Err(err) = idx.write_to(&self.index_path) {
                log::warn!("failed to write index to {}: {err}", self.index_path.display());
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Reload the index from disk, replacing any cached copy.
    pub fn reload_index(&mut self) -> Result<&Index, RepoError> {
        self.index = None;
        self.load_index()?;
        Ok(self.index.as_ref().unwrap())
    }

    fn load_index(&mut self) -> Result<(), RepoError> {
        let idx = if self.index_path.exists() {
            log::debug!("loading index from {}", self.index_path.display());
            match Index::read_from(&self.index_path) {
                Ok(idx) => idx,
                Err(err) => {
                    log::warn!("index at {} failed to load: {err}", self.index_path.display());
                    return Err(err.into());
                }
            }
        } else {
            log::debug!("no index file at {}, starting empty", self.index_path.display());
            Index::new()
        };
        self.index = Some(idx);
        Ok(())
    }

    /// Hash algorithm in use.
    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    // --- HEAD / refs/heads convenience methods ---
    //
    // Only the `HEAD` file and the `refs/heads/*` layout are understood here;
    // packed-refs, reflogs, and tags are external collaborators.

    /// Read what `HEAD` currently points at.
    pub fn head_target(&self) -> Result<HeadTarget, RepoError> {
        let content = std::fs::read_to_string(self.common_dir.join("HEAD"))?;
        let content = content.trim();

        if let Some(target) = content.strip_prefix("ref: ") {
            Ok(HeadTarget::Symbolic(target.trim().to_string()))
        } else {
            let oid = ObjectId::from_hex(content)
                .map_err(|_| RepoError::InvalidHead(format!("unparseable HEAD content: {content}")))?;
            Ok(HeadTarget::Detached(oid))
        }
    }

    /// Read the raw 40-hex OID stored in a `refs/heads/*` (or other ref) file,
    /// relative to the common dir. Returns `None` if the file does not exist
    /// (an unborn branch).
    fn read_ref_file(&self, ref_name: &str) -> Result<Option<ObjectId>, RepoError> {
        let path = self.common_dir.join(ref_name);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let oid = ObjectId::from_hex(content.trim())
            .map_err(|_| RepoError::InvalidHead(format!("unparseable ref file {ref_name}: {content}")))?;
        Ok(Some(oid))
    }

    /// Write a 40-hex OID into a `refs/heads/*` (or other ref) file, relative
    /// to the common dir, creating parent directories as needed.
    pub fn write_ref_file(&self, ref_name: &str, oid: &ObjectId) -> Result<(), RepoError> {
        let path = self.common_dir.join(ref_name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, format!("{}\n", oid.to_hex()))?;
        Ok(())
    }

    /// Resolve `HEAD` to an OID: follows a symbolic `HEAD` to its target ref
    /// file; returns `None` for an unborn branch or an empty repository.
    pub fn head_oid(&self) -> Result<Option<ObjectId>, RepoError> {
        match self.head_target()? {
            HeadTarget::Symbolic(target) => self.read_ref_file(&target),
            HeadTarget::Detached(oid) => Ok(Some(oid)),
        }
    }

    /// Get the current branch name (None if detached HEAD).
    pub fn current_branch(&self) -> Result<Option<String>, RepoError> {
        match self.head_target()? {
            HeadTarget::Symbolic(target) => {
                let branch = target.strip_prefix("refs/heads/").unwrap_or(&target);
                Ok(Some(branch.to_string()))
            }
            HeadTarget::Detached(_) => Ok(None),
        }
    }

    /// Check if this is on an unborn branch (no commits yet).
    pub fn is_unborn(&self) -> Result<bool, RepoError> {
        match self.head_target()? {
            HeadTarget::Symbolic(target) => Ok(self.read_ref_file(&target)?.is_none()),
            HeadTarget::Detached(_) => Ok(false),
        }
    }
}
