use std::path::Path;

use crate::{DiscoveredRepo, RepoError, RepositoryKind};

/// Discover a git repository by walking up from `start`, looking for a `.git`
/// directory at each level.
pub fn discover_git_dir(start: &Path) -> Result<DiscoveredRepo, RepoError> {
    let start = std::fs::canonicalize(start).map_err(|_| RepoError::NotFound(start.to_path_buf()))?;

    let mut current = start.clone();
    loop {
        let dot_git = current.join(".git");

        if dot_git.is_dir() {
            return Ok(DiscoveredRepo {
                git_dir: dot_git.clone(),
                work_tree: Some(current),
                common_dir: dot_git,
                kind: RepositoryKind::Normal,
            });
        }

        if is_git_dir(&current) {
            return Ok(DiscoveredRepo {
                git_dir: current.clone(),
                work_tree: None,
                common_dir: current,
                kind: RepositoryKind::Bare,
            });
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => return Err(RepoError::NotFound(start)),
        }
    }
}

/// Open a known git directory path directly.
pub fn open_git_dir(git_dir: &Path) -> Result<DiscoveredRepo, RepoError> {
    let git_dir = std::fs::canonicalize(git_dir).map_err(|_| RepoError::NotFound(git_dir.to_path_buf()))?;

    if !is_git_dir(&git_dir) {
        return Err(RepoError::InvalidGitDir {
            path: git_dir,
            reason: "missing HEAD, objects/, or refs/".to_string(),
        });
    }

    if let Some(parent) = git_dir.parent() {
        if parent.join(".git") == git_dir {
            return Ok(DiscoveredRepo {
                work_tree: Some(parent.to_path_buf()),
                common_dir: git_dir.clone(),
                git_dir,
                kind: RepositoryKind::Normal,
            });
        }
    }

    Ok(DiscoveredRepo {
        common_dir: git_dir.clone(),
        git_dir,
        work_tree: None,
        kind: RepositoryKind::Bare,
    })
}

/// Open a git dir when we know the working tree root (e.g., `path/.git` exists).
pub fn open_git_dir_from_work_tree(work_tree: &Path) -> Result<DiscoveredRepo, RepoError> {
    let dot_git = work_tree.join(".git");
    if !dot_git.is_dir() {
        return Err(RepoError::NotFound(work_tree.to_path_buf()));
    }

    let dot_git = std::fs::canonicalize(&dot_git).map_err(|_| RepoError::NotFound(dot_git.clone()))?;
    let work_tree = std::fs::canonicalize(work_tree).map_err(|_| RepoError::NotFound(work_tree.to_path_buf()))?;

    Ok(DiscoveredRepo {
        git_dir: dot_git.clone(),
        work_tree: Some(work_tree),
        common_dir: dot_git,
        kind: RepositoryKind::Normal,
    })
}

/// Does `path` look like a bare git directory (has HEAD, objects/, refs/)?
pub fn is_git_dir(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir() && path.join("refs").is_dir()
}
