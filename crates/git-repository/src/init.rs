use std::fs;
use std::path::Path;

use crate::{DiscoveredRepo, InitOptions, RepoError, RepositoryKind};

/// Initialize a new git repository.
///
/// Creates the standard `.git/` structure:
/// - HEAD (pointing to the default branch)
/// - config
/// - branches/
/// - objects/
/// - refs/heads/
/// - refs/tags/
/// - description
///
/// Running this against an existing repository is a safe no-op (reinit):
/// existing files are left untouched.
pub fn init_repository(path: &Path, options: &InitOptions) -> Result<DiscoveredRepo, RepoError> {
    let path = if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    };

    let (git_dir, work_tree) = if options.bare {
        (path.clone(), None)
    } else {
        (path.join(".git"), Some(path.clone()))
    };

    if git_dir.join("HEAD").is_file() {
        log::debug!("reinitializing existing repository at {}, no-op", git_dir.display());
        return Ok(DiscoveredRepo {
            git_dir: git_dir.clone(),
            work_tree,
            common_dir: git_dir,
            kind: if options.bare {
                RepositoryKind::Bare
            } else {
                RepositoryKind::Normal
            },
        });
    }

    log::debug!("initializing new repository at {}", git_dir.display());
    fs::create_dir_all(&git_dir)?;
    fs::create_dir_all(git_dir.join("branches"))?;
    fs::create_dir_all(git_dir.join("objects"))?;
    fs::create_dir_all(git_dir.join("refs").join("heads"))?;
    fs::create_dir_all(git_dir.join("refs").join("tags"))?;

    let default_branch = options.default_branch.as_deref().unwrap_or("master");

    fs::write(
        git_dir.join("HEAD"),
        format!("ref: refs/heads/{default_branch}\n"),
    )?;

    let config_content = if options.bare {
        "[core]\n\trepositoryformatversion = 0\n\tfilemode = false\n\tbare = true\n"
    } else {
        "[core]\n\trepositoryformatversion = 0\n\tfilemode = false\n\tbare = false\n"
    };
    fs::write(git_dir.join("config"), config_content)?;

    fs::write(
        git_dir.join("description"),
        "Unnamed repository; edit this file 'description' to name the repository.\n",
    )?;

    Ok(DiscoveredRepo {
        git_dir: git_dir.clone(),
        work_tree,
        common_dir: git_dir,
        kind: if options.bare {
            RepositoryKind::Bare
        } else {
            RepositoryKind::Normal
        },
    })
}
