//! The source repository: discovery, branch checks and commit lookup.

use std::path::{Path, PathBuf};

use git2::{BranchType, Oid, Signature};

use crate::error::{Error, Result};

/// Fallback name when a repository path has no usable final component.
const FALLBACK_REPO_NAME: &str = "git-repo";

/// A git repository whose history is being rewritten.
pub struct Repository {
    inner: git2::Repository,
}

impl Repository {
    /// Discover the repository containing `path`.
    ///
    /// # Errors
    /// Returns `NotARepository` when neither `path` nor any parent is inside one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = git2::Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::NotARepository
            } else {
                Error::Git2(e)
            }
        })?;
        Ok(Self { inner })
    }

    /// Wrap an already opened git2 repository.
    #[must_use]
    pub const fn from_git2(inner: git2::Repository) -> Self {
        Self { inner }
    }

    /// Working tree root, `None` for bare repositories.
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.inner.workdir()
    }

    /// The `.git` directory, where the per-repository config lives.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.inner.path()
    }

    /// Name of the checked-out branch, including an unborn one.
    ///
    /// # Errors
    /// Returns `DetachedHead` when HEAD does not point at a branch.
    pub fn current_branch(&self) -> Result<String> {
        match self.inner.head() {
            Ok(head) => {
                head.shorthand()
                    .filter(|_| head.is_branch())
                    .map(String::from)
                    .ok_or(Error::DetachedHead)
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                let head = self.inner.find_reference("HEAD")?;
                head.symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .map(String::from)
                    .ok_or(Error::DetachedHead)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn has_local_branch(&self, name: &str) -> bool {
        self.inner.find_branch(name, BranchType::Local).is_ok()
    }

    /// Detect the repository's default branch.
    ///
    /// Looks at `refs/remotes/origin/HEAD` first, then `init.defaultBranch`,
    /// then `main` and `master`.
    ///
    /// # Errors
    /// Returns `NoDefaultBranch` if none of the candidates exist.
    pub fn default_branch(&self) -> Result<String> {
        if let Ok(reference) = self.inner.find_reference("refs/remotes/origin/HEAD") {
            if let Some(name) = reference
                .symbolic_target()
                .and_then(|t| t.strip_prefix("refs/remotes/origin/"))
            {
                return Ok(name.to_string());
            }
        }

        if let Ok(config) = self.inner.config() {
            if let Ok(name) = config.get_string("init.defaultBranch") {
                if self.has_local_branch(&name) {
                    return Ok(name);
                }
            }
        }

        ["main", "master"]
            .into_iter()
            .find(|name| self.has_local_branch(name))
            .map(String::from)
            .ok_or(Error::NoDefaultBranch)
    }

    /// Get the URL of the `origin` remote.
    ///
    /// # Errors
    /// Returns `RemoteNotFound` if there is no origin or it has no URL.
    pub fn origin_url(&self) -> Result<String> {
        let remote = self
            .inner
            .find_remote("origin")
            .map_err(|_| Error::RemoteNotFound("origin".into()))?;

        remote
            .url()
            .map(String::from)
            .ok_or_else(|| Error::RemoteNotFound("origin".into()))
    }

    /// Whether tracked files match HEAD. Untracked files are ignored.
    ///
    /// # Errors
    /// Returns error if the status scan fails.
    pub fn is_clean(&self) -> Result<bool> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(false);
        let statuses = self.inner.statuses(Some(&mut opts))?;
        Ok(statuses.is_empty())
    }

    /// Refuse to continue over uncommitted changes.
    ///
    /// # Errors
    /// Returns `DirtyWorkingDirectory` when tracked files are modified.
    pub fn require_clean(&self) -> Result<()> {
        if self.is_clean()? {
            Ok(())
        } else {
            Err(Error::DirtyWorkingDirectory)
        }
    }

    /// Look up a commit object.
    ///
    /// # Errors
    /// Returns the git2 error when `oid` is missing or not a commit.
    pub fn find_commit(&self, oid: Oid) -> Result<git2::Commit<'_>> {
        Ok(self.inner.find_commit(oid)?)
    }

    /// Resolve a revision (full or abbreviated id, ref name) to a commit id.
    ///
    /// # Errors
    /// Returns `CommitNotFound` if the revision does not name a commit.
    pub fn resolve_commit(&self, spec: &str) -> Result<Oid> {
        self.inner
            .revparse_single(spec)
            .and_then(|obj| obj.peel_to_commit())
            .map(|c| c.id())
            .map_err(|_| Error::CommitNotFound(spec.into()))
    }

    /// Get the first parent of a commit, or `None` for a root commit.
    ///
    /// # Errors
    /// Returns error if the commit cannot be found.
    pub fn first_parent(&self, oid: Oid) -> Result<Option<Oid>> {
        let commit = self.inner.find_commit(oid)?;
        Ok(commit.parent_ids().next())
    }

    /// Get the abbreviated id git would print for a commit.
    ///
    /// # Errors
    /// Returns error if the object cannot be found.
    pub fn short_id(&self, oid: Oid) -> Result<String> {
        let object = self.inner.find_object(oid, None)?;
        let buf = object.short_id()?;
        Ok(buf.as_str().map_or_else(|| oid.to_string(), String::from))
    }

    /// Identity from `user.name` and `user.email`.
    ///
    /// # Errors
    /// Returns error when the identity is not configured.
    pub fn signature(&self) -> Result<Signature<'_>> {
        Ok(self.inner.signature()?)
    }

    /// The wrapped git2 handle, for the history walker and replay.
    #[must_use]
    pub const fn inner(&self) -> &git2::Repository {
        &self.inner
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Repository").field(&self.git_dir()).finish()
    }
}

/// Derive a human-readable repository name from its path.
///
/// `.` is resolved against the current directory; empty or `..` paths fall
/// back to `git-repo`.
#[must_use]
pub fn repo_name(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        return FALLBACK_REPO_NAME.into();
    }

    let resolved: PathBuf = if path == Path::new(".") {
        std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
    } else {
        path.to_path_buf()
    };

    match resolved.file_name().and_then(|n| n.to_str()) {
        Some(name) if !name.is_empty() && name != ".." => name.to_string(),
        _ => FALLBACK_REPO_NAME.into(),
    }
}
