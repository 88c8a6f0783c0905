//! Replay of source commits into a freshly initialized repository.
//!
//! Every replayed commit is a full tree replacement: the source tree is
//! extracted into a scratch directory, the target working tree is emptied,
//! and the scratch contents are copied over before staging everything.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{IndexAddOption, ObjectType, Oid, Signature, TreeWalkMode, TreeWalkResult};
use tempfile::TempDir;

use crate::Repository;
use crate::error::{Error, Result};
use crate::history::{CommitRecord, to_git_time};
use crate::traits::ReplaySink;

const FILE_MODE_EXECUTABLE: i32 = 0o100_755;
const FILE_MODE_LINK: i32 = 0o120_000;

/// Outcome of replaying one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// A new commit was created in the target.
    Committed(Oid),
    /// The tree matched the parent and empty commits are not kept.
    Unchanged,
}

/// Compute the path of a repository placed next to `source` under `name`.
#[must_use]
pub fn sibling_path(source: &Path, name: &str) -> PathBuf {
    let absolute = std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf());
    let parent = absolute
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    parent.join(name)
}

/// Replays commits from a source repository into a new target repository.
pub struct Replayer {
    source: Repository,
    target: Repository,
    keep_empty_commits: bool,
}

impl Replayer {
    /// Create a new, empty target repository at `path`.
    ///
    /// The target's unborn HEAD points at `default_branch`.
    ///
    /// # Errors
    /// Returns `TargetExists` if `path` already exists, or an error if
    /// initialization fails.
    pub fn create(source: Repository, path: &Path, default_branch: &str) -> Result<Self> {
        if path.exists() {
            return Err(Error::TargetExists(path.to_path_buf()));
        }
        fs::create_dir_all(path)?;

        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head(default_branch);
        let target = git2::Repository::init_opts(path, &opts)?;

        Ok(Self {
            source,
            target: Repository::from_git2(target),
            keep_empty_commits: true,
        })
    }

    /// Choose whether commits whose tree equals their parent's are recreated.
    #[must_use]
    pub const fn keep_empty_commits(mut self, keep: bool) -> Self {
        self.keep_empty_commits = keep;
        self
    }

    /// The source repository.
    #[must_use]
    pub const fn source(&self) -> &Repository {
        &self.source
    }

    /// The target repository.
    #[must_use]
    pub const fn target(&self) -> &Repository {
        &self.target
    }

    /// Copy the source's `origin` URL onto the target.
    ///
    /// # Errors
    /// Returns `RemoteNotFound` if the source has no origin, or an error if
    /// the remote cannot be created.
    pub fn copy_origin(&self) -> Result<String> {
        let url = self.source.origin_url()?;
        self.target.inner().remote("origin", &url)?;
        Ok(url)
    }

    /// Replay a single source commit with the given message.
    ///
    /// # Errors
    /// Returns error if extraction, staging or commit creation fails.
    pub fn replay(&self, record: &CommitRecord, message: &str) -> Result<ReplayOutcome> {
        let workdir = self.target.workdir().ok_or(Error::NotARepository)?;
        let oid = Oid::from_str(&record.id).map_err(|_| Error::CommitNotFound(record.id.clone()))?;
        let commit = self.source.find_commit(oid)?;
        let tree = commit.tree()?;

        let scratch = TempDir::new()?;
        extract_tree(self.source.inner(), &tree, scratch.path())?;
        clear_worktree(workdir)?;
        copy_dir(scratch.path(), workdir)?;

        let tree_id = self.stage_all()?;
        let parent = match self.target.inner().head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id && !self.keep_empty_commits {
                return Ok(ReplayOutcome::Unchanged);
            }
        }

        let new_tree = self.target.inner().find_tree(tree_id)?;
        let author = Signature::new(
            &record.author_name,
            &record.author_email,
            &to_git_time(&record.author_time),
        )?;
        let committer = self.committer_signature(record)?;
        let message = clean_message(message);
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let new_oid = self.target.inner().commit(
            Some("HEAD"),
            &author,
            &committer,
            &message,
            &new_tree,
            &parents,
        )?;

        Ok(ReplayOutcome::Committed(new_oid))
    }

    /// Reset the target index to exactly the working tree contents.
    fn stage_all(&self) -> Result<Oid> {
        let mut index = self.target.inner().index()?;
        index.clear()?;
        index.add_all(["*"].iter(), IndexAddOption::FORCE, None)?;
        index.write()?;
        Ok(index.write_tree()?)
    }

    /// The target's configured identity at the original committer time,
    /// falling back to the original committer.
    fn committer_signature(&self, record: &CommitRecord) -> Result<Signature<'static>> {
        let time = to_git_time(&record.committer_time);
        if let Ok(configured) = self.target.signature() {
            if let (Some(name), Some(email)) = (configured.name(), configured.email()) {
                return Ok(Signature::new(name, email, &time)?);
            }
        }
        Ok(Signature::new(
            &record.committer_name,
            &record.committer_email,
            &time,
        )?)
    }
}

impl ReplaySink for Replayer {
    fn apply_commit(&self, commit: &CommitRecord, message: &str) -> Result<ReplayOutcome> {
        self.replay(commit, message)
    }
}

/// Normalize a message the way `git commit` does, keeping empty messages.
fn clean_message(message: &str) -> String {
    match git2::message_prettify(message, None) {
        Ok(cleaned) if !cleaned.is_empty() => cleaned,
        _ => message.to_string(),
    }
}

/// Write every file of `tree` below `dest`.
///
/// Submodule entries cannot be materialized and are skipped.
pub fn extract_tree(repo: &git2::Repository, tree: &git2::Tree<'_>, dest: &Path) -> Result<()> {
    let mut failure: Option<Error> = None;

    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        let name = String::from_utf8_lossy(entry.name_bytes()).into_owned();
        let relative = format!("{root}{name}");
        let path = dest.join(&relative);

        let written = match entry.kind() {
            Some(ObjectType::Tree) => fs::create_dir_all(&path).map_err(Error::from),
            Some(ObjectType::Blob) => repo
                .find_blob(entry.id())
                .map_err(Error::from)
                .and_then(|blob| write_blob(&path, blob.content(), entry.filemode())),
            Some(ObjectType::Commit) => {
                tracing::warn!(path = %relative, "skipping submodule entry");
                Ok(())
            }
            _ => Ok(()),
        };

        match written {
            Ok(()) => TreeWalkResult::Ok,
            Err(e) => {
                failure = Some(Error::Extract {
                    path: relative,
                    message: e.to_string(),
                });
                TreeWalkResult::Abort
            }
        }
    })?;

    failure.map_or(Ok(()), Err)
}

fn write_blob(path: &Path, content: &[u8], filemode: i32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    #[cfg(unix)]
    if filemode == FILE_MODE_LINK {
        let target = String::from_utf8_lossy(content).into_owned();
        std::os::unix::fs::symlink(target, path)?;
        return Ok(());
    }

    fs::write(path, content)?;

    #[cfg(unix)]
    if filemode == FILE_MODE_EXECUTABLE {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }

    #[cfg(not(unix))]
    let _ = (filemode, FILE_MODE_EXECUTABLE, FILE_MODE_LINK);

    Ok(())
}

/// Remove everything in `workdir` except the `.git` directory.
fn clear_worktree(workdir: &Path) -> Result<()> {
    for entry in fs::read_dir(workdir)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        if fs::symlink_metadata(&path)?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Recursively copy `src` into `dst`, keeping permissions and symlinks.
fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            fs::create_dir_all(&to)?;
            copy_dir(&from, &to)?;
        } else if file_type.is_symlink() {
            copy_symlink(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from)?;
    std::os::unix::fs::symlink(target, to)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::history::WalkOptions;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        source_path: PathBuf,
        target_path: PathBuf,
    }

    fn write_and_commit(repo: &git2::Repository, files: &[(&str, Option<&str>)], message: &str, when: i64) {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (path, content) in files {
            let full = workdir.join(path);
            if let Some(content) = content {
                if let Some(parent) = full.parent() {
                    fs::create_dir_all(parent).unwrap();
                }
                fs::write(&full, content).unwrap();
                index.add_path(Path::new(path)).unwrap();
            } else {
                fs::remove_file(&full).unwrap();
                index.remove_path(Path::new(path)).unwrap();
            }
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new("Ada", "ada@example.com", &git2::Time::new(when, 60)).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let source_path = root.path().join("project");
        let repo = git2::Repository::init(&source_path).unwrap();
        write_and_commit(&repo, &[("a.txt", Some("one\n"))], "init", 1_700_000_000);
        write_and_commit(
            &repo,
            &[("a.txt", Some("two\n")), ("dir/old.txt", Some("old\n"))],
            "fix",
            1_700_000_100,
        );
        write_and_commit(
            &repo,
            &[("b.txt", Some("bee\n")), ("dir/old.txt", None)],
            "wip",
            1_700_000_200,
        );
        let target_path = sibling_path(&source_path, "project-rewritten");
        Fixture {
            _root: root,
            source_path,
            target_path,
        }
    }

    fn replay_all(replayer: &Replayer) -> Vec<ReplayOutcome> {
        let history = replayer.source().history(&WalkOptions::default()).unwrap();
        history
            .all
            .iter()
            .map(|c| replayer.replay(c, &format!("chore: {}", c.message)).unwrap())
            .collect()
    }

    #[test]
    fn test_sibling_path() {
        let path = sibling_path(Path::new("/work/project"), "project-rewritten");
        assert_eq!(path, PathBuf::from("/work/project-rewritten"));
    }

    #[test]
    fn test_create_refuses_existing_directory() {
        let fx = fixture();
        fs::create_dir_all(&fx.target_path).unwrap();
        let source = Repository::open(&fx.source_path).unwrap();

        let result = Replayer::create(source, &fx.target_path, "main");
        assert!(matches!(result, Err(Error::TargetExists(_))));
    }

    #[test]
    fn test_replay_reconstructs_history() {
        let fx = fixture();
        let source = Repository::open(&fx.source_path).unwrap();
        let replayer = Replayer::create(source, &fx.target_path, "main").unwrap();

        let outcomes = replay_all(&replayer);
        assert!(outcomes.iter().all(|o| matches!(o, ReplayOutcome::Committed(_))));

        assert_eq!(fs::read_to_string(fx.target_path.join("a.txt")).unwrap(), "two\n");
        assert_eq!(fs::read_to_string(fx.target_path.join("b.txt")).unwrap(), "bee\n");
        assert!(!fx.target_path.join("dir").exists());

        let target = replayer.target();
        assert_eq!(target.current_branch().unwrap(), "main");
        let log = target.log_newest_first().unwrap();
        assert_eq!(log.len(), 3);

        let messages: Vec<String> = log
            .iter()
            .rev()
            .map(|oid| target.find_commit(*oid).unwrap().message().unwrap().trim().to_string())
            .collect();
        assert_eq!(messages, vec!["chore: init", "chore: fix", "chore: wip"]);

        let tip = target.find_commit(log[0]).unwrap();
        assert_eq!(tip.author().name(), Some("Ada"));
        assert_eq!(tip.author().when().seconds(), 1_700_000_200);
        assert_eq!(tip.author().when().offset_minutes(), 60);
        assert_eq!(tip.committer().when().seconds(), 1_700_000_200);
    }

    #[test]
    fn test_identical_tree_is_not_an_error() {
        let fx = fixture();
        let repo = git2::Repository::open(&fx.source_path).unwrap();
        // Commit the same tree again
        write_and_commit(&repo, &[], "noop", 1_700_000_300);
        drop(repo);

        let source = Repository::open(&fx.source_path).unwrap();
        let replayer = Replayer::create(source, &fx.target_path, "main").unwrap();
        let outcomes = replay_all(&replayer);

        assert_eq!(outcomes.len(), 4);
        let ReplayOutcome::Committed(last) = outcomes[3] else {
            panic!("expected a commit");
        };
        let ReplayOutcome::Committed(prev) = outcomes[2] else {
            panic!("expected a commit");
        };
        let target = replayer.target();
        assert_eq!(
            target.find_commit(last).unwrap().tree_id(),
            target.find_commit(prev).unwrap().tree_id()
        );
    }

    #[test]
    fn test_identical_tree_skipped_without_empty_commits() {
        let fx = fixture();
        let repo = git2::Repository::open(&fx.source_path).unwrap();
        write_and_commit(&repo, &[], "noop", 1_700_000_300);
        drop(repo);

        let source = Repository::open(&fx.source_path).unwrap();
        let replayer = Replayer::create(source, &fx.target_path, "main")
            .unwrap()
            .keep_empty_commits(false);
        let outcomes = replay_all(&replayer);

        assert_eq!(outcomes[3], ReplayOutcome::Unchanged);
        assert_eq!(replayer.target().log_newest_first().unwrap().len(), 3);
    }

    #[test]
    fn test_copy_origin() {
        let fx = fixture();
        let source = Repository::open(&fx.source_path).unwrap();
        let replayer = Replayer::create(source, &fx.target_path, "main").unwrap();
        assert!(matches!(replayer.copy_origin(), Err(Error::RemoteNotFound(_))));

        replayer
            .source()
            .inner()
            .remote("origin", "https://example.com/project.git")
            .unwrap();
        assert_eq!(replayer.copy_origin().unwrap(), "https://example.com/project.git");
        assert_eq!(
            replayer.target().origin_url().unwrap(),
            "https://example.com/project.git"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_bit_survives() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        let repo = git2::Repository::open(&fx.source_path).unwrap();
        let script = fx.source_path.join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("run.sh")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Ada", "ada@example.com").unwrap();
        let parent = repo.head().unwrap().peel_to_commit().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "exec", &tree, &[&parent])
            .unwrap();
        drop(tree);
        drop(parent);
        drop(repo);

        let source = Repository::open(&fx.source_path).unwrap();
        let replayer = Replayer::create(source, &fx.target_path, "main").unwrap();
        replay_all(&replayer);

        let mode = fs::metadata(fx.target_path.join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
