//! History walking and rewrite-candidate classification.

use chrono::{DateTime, FixedOffset};
use git2::{Oid, Sort};
use serde::{Deserialize, Serialize};

use crate::Repository;
use crate::diff::{DiffOptions, FileChange};
use crate::error::{Error, Result};

/// Default message length at or below which a commit is rewritten.
pub const DEFAULT_MAX_MSG_LENGTH: usize = 10;

/// Immutable snapshot of a source commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full commit id.
    pub id: String,
    /// Raw commit message.
    pub message: String,
    /// First parent id, `None` for root commits.
    pub parent_id: Option<String>,
    pub author_name: String,
    pub author_email: String,
    pub author_time: DateTime<FixedOffset>,
    pub committer_name: String,
    pub committer_email: String,
    pub committer_time: DateTime<FixedOffset>,
    /// Whether the message is short enough to be rewritten.
    pub needs_rewrite: bool,
}

impl CommitRecord {
    /// First eight characters of the commit id, for display.
    #[must_use]
    pub fn short_id(&self) -> &str {
        &self.id[..8.min(self.id.len())]
    }
}

/// A commit selected for rewriting, with its extracted file changes.
#[derive(Debug, Clone)]
pub struct RewriteCandidate {
    pub commit: CommitRecord,
    pub files: Vec<FileChange>,
}

/// Options for walking history.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Messages with at most this many bytes are rewrite candidates.
    pub max_msg_length: usize,
    /// Diff extraction settings applied to candidates.
    pub diff: DiffOptions,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_msg_length: DEFAULT_MAX_MSG_LENGTH,
            diff: DiffOptions::default(),
        }
    }
}

/// Result of a history walk, oldest commit first.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Every commit reachable from HEAD.
    pub all: Vec<CommitRecord>,
    /// The subsequence of `all` that needs a new message.
    pub to_rewrite: Vec<RewriteCandidate>,
}

/// Check whether a message is short enough to be rewritten.
#[must_use]
pub const fn needs_rewrite(message: &str, max_msg_length: usize) -> bool {
    message.len() <= max_msg_length
}

impl Repository {
    /// List commit ids reachable from HEAD, newest first.
    ///
    /// Children always come before their parents. An unborn HEAD yields an
    /// empty list.
    ///
    /// # Errors
    /// Returns error if the revision walk fails.
    pub fn log_newest_first(&self) -> Result<Vec<Oid>> {
        match self.inner().head() {
            Ok(_) => {}
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut revwalk = self.inner().revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push_head()?;

        revwalk
            .map(|oid| oid.map_err(Error::from))
            .collect()
    }

    /// Snapshot a single commit.
    ///
    /// # Errors
    /// Returns error if the commit cannot be found.
    pub fn commit_record(&self, oid: Oid, max_msg_length: usize) -> Result<CommitRecord> {
        let commit = self.find_commit(oid)?;
        let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();
        let author = commit.author();
        let committer = commit.committer();

        Ok(CommitRecord {
            id: oid.to_string(),
            needs_rewrite: needs_rewrite(&message, max_msg_length),
            message,
            parent_id: commit.parent_ids().next().map(|p| p.to_string()),
            author_name: String::from_utf8_lossy(author.name_bytes()).into_owned(),
            author_email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
            author_time: to_datetime(author.when())?,
            committer_name: String::from_utf8_lossy(committer.name_bytes()).into_owned(),
            committer_email: String::from_utf8_lossy(committer.email_bytes()).into_owned(),
            committer_time: to_datetime(committer.when())?,
        })
    }

    /// Walk the whole history and classify each commit.
    ///
    /// Diffs are only extracted for commits that need rewriting. Any failure
    /// aborts the walk without partial results.
    ///
    /// # Errors
    /// Returns error if traversal, commit lookup or diff extraction fails.
    pub fn history(&self, options: &WalkOptions) -> Result<History> {
        let mut all = Vec::new();
        let mut to_rewrite = Vec::new();

        for oid in self.log_newest_first()? {
            let record = self.commit_record(oid, options.max_msg_length)?;

            if record.needs_rewrite {
                let commit = self.find_commit(oid)?;
                let files = self.file_changes(&commit, &options.diff)?;
                to_rewrite.push(RewriteCandidate {
                    commit: record.clone(),
                    files,
                });
            }

            all.push(record);
        }

        all.reverse();
        to_rewrite.reverse();

        Ok(History { all, to_rewrite })
    }
}

/// Convert a git timestamp into a chrono datetime keeping its UTC offset.
fn to_datetime(time: git2::Time) -> Result<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .ok_or_else(|| Error::InvalidTime(format!("offset {}", time.offset_minutes())))?;
    let utc = DateTime::from_timestamp(time.seconds(), 0)
        .ok_or_else(|| Error::InvalidTime(format!("timestamp {}", time.seconds())))?;
    Ok(utc.with_timezone(&offset))
}

/// Convert a chrono datetime back into a git timestamp.
#[must_use]
pub fn to_git_time(time: &DateTime<FixedOffset>) -> git2::Time {
    git2::Time::new(time.timestamp(), time.offset().local_minus_utc() / 60)
}
