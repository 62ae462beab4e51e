use crate::database::models::CommentRecord;
use crate::database::repositories::CommentRepository;
use crate::database::Database;
use crate::errors::{SocialError, SocialResult};
use crate::utils::{new_id, now_utc_iso};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: String,
    pub author: String,
    pub content: String,
    pub target: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CommentRecord> for CommentView {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            author: record.author,
            content: record.content,
            target: record.target,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct CommentService {
    database: Database,
}

impl CommentService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create(&self, author: &str, content: &str, target: &str) -> SocialResult<CommentView> {
        if content.trim().is_empty() {
            return Err(SocialError::bad_request("Comment content may not be empty."));
        }
        let now = now_utc_iso();
        let record = CommentRecord {
            id: new_id(),
            author: author.to_string(),
            content: content.to_string(),
            target: target.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        let _: () = self
            .database
            .with_repositories(|repos| repos.comments().create(&record))?;
        tracing::info!(comment_id = %record.id, target = %record.target, "comment created");
        Ok(record.into())
    }

    pub fn get(&self, comment_id: &str) -> SocialResult<CommentView> {
        self.database.with_repositories(|repos| {
            repos
                .comments()
                .get(comment_id)?
                .map(CommentView::from)
                .ok_or_else(|| SocialError::CommentNotFound(comment_id.to_string()))
        })
    }

    /// Newest first.
    pub fn by_target(&self, target: &str) -> SocialResult<Vec<CommentView>> {
        self.database.with_repositories(|repos| {
            Ok(repos
                .comments()
                .list_for_target(target)?
                .into_iter()
                .map(CommentView::from)
                .collect())
        })
    }

    pub fn is_author(&self, user: &str, comment_id: &str) -> SocialResult<()> {
        let comment = self.get(comment_id)?;
        if comment.author != user {
            return Err(SocialError::CommentAuthorMismatch {
                user: user.to_string(),
                comment: comment_id.to_string(),
            });
        }
        Ok(())
    }

    /// Moves comments left on a pending post onto its published id.
    pub fn retarget(&self, old_target: &str, new_target: &str) -> SocialResult<usize> {
        let moved: usize = self
            .database
            .with_repositories(|repos| repos.comments().set_target(old_target, new_target))?;
        if moved > 0 {
            tracing::info!(old_target = %old_target, new_target = %new_target, moved, "comments re-targeted");
        }
        Ok(moved)
    }

    /// Idempotent.
    pub fn delete(&self, comment_id: &str) -> SocialResult<&'static str> {
        let _: usize = self
            .database
            .with_repositories(|repos| repos.comments().delete(comment_id))?;
        Ok("Comment deleted successfully!")
    }

    /// Deletes every comment on `target`; returns their ids.
    pub fn delete_by_target(&self, target: &str) -> SocialResult<Vec<String>> {
        self.database.with_repositories(|repos| {
            let comments = repos.comments();
            let mut removed = Vec::new();
            for comment in comments.list_for_target(target)? {
                comments.delete(&comment.id)?;
                removed.push(comment.id);
            }
            Ok(removed)
        })
    }

    pub fn delete_by_author(&self, author: &str) -> SocialResult<Vec<String>> {
        self.database.with_repositories(|repos| {
            let comments = repos.comments();
            let mut removed = Vec::new();
            for comment in comments.list_for_author(author)? {
                comments.delete(&comment.id)?;
                removed.push(comment.id);
            }
            Ok(removed)
        })
    }
}
