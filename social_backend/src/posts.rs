//! Post lifecycle: `Pending(requires_approval) -> Published -> Deleted`.
//!
//! Every submission starts as a pending record. The call that empties its
//! approval set (or `create`, when nobody has to approve) swaps it for a
//! published record with a fresh id in the same transaction. External
//! references to the pending id must be re-keyed by the caller.

use crate::config::ApprovalPolicy;
use crate::database::models::{PendingPostRecord, PostBody, PostRecord};
use crate::database::repositories::{PendingPostRepository, PostRepository, SqliteRepositories};
use crate::database::Database;
use crate::errors::{SocialError, SocialResult};
use crate::utils::{dedup_ordered, new_id, now_utc_iso};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MSG_PUBLISHED: &str = "Post successfully published!";
pub const MSG_PENDING: &str = "Post is pending approval!";
pub const MSG_STILL_PENDING: &str = "Post approved, still pending other users' approval.";
pub const MSG_REJECTED: &str = "Pending post rejected, will be deleted.";
pub const MSG_DELETED: &str = "Post deleted successfully!";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: String,
    pub authors: Vec<String>,
    pub content: String,
    pub options: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPostView {
    pub id: String,
    pub authors: Vec<String>,
    pub content: String,
    pub options: Option<serde_json::Value>,
    pub requires_approval: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PostState {
    Pending(PendingPostView),
    Published(PostView),
}

impl PostState {
    pub fn id(&self) -> &str {
        match self {
            PostState::Pending(post) => &post.id,
            PostState::Published(post) => &post.id,
        }
    }

    pub fn authors(&self) -> &[String] {
        match self {
            PostState::Pending(post) => &post.authors,
            PostState::Published(post) => &post.authors,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PostState::Published(_))
    }
}

#[derive(Debug, Clone)]
pub struct PostOutcome {
    pub msg: &'static str,
    pub state: PostState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub submitted_by: String,
    /// Co-authors; the submitter is always prepended.
    #[serde(default)]
    pub authors: Vec<String>,
    pub content: String,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

/// What `remove_author_everywhere` took down with the author.
#[derive(Debug, Clone, Default)]
pub struct AuthorRemoval {
    pub deleted_posts: Vec<String>,
    pub deleted_pending: Vec<String>,
}

fn parse_options(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|raw| serde_json::from_str(&raw).ok())
}

impl PostView {
    fn from_record(record: PostRecord) -> Self {
        Self {
            id: record.id,
            authors: record.body.authors,
            content: record.body.content,
            options: parse_options(record.body.options),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl PendingPostView {
    fn from_record(record: PendingPostRecord) -> Self {
        Self {
            id: record.id,
            authors: record.body.authors,
            content: record.body.content,
            options: parse_options(record.body.options),
            requires_approval: record.requires_approval.into_iter().collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    database: Database,
    policy: ApprovalPolicy,
}

impl PostService {
    pub fn new(database: Database, policy: ApprovalPolicy) -> Self {
        Self { database, policy }
    }

    fn initial_approvers(&self, submitter: &str, authors: &[String]) -> BTreeSet<String> {
        if authors.len() <= 1 {
            return BTreeSet::new();
        }
        authors
            .iter()
            .filter(|author| self.policy == ApprovalPolicy::AllAuthors || author.as_str() != submitter)
            .cloned()
            .collect()
    }

    pub fn create(&self, input: CreatePostInput) -> SocialResult<PostOutcome> {
        if input.content.trim().is_empty() {
            return Err(SocialError::bad_request("Post content may not be empty."));
        }
        let authors = dedup_ordered(std::iter::once(input.submitted_by.clone()).chain(input.authors));
        let requires_approval = self.initial_approvers(&input.submitted_by, &authors);
        let options = input
            .options
            .map(|value| serde_json::to_string(&value))
            .transpose()
            .map_err(anyhow::Error::from)?;
        let now = now_utc_iso();
        let record = PendingPostRecord {
            id: new_id(),
            body: PostBody {
                authors,
                content: input.content,
                options,
            },
            requires_approval,
            created_at: now.clone(),
            updated_at: now,
        };

        self.database.with_repositories(|repos| {
            repos.pending_posts().create(&record)?;
            publish_if_ready(&repos, &record.id, MSG_PENDING)
        })
    }

    pub fn approve(&self, post_id: &str, user: &str) -> SocialResult<PostOutcome> {
        self.database.with_repositories(|repos| {
            // Zero rows means the user never had to approve or already did.
            if repos.pending_posts().remove_approver(post_id, user)? == 0 {
                return Err(SocialError::ApprovalNotRequired {
                    post: post_id.to_string(),
                    user: user.to_string(),
                });
            }
            tracing::debug!(post_id = %post_id, user_id = %user, "post approved");
            publish_if_ready(&repos, post_id, MSG_STILL_PENDING)
        })
    }

    pub fn reject(&self, post_id: &str, user: &str) -> SocialResult<&'static str> {
        self.database.with_repositories(|repos| {
            let pending = repos
                .pending_posts()
                .get(post_id)?
                .ok_or_else(|| SocialError::PostNotFound(post_id.to_string()))?;
            if !pending.requires_approval.contains(user) {
                return Err(SocialError::ApprovalNotRequired {
                    post: post_id.to_string(),
                    user: user.to_string(),
                });
            }
            repos.pending_posts().delete(post_id)?;
            tracing::info!(post_id = %post_id, user_id = %user, "pending post rejected");
            Ok(MSG_REJECTED)
        })
    }

    /// Deletes a published post. Missing posts are not an error.
    pub fn delete(&self, post_id: &str) -> SocialResult<&'static str> {
        let removed: usize = self
            .database
            .with_repositories(|repos| repos.posts().delete(post_id))?;
        if removed > 0 {
            tracing::info!(post_id = %post_id, "post deleted");
        }
        Ok(MSG_DELETED)
    }

    /// Drops an abandoned pending post. Missing posts are not an error.
    pub fn discard_pending(&self, post_id: &str) -> SocialResult<()> {
        let _: usize = self
            .database
            .with_repositories(|repos| repos.pending_posts().delete(post_id))?;
        Ok(())
    }

    pub fn is_author(&self, user: &str, post_id: &str) -> SocialResult<()> {
        self.database.with_repositories(|repos| {
            let authors = match repos.posts().get(post_id)? {
                Some(post) => post.body.authors,
                None => match repos.pending_posts().get(post_id)? {
                    Some(pending) => pending.body.authors,
                    None => return Err(SocialError::PostNotFound(post_id.to_string())),
                },
            };
            if !authors.iter().any(|author| author == user) {
                return Err(SocialError::PostAuthorMismatch {
                    user: user.to_string(),
                    post: post_id.to_string(),
                });
            }
            Ok(())
        })
    }

    pub fn get(&self, post_id: &str) -> SocialResult<PostView> {
        self.database.with_repositories(|repos| {
            repos
                .posts()
                .get(post_id)?
                .map(PostView::from_record)
                .ok_or_else(|| SocialError::PostNotFound(post_id.to_string()))
        })
    }

    pub fn get_pending(&self, post_id: &str) -> SocialResult<PendingPostView> {
        self.database.with_repositories(|repos| {
            repos
                .pending_posts()
                .get(post_id)?
                .map(PendingPostView::from_record)
                .ok_or_else(|| SocialError::PostNotFound(post_id.to_string()))
        })
    }

    /// Published posts, newest first.
    pub fn list(&self, author: Option<&str>) -> SocialResult<Vec<PostView>> {
        self.database.with_repositories(|repos| {
            Ok(repos
                .posts()
                .list(author)?
                .into_iter()
                .map(PostView::from_record)
                .collect())
        })
    }

    pub fn list_by_ids(&self, ids: &[String]) -> SocialResult<Vec<PostView>> {
        self.database.with_repositories(|repos| {
            Ok(repos
                .posts()
                .list_by_ids(ids)?
                .into_iter()
                .map(PostView::from_record)
                .collect())
        })
    }

    pub fn list_pending_for(&self, user: &str) -> SocialResult<Vec<PendingPostView>> {
        self.database.with_repositories(|repos| {
            Ok(repos
                .pending_posts()
                .list_for_author(user)?
                .into_iter()
                .map(PendingPostView::from_record)
                .collect())
        })
    }

    /// Takes `user` off every post. Posts they authored alone are deleted,
    /// as are all pending posts they are part of.
    pub fn remove_author_everywhere(&self, user: &str) -> SocialResult<AuthorRemoval> {
        self.database.with_repositories(|repos| {
            let mut removal = AuthorRemoval::default();
            for post in repos.posts().list(Some(user))? {
                if post.body.authors.iter().all(|author| author == user) {
                    repos.posts().delete(&post.id)?;
                    removal.deleted_posts.push(post.id);
                } else {
                    repos.posts().remove_author(&post.id, user)?;
                }
            }
            for pending in repos.pending_posts().list_for_author(user)? {
                repos.pending_posts().delete(&pending.id)?;
                removal.deleted_pending.push(pending.id);
            }
            tracing::info!(
                user_id = %user,
                deleted_posts = removal.deleted_posts.len(),
                deleted_pending = removal.deleted_pending.len(),
                "author removed from posts"
            );
            Ok(removal)
        })
    }
}

/// Publishes `post_id` when nobody is left to approve it; otherwise returns
/// the pending record with `pending_msg`.
fn publish_if_ready(
    repos: &SqliteRepositories<'_>,
    post_id: &str,
    pending_msg: &'static str,
) -> SocialResult<PostOutcome> {
    let pending = repos
        .pending_posts()
        .get(post_id)?
        .ok_or_else(|| SocialError::PostNotFound(post_id.to_string()))?;
    if !pending.requires_approval.is_empty() {
        return Ok(PostOutcome {
            msg: pending_msg,
            state: PostState::Pending(PendingPostView::from_record(pending)),
        });
    }

    let now = now_utc_iso();
    let published = PostRecord {
        id: new_id(),
        body: pending.body,
        created_at: now.clone(),
        updated_at: now,
    };
    repos.pending_posts().publish(post_id, &published)?;
    tracing::info!(
        pending_id = %post_id,
        post_id = %published.id,
        authors = published.body.authors.len(),
        "post published"
    );
    Ok(PostOutcome {
        msg: MSG_PUBLISHED,
        state: PostState::Published(PostView::from_record(published)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service(policy: ApprovalPolicy) -> PostService {
        PostService::new(Database::open_in_memory().expect("in-memory db"), policy)
    }

    fn input(submitter: &str, co_authors: &[&str], content: &str) -> CreatePostInput {
        CreatePostInput {
            submitted_by: submitter.into(),
            authors: co_authors.iter().map(|a| a.to_string()).collect(),
            content: content.into(),
            options: None,
        }
    }

    #[test]
    fn single_author_post_publishes_immediately() {
        let service = setup_service(ApprovalPolicy::CoAuthors);
        let outcome = service.create(input("alice", &[], "hello")).expect("create");
        assert_eq!(outcome.msg, MSG_PUBLISHED);
        let PostState::Published(post) = outcome.state else {
            panic!("expected a published post");
        };
        assert_eq!(post.authors, vec!["alice"]);
        assert!(service.list_pending_for("alice").unwrap().is_empty());
        assert_eq!(service.list(Some("alice")).unwrap().len(), 1);
    }

    #[test]
    fn submitter_listed_as_coauthor_stays_single_author() {
        let service = setup_service(ApprovalPolicy::AllAuthors);
        let outcome = service.create(input("alice", &["alice"], "solo")).unwrap();
        assert!(outcome.state.is_published());
        assert_eq!(outcome.state.authors(), ["alice".to_string()]);
    }

    #[test]
    fn group_post_needs_every_coauthor() {
        let service = setup_service(ApprovalPolicy::CoAuthors);
        let outcome = service
            .create(input("alice", &["bob", "carol"], "group"))
            .unwrap();
        assert_eq!(outcome.msg, MSG_PENDING);
        let PostState::Pending(pending) = outcome.state else {
            panic!("expected a pending post");
        };
        assert_eq!(pending.requires_approval, vec!["bob", "carol"]);

        let first = service.approve(&pending.id, "bob").unwrap();
        assert_eq!(first.msg, MSG_STILL_PENDING);
        assert!(!first.state.is_published());
        assert!(service.list(None).unwrap().is_empty());

        let second = service.approve(&pending.id, "carol").unwrap();
        assert_eq!(second.msg, MSG_PUBLISHED);
        let PostState::Published(post) = second.state else {
            panic!("expected a published post");
        };
        assert_ne!(post.id, pending.id);
        assert_eq!(post.authors, vec!["alice", "bob", "carol"]);
        assert!(matches!(
            service.get_pending(&pending.id),
            Err(SocialError::PostNotFound(_))
        ));
    }

    #[test]
    fn approving_twice_or_as_outsider_is_rejected() {
        let service = setup_service(ApprovalPolicy::CoAuthors);
        let outcome = service
            .create(input("alice", &["bob", "carol"], "group"))
            .unwrap();
        let pending_id = outcome.state.id().to_string();

        service.approve(&pending_id, "bob").unwrap();
        assert!(matches!(
            service.approve(&pending_id, "bob"),
            Err(SocialError::ApprovalNotRequired { .. })
        ));
        assert!(matches!(
            service.approve(&pending_id, "alice"),
            Err(SocialError::ApprovalNotRequired { .. })
        ));
        assert!(matches!(
            service.approve(&pending_id, "mallory"),
            Err(SocialError::ApprovalNotRequired { .. })
        ));
    }

    #[test]
    fn all_authors_policy_includes_submitter() {
        let service = setup_service(ApprovalPolicy::AllAuthors);
        let outcome = service.create(input("alice", &["bob"], "group")).unwrap();
        let PostState::Pending(pending) = outcome.state else {
            panic!("expected a pending post");
        };
        assert_eq!(pending.requires_approval, vec!["alice", "bob"]);
        assert!(!service.approve(&pending.id, "bob").unwrap().state.is_published());
        assert!(service.approve(&pending.id, "alice").unwrap().state.is_published());
    }

    #[test]
    fn rejection_kills_the_whole_post() {
        let service = setup_service(ApprovalPolicy::CoAuthors);
        let outcome = service
            .create(input("alice", &["bob", "carol"], "group"))
            .unwrap();
        let pending_id = outcome.state.id().to_string();
        service.approve(&pending_id, "bob").unwrap();

        assert!(matches!(
            service.reject(&pending_id, "bob"),
            Err(SocialError::ApprovalNotRequired { .. })
        ));
        assert_eq!(service.reject(&pending_id, "carol").unwrap(), MSG_REJECTED);

        assert!(matches!(
            service.reject(&pending_id, "carol"),
            Err(SocialError::PostNotFound(_))
        ));
        assert!(matches!(
            service.approve(&pending_id, "carol"),
            Err(SocialError::ApprovalNotRequired { .. })
        ));
        assert!(service.list(None).unwrap().is_empty());
    }

    #[test]
    fn is_author_checks_published_then_pending() {
        let service = setup_service(ApprovalPolicy::CoAuthors);
        let published = service.create(input("alice", &[], "mine")).unwrap();
        let pending = service.create(input("alice", &["bob"], "ours")).unwrap();

        service.is_author("alice", published.state.id()).unwrap();
        service.is_author("bob", pending.state.id()).unwrap();
        assert!(matches!(
            service.is_author("bob", published.state.id()),
            Err(SocialError::PostAuthorMismatch { .. })
        ));
        assert!(matches!(
            service.is_author("alice", "missing"),
            Err(SocialError::PostNotFound(_))
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let service = setup_service(ApprovalPolicy::CoAuthors);
        let outcome = service.create(input("alice", &[], "bye")).unwrap();
        let id = outcome.state.id().to_string();
        assert_eq!(service.delete(&id).unwrap(), MSG_DELETED);
        assert_eq!(service.delete(&id).unwrap(), MSG_DELETED);
        assert!(matches!(service.get(&id), Err(SocialError::PostNotFound(_))));
    }

    #[test]
    fn options_round_trip_as_json() {
        let service = setup_service(ApprovalPolicy::CoAuthors);
        let mut request = input("alice", &[], "pic");
        request.options = Some(serde_json::json!({ "imageURL": "https://example.com/a.png" }));
        let outcome = service.create(request).unwrap();
        let post = service.get(outcome.state.id()).unwrap();
        assert_eq!(
            post.options,
            Some(serde_json::json!({ "imageURL": "https://example.com/a.png" }))
        );
    }

    #[test]
    fn empty_content_is_a_bad_request() {
        let service = setup_service(ApprovalPolicy::CoAuthors);
        assert!(matches!(
            service.create(input("alice", &[], "   ")),
            Err(SocialError::BadRequest(_))
        ));
    }

    #[test]
    fn removing_an_author_everywhere() {
        let service = setup_service(ApprovalPolicy::CoAuthors);
        let solo = service.create(input("bob", &[], "solo")).unwrap();
        let shared = service.create(input("alice", &["bob"], "shared")).unwrap();
        let shared_id = shared.state.id().to_string();
        let published_shared = service.approve(&shared_id, "bob").unwrap();
        let pending = service.create(input("carol", &["bob"], "pending")).unwrap();

        let removal = service.remove_author_everywhere("bob").unwrap();
        assert_eq!(removal.deleted_posts, vec![solo.state.id().to_string()]);
        assert_eq!(removal.deleted_pending, vec![pending.state.id().to_string()]);

        let remaining = service.get(published_shared.state.id()).unwrap();
        assert_eq!(remaining.authors, vec!["alice"]);
    }
}
