//! Client-facing shapes: user ids swapped for usernames.

use crate::comments::CommentView;
use crate::errors::SocialResult;
use crate::friends::{FriendRequestView, RequestStatus};
use crate::identity::{UserService, DELETED_USER};
use crate::posts::{PendingPostView, PostState, PostView};
use crate::sharing::SharingView;
use crate::user_lists::UserListView;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub authors: Vec<String>,
    pub content: String,
    pub options: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPostResponse {
    pub id: String,
    pub authors: Vec<String>,
    pub content: String,
    pub options: Option<serde_json::Value>,
    pub requires_approval: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PostStateResponse {
    Pending(PendingPostResponse),
    Published(PostResponse),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingResponse {
    pub id: String,
    pub resource: String,
    pub owners: Vec<String>,
    pub allow_requests: bool,
    pub requested_access: Vec<String>,
    /// Usernames granted directly.
    pub with_access: Vec<String>,
    /// List ids granted.
    pub with_lists: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub author: String,
    pub content: String,
    pub target: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub members: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestResponse {
    pub from: String,
    pub to: String,
    pub status: RequestStatus,
    pub created_at: String,
}

/// Batches id lookups per response.
pub struct Responses<'a> {
    users: &'a UserService,
}

/// Usernames fetched once for a whole response.
struct Names(HashMap<String, String>);

impl Names {
    fn one(&self, id: &str) -> String {
        self.0
            .get(id)
            .cloned()
            .unwrap_or_else(|| DELETED_USER.to_string())
    }

    fn many(&self, ids: &[String]) -> Vec<String> {
        ids.iter().map(|id| self.one(id)).collect()
    }
}

impl<'a> Responses<'a> {
    pub fn new(users: &'a UserService) -> Self {
        Self { users }
    }

    fn names<'i, I>(&self, ids: I) -> SocialResult<Names>
    where
        I: IntoIterator<Item = &'i String>,
    {
        let mut ids: Vec<String> = ids.into_iter().cloned().collect();
        ids.sort();
        ids.dedup();
        Ok(Names(self.users.usernames_for(&ids)?))
    }

    pub fn usernames(&self, ids: &[String]) -> SocialResult<Vec<String>> {
        Ok(self.names(ids)?.many(ids))
    }

    pub fn posts(&self, posts: Vec<PostView>) -> SocialResult<Vec<PostResponse>> {
        let names = self.names(posts.iter().flat_map(|post| &post.authors))?;
        Ok(posts
            .into_iter()
            .map(|post| published_response(&names, post))
            .collect())
    }

    pub fn pending_posts(&self, posts: Vec<PendingPostView>) -> SocialResult<Vec<PendingPostResponse>> {
        let names = self.names(
            posts
                .iter()
                .flat_map(|post| post.authors.iter().chain(&post.requires_approval)),
        )?;
        Ok(posts
            .into_iter()
            .map(|post| pending_response(&names, post))
            .collect())
    }

    pub fn post_state(&self, state: PostState) -> SocialResult<PostStateResponse> {
        Ok(match state {
            PostState::Published(post) => {
                let names = self.names(&post.authors)?;
                PostStateResponse::Published(published_response(&names, post))
            }
            PostState::Pending(post) => {
                let names = self.names(post.authors.iter().chain(&post.requires_approval))?;
                PostStateResponse::Pending(pending_response(&names, post))
            }
        })
    }

    /// Grantees that are not users are reported as list ids.
    pub fn sharing(&self, records: Vec<SharingView>) -> SocialResult<Vec<SharingResponse>> {
        let names = self.names(records.iter().flat_map(|record| {
            record
                .owners
                .iter()
                .chain(&record.requested_access)
                .chain(&record.with_access)
        }))?;
        Ok(records
            .into_iter()
            .map(|record| {
                let (with_access, with_lists): (Vec<String>, Vec<String>) = record
                    .with_access
                    .into_iter()
                    .partition(|member| names.0.contains_key(member));
                SharingResponse {
                    id: record.id,
                    resource: record.resource,
                    owners: names.many(&record.owners),
                    allow_requests: record.allow_requests,
                    requested_access: names.many(&record.requested_access),
                    with_access: names.many(&with_access),
                    with_lists,
                    created_at: record.created_at,
                    updated_at: record.updated_at,
                }
            })
            .collect())
    }

    pub fn comments(&self, comments: Vec<CommentView>) -> SocialResult<Vec<CommentResponse>> {
        let names = self.names(comments.iter().map(|comment| &comment.author))?;
        Ok(comments
            .into_iter()
            .map(|comment| CommentResponse {
                author: names.one(&comment.author),
                id: comment.id,
                content: comment.content,
                target: comment.target,
                created_at: comment.created_at,
                updated_at: comment.updated_at,
            })
            .collect())
    }

    pub fn comment(&self, comment: CommentView) -> SocialResult<CommentResponse> {
        let mut converted = self.comments(vec![comment])?;
        Ok(converted.remove(0))
    }

    pub fn lists(&self, lists: Vec<UserListView>) -> SocialResult<Vec<UserListResponse>> {
        let names = self.names(
            lists
                .iter()
                .flat_map(|list| std::iter::once(&list.owner).chain(&list.members)),
        )?;
        Ok(lists
            .into_iter()
            .map(|list| UserListResponse {
                owner: names.one(&list.owner),
                members: names.many(&list.members),
                id: list.id,
                name: list.name,
                created_at: list.created_at,
                updated_at: list.updated_at,
            })
            .collect())
    }

    pub fn list(&self, list: UserListView) -> SocialResult<UserListResponse> {
        let mut converted = self.lists(vec![list])?;
        Ok(converted.remove(0))
    }

    pub fn friend_requests(&self, requests: Vec<FriendRequestView>) -> SocialResult<Vec<FriendRequestResponse>> {
        let names = self.names(
            requests
                .iter()
                .flat_map(|request| [&request.from, &request.to]),
        )?;
        Ok(requests
            .into_iter()
            .map(|request| FriendRequestResponse {
                from: names.one(&request.from),
                to: names.one(&request.to),
                status: request.status,
                created_at: request.created_at,
            })
            .collect())
    }
}

fn published_response(names: &Names, post: PostView) -> PostResponse {
    PostResponse {
        authors: names.many(&post.authors),
        id: post.id,
        content: post.content,
        options: post.options,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

fn pending_response(names: &Names, post: PendingPostView) -> PendingPostResponse {
    PendingPostResponse {
        authors: names.many(&post.authors),
        requires_approval: names.many(&post.requires_approval),
        id: post.id,
        content: post.content,
        options: post.options,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn sharing_splits_users_from_lists() {
        let users = UserService::new(Database::open_in_memory().expect("in-memory db"));
        let alice = users.create("alice", "pw").unwrap();
        let record = SharingView {
            id: "rec-1".into(),
            resource: "post-1".into(),
            owners: vec![alice.id.clone()],
            allow_requests: true,
            requested_access: vec![],
            with_access: vec![alice.id.clone(), "list-1".into()],
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
        };

        let responses = Responses::new(&users);
        let converted = responses.sharing(vec![record]).unwrap();
        assert_eq!(converted[0].owners, vec!["alice"]);
        assert_eq!(converted[0].with_access, vec!["alice"]);
        assert_eq!(converted[0].with_lists, vec!["list-1"]);
    }

    #[test]
    fn missing_users_render_as_deleted() {
        let users = UserService::new(Database::open_in_memory().expect("in-memory db"));
        let bob = users.create("bob", "pw").unwrap();
        let responses = Responses::new(&users);
        assert_eq!(
            responses.usernames(&[bob.id, "gone".into()]).unwrap(),
            vec!["bob".to_string(), DELETED_USER.to_string()]
        );
    }
}
