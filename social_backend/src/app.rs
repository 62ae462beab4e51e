//! Route flows. `SocialApp` sequences the independent services for each
//! request: handle resolution, authorization checks, post publication with
//! sharing re-keying, and cascading cleanup.

use crate::comments::{CommentService, CommentView};
use crate::config::SocialConfig;
use crate::database::Database;
use crate::errors::{SocialError, SocialResult};
use crate::friends::{FriendRequestView, FriendService};
use crate::identity::{HandleResolver, UserService, UserUpdate, UserView};
use crate::posts::{CreatePostInput, PendingPostView, PostOutcome, PostService, PostState, PostView};
use crate::sessions::SessionService;
use crate::sharing::{SharingService, SharingView, COMMENTS_SCOPE, POSTS_SCOPE};
use crate::user_lists::{UserListService, UserListView};
use crate::utils::dedup_ordered;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub content: String,
    /// Co-author usernames.
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    #[serde(default)]
    pub allow_requests: bool,
    /// Usernames granted access on top of the authors.
    #[serde(default)]
    pub share_with_users: Vec<String>,
    /// User list ids granted access.
    #[serde(default)]
    pub share_with_lists: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    /// Empty together with `share_with_lists` means "whoever can see the post".
    #[serde(default)]
    pub share_with_users: Vec<String>,
    #[serde(default)]
    pub share_with_lists: Vec<String>,
}

#[derive(Clone)]
pub struct SocialApp {
    pub users: UserService,
    pub sessions: SessionService,
    pub posts: PostService,
    pub post_sharing: SharingService,
    pub comments: CommentService,
    pub comment_sharing: SharingService,
    pub lists: UserListService,
    pub friends: FriendService,
}

impl SocialApp {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: UserService,
        sessions: SessionService,
        posts: PostService,
        post_sharing: SharingService,
        comments: CommentService,
        comment_sharing: SharingService,
        lists: UserListService,
        friends: FriendService,
    ) -> Self {
        Self {
            users,
            sessions,
            posts,
            post_sharing,
            comments,
            comment_sharing,
            lists,
            friends,
        }
    }

    /// Wires every service against one database.
    pub fn from_database(database: Database, config: &SocialConfig) -> Self {
        Self::new(
            UserService::new(database.clone()),
            SessionService::new(database.clone()),
            PostService::new(database.clone(), config.posts.approval_policy),
            SharingService::new(database.clone(), POSTS_SCOPE),
            CommentService::new(database.clone()),
            SharingService::new(database.clone(), COMMENTS_SCOPE),
            UserListService::new(database.clone()),
            FriendService::new(database),
        )
    }

    // Sessions and users

    pub fn current_user(&self, token: Option<&str>) -> SocialResult<String> {
        self.sessions.user_for(token)
    }

    pub fn register(&self, token: Option<&str>, username: &str, password: &str) -> SocialResult<UserView> {
        self.sessions.ensure_logged_out(token)?;
        self.users.create(username, password)
    }

    /// Returns the new session token.
    pub fn login(&self, token: Option<&str>, username: &str, password: &str) -> SocialResult<String> {
        self.sessions.ensure_logged_out(token)?;
        let user = self.users.authenticate(username, password)?;
        self.sessions.start(&user.id)
    }

    pub fn logout(&self, token: Option<&str>) -> SocialResult<()> {
        self.sessions.user_for(token)?;
        if let Some(token) = token {
            self.sessions.end(token)?;
        }
        Ok(())
    }

    pub fn update_user(&self, user: &str, update: UserUpdate) -> SocialResult<UserView> {
        self.users.update(user, update)
    }

    /// Removes the user and everything that only made sense with them.
    pub fn delete_user(&self, user: &str) -> SocialResult<()> {
        self.users.get_by_id(user)?;

        let removal = self.posts.remove_author_everywhere(user)?;
        for post_id in removal.deleted_posts.iter().chain(&removal.deleted_pending) {
            self.drop_post_dependents(post_id)?;
        }
        for resource in self.post_sharing.remove_member_everywhere(user)? {
            // Only reachable for posts the user authored alone.
            self.drop_post_dependents(&resource)?;
        }

        for comment_id in self.comments.delete_by_author(user)? {
            self.comment_sharing.delete_by_resource_id(&comment_id)?;
        }
        for comment_id in self.comment_sharing.remove_member_everywhere(user)? {
            self.comments.delete(&comment_id)?;
        }

        for list_id in self.lists.remove_user(user)? {
            self.forget_list(&list_id)?;
        }
        self.friends.remove_user(user)?;
        self.sessions.end_all_for(user)?;
        self.users.delete(user)?;
        tracing::info!(user_id = %user, "user and dependents removed");
        Ok(())
    }

    // Posts

    pub fn list_posts(&self, author: Option<&str>) -> SocialResult<Vec<PostView>> {
        match author {
            Some(username) => {
                let author = self.users.handle_to_id(username)?;
                self.posts.list(Some(&author))
            }
            None => self.posts.list(None),
        }
    }

    pub fn pending_posts(&self, user: &str) -> SocialResult<Vec<PendingPostView>> {
        self.posts.list_pending_for(user)
    }

    /// Published posts shared with `user` directly or through a list.
    pub fn accessible_posts(&self, user: &str) -> SocialResult<Vec<PostView>> {
        let targets = self.access_targets(user)?;
        let resources: Vec<String> = self
            .post_sharing
            .get_resources_by_accessible(&targets)?
            .into_iter()
            .map(|record| record.resource)
            .collect();
        self.posts.list_by_ids(&resources)
    }

    /// Creates the post and its sharing record. A failed sharing write
    /// takes the post back down.
    pub fn create_post(&self, user: &str, request: NewPost) -> SocialResult<PostOutcome> {
        let co_authors = self.users.handles_to_ids(&request.authors)?;
        let grantees = self.resolve_grantees(&request.share_with_users, &request.share_with_lists)?;

        let outcome = self.posts.create(CreatePostInput {
            submitted_by: user.to_string(),
            authors: co_authors,
            content: request.content,
            options: request.options,
        })?;

        let post_id = outcome.state.id().to_string();
        let owners = outcome.state.authors().to_vec();
        if let Err(err) = self
            .post_sharing
            .limit_sharing(owners, &post_id, request.allow_requests, grantees)
        {
            tracing::warn!(post_id = %post_id, error = %err, "sharing setup failed, removing post");
            match outcome.state {
                PostState::Published(_) => {
                    self.posts.delete(&post_id)?;
                }
                PostState::Pending(_) => self.posts.discard_pending(&post_id)?,
            }
            return Err(err);
        }
        Ok(outcome)
    }

    /// Approves and, once the last approval lands, moves the sharing record
    /// and any comments onto the published id. A failed move leaves the post
    /// published and is reported as a store error.
    pub fn approve_post(&self, user: &str, post_id: &str) -> SocialResult<PostOutcome> {
        let outcome = self.posts.approve(post_id, user)?;
        if let PostState::Published(post) = &outcome.state {
            if let Err(err) = self.rekey_published(post_id, &post.id) {
                tracing::error!(
                    pending_id = %post_id,
                    post_id = %post.id,
                    error = %err,
                    "published post could not be re-keyed"
                );
                return Err(err);
            }
        }
        Ok(outcome)
    }

    fn rekey_published(&self, pending_id: &str, post_id: &str) -> SocialResult<()> {
        let moved = self.post_sharing.update_resource(pending_id, post_id)?;
        if moved == 0 {
            tracing::warn!(
                pending_id = %pending_id,
                post_id = %post_id,
                "published post had no sharing record to re-key"
            );
        }
        self.comments.retarget(pending_id, post_id)?;
        Ok(())
    }

    pub fn reject_post(&self, user: &str, post_id: &str) -> SocialResult<&'static str> {
        let msg = self.posts.reject(post_id, user)?;
        self.drop_post_dependents(post_id)?;
        Ok(msg)
    }

    /// Author-only. Pending posts are withdrawn, published ones deleted.
    pub fn delete_post(&self, user: &str, post_id: &str) -> SocialResult<&'static str> {
        self.posts.is_author(user, post_id)?;
        self.posts.discard_pending(post_id)?;
        let msg = self.posts.delete(post_id)?;
        self.drop_post_dependents(post_id)?;
        Ok(msg)
    }

    /// Fails unless `user` is granted the post directly or through a list.
    pub fn ensure_can_view(&self, user: &str, post_id: &str) -> SocialResult<SharingView> {
        let record = self.post_sharing.get_by_resource(post_id)?;
        let targets = self.access_targets(user)?;
        if !targets.iter().any(|target| record.grants(target)) {
            return Err(SocialError::AccessDoesNotExist {
                record: record.id,
                user: user.to_string(),
            });
        }
        Ok(record)
    }

    fn drop_post_dependents(&self, post_id: &str) -> SocialResult<()> {
        self.post_sharing.delete_by_resource_id(post_id)?;
        for comment_id in self.comments.delete_by_target(post_id)? {
            self.comment_sharing.delete_by_resource_id(&comment_id)?;
        }
        Ok(())
    }

    // Sharing

    pub fn owned_sharing(&self, user: &str, scope: &str) -> SocialResult<Vec<SharingView>> {
        match scope {
            POSTS_SCOPE => self.post_sharing.get_resources_by_owner(user),
            COMMENTS_SCOPE => self.comment_sharing.get_resources_by_owner(user),
            other => Err(SocialError::bad_request(format!("Unknown sharing scope {other}."))),
        }
    }

    pub fn request_post_access(&self, user: &str, post_id: &str) -> SocialResult<&'static str> {
        let record = self.post_sharing.get_by_resource(post_id)?;
        self.post_sharing.request_access(&record.id, user)
    }

    pub fn grant_post_access(&self, owner: &str, post_id: &str, username: &str) -> SocialResult<&'static str> {
        let record = self.owned_post_record(owner, post_id)?;
        let member = self.users.handle_to_id(username)?;
        self.post_sharing.add_access(&record.id, &member)
    }

    pub fn revoke_post_access(&self, owner: &str, post_id: &str, username: &str) -> SocialResult<&'static str> {
        let record = self.owned_post_record(owner, post_id)?;
        let member = self.users.handle_to_id(username)?;
        self.post_sharing.remove_access(&record.id, &member)
    }

    pub fn grant_post_list(&self, owner: &str, post_id: &str, list_id: &str) -> SocialResult<&'static str> {
        let record = self.owned_post_record(owner, post_id)?;
        self.lists.get(list_id)?;
        self.post_sharing.add_access(&record.id, list_id)
    }

    pub fn revoke_post_list(&self, owner: &str, post_id: &str, list_id: &str) -> SocialResult<&'static str> {
        let record = self.owned_post_record(owner, post_id)?;
        self.post_sharing.remove_access(&record.id, list_id)
    }

    fn owned_post_record(&self, owner: &str, post_id: &str) -> SocialResult<SharingView> {
        let record = self.post_sharing.get_by_resource(post_id)?;
        self.post_sharing.is_owner(owner, &record.id)?;
        Ok(record)
    }

    // Comments

    /// Comments on a visible post that are shared with `user`.
    pub fn comments_for_post(&self, user: &str, post_id: &str) -> SocialResult<Vec<CommentView>> {
        self.ensure_can_view(user, post_id)?;
        let targets = self.access_targets(user)?;
        let visible: Vec<String> = self
            .comment_sharing
            .get_resources_by_accessible(&targets)?
            .into_iter()
            .map(|record| record.resource)
            .collect();
        Ok(self
            .comments
            .by_target(post_id)?
            .into_iter()
            .filter(|comment| comment.author == user || visible.contains(&comment.id))
            .collect())
    }

    pub fn create_comment(&self, user: &str, post_id: &str, request: NewComment) -> SocialResult<CommentView> {
        let post_record = self.ensure_can_view(user, post_id)?;
        let grantees = if request.share_with_users.is_empty() && request.share_with_lists.is_empty() {
            post_record.with_access
        } else {
            self.resolve_grantees(&request.share_with_users, &request.share_with_lists)?
        };

        let comment = self.comments.create(user, &request.content, post_id)?;
        if let Err(err) = self
            .comment_sharing
            .limit_sharing(vec![user.to_string()], &comment.id, false, grantees)
        {
            tracing::warn!(comment_id = %comment.id, error = %err, "sharing setup failed, removing comment");
            self.comments.delete(&comment.id)?;
            return Err(err);
        }
        Ok(comment)
    }

    pub fn delete_comment(&self, user: &str, comment_id: &str) -> SocialResult<&'static str> {
        self.comments.is_author(user, comment_id)?;
        let msg = self.comments.delete(comment_id)?;
        self.comment_sharing.delete_by_resource_id(comment_id)?;
        Ok(msg)
    }

    // User lists

    pub fn lists_owned_by(&self, user: &str) -> SocialResult<Vec<UserListView>> {
        self.lists.lists_owned_by(user)
    }

    pub fn create_list(&self, user: &str, name: &str, members: &[String]) -> SocialResult<UserListView> {
        let members = self.users.handles_to_ids(members)?;
        self.lists.create(user, name, members)
    }

    pub fn rename_list(&self, user: &str, list_id: &str, name: &str) -> SocialResult<&'static str> {
        self.lists.is_owner(user, list_id)?;
        self.lists.rename(list_id, name)
    }

    pub fn delete_list(&self, user: &str, list_id: &str) -> SocialResult<&'static str> {
        self.lists.is_owner(user, list_id)?;
        let msg = self.lists.delete(list_id)?;
        self.forget_list(list_id)?;
        Ok(msg)
    }

    pub fn add_list_member(&self, user: &str, list_id: &str, username: &str) -> SocialResult<&'static str> {
        self.lists.is_owner(user, list_id)?;
        let member = self.users.handle_to_id(username)?;
        self.lists.add_member(list_id, &member)
    }

    pub fn remove_list_member(&self, user: &str, list_id: &str, username: &str) -> SocialResult<&'static str> {
        self.lists.is_owner(user, list_id)?;
        let member = self.users.handle_to_id(username)?;
        self.lists.remove_member(list_id, &member)
    }

    fn forget_list(&self, list_id: &str) -> SocialResult<()> {
        self.post_sharing.remove_member_everywhere(list_id)?;
        self.comment_sharing.remove_member_everywhere(list_id)?;
        Ok(())
    }

    // Friends

    pub fn friends_of(&self, user: &str) -> SocialResult<Vec<String>> {
        self.friends.friends_of(user)
    }

    pub fn remove_friend(&self, user: &str, friend: &str) -> SocialResult<&'static str> {
        let friend = self.users.handle_to_id(friend)?;
        self.friends.remove_friend(user, &friend)
    }

    pub fn friend_requests(&self, user: &str) -> SocialResult<Vec<FriendRequestView>> {
        self.friends.requests_for(user)
    }

    pub fn send_friend_request(&self, user: &str, to: &str) -> SocialResult<&'static str> {
        let to = self.users.handle_to_id(to)?;
        self.friends.send_request(user, &to)
    }

    pub fn remove_friend_request(&self, user: &str, to: &str) -> SocialResult<&'static str> {
        let to = self.users.handle_to_id(to)?;
        self.friends.remove_request(user, &to)
    }

    pub fn accept_friend_request(&self, user: &str, from: &str) -> SocialResult<&'static str> {
        let from = self.users.handle_to_id(from)?;
        self.friends.accept_request(&from, user)
    }

    pub fn reject_friend_request(&self, user: &str, from: &str) -> SocialResult<&'static str> {
        let from = self.users.handle_to_id(from)?;
        self.friends.reject_request(&from, user)
    }

    // Helpers

    /// The user's own id followed by every list they belong to.
    fn access_targets(&self, user: &str) -> SocialResult<Vec<String>> {
        let mut targets = vec![user.to_string()];
        targets.extend(self.lists.lists_containing(user)?);
        Ok(targets)
    }

    fn resolve_grantees(&self, usernames: &[String], list_ids: &[String]) -> SocialResult<Vec<String>> {
        let mut grantees = self.users.handles_to_ids(usernames)?;
        for list_id in list_ids {
            grantees.push(self.lists.get(list_id)?.id);
        }
        Ok(dedup_ordered(grantees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApprovalPolicy, SocialPaths};
    use crate::posts::{MSG_PENDING, MSG_PUBLISHED};

    fn setup_app() -> SocialApp {
        setup_app_with_database().0
    }

    fn setup_app_with_database() -> (SocialApp, Database) {
        let database = Database::open_in_memory().expect("in-memory db");
        let mut config = SocialConfig::new(0, SocialPaths::from_base_dir(".").expect("paths"));
        config.posts.approval_policy = ApprovalPolicy::CoAuthors;
        (SocialApp::from_database(database.clone(), &config), database)
    }

    fn group_post(app: &SocialApp, submitter: &str, co_author: &str) -> String {
        let outcome = app
            .create_post(
                submitter,
                NewPost {
                    content: "together".into(),
                    authors: vec![co_author.into()],
                    ..NewPost::default()
                },
            )
            .unwrap();
        assert_eq!(outcome.msg, MSG_PENDING);
        outcome.state.id().to_string()
    }

    fn comment(app: &SocialApp, author: &str, post_id: &str, content: &str) -> CommentView {
        app.create_comment(
            author,
            post_id,
            NewComment {
                content: content.into(),
                ..NewComment::default()
            },
        )
        .unwrap()
    }

    fn user(app: &SocialApp, name: &str) -> String {
        app.users.create(name, "pw").expect("create user").id
    }

    fn solo_post(app: &SocialApp, author: &str, allow_requests: bool) -> String {
        let outcome = app
            .create_post(
                author,
                NewPost {
                    content: "hello".into(),
                    allow_requests,
                    ..NewPost::default()
                },
            )
            .unwrap();
        assert_eq!(outcome.msg, MSG_PUBLISHED);
        outcome.state.id().to_string()
    }

    #[test]
    fn group_post_is_rekeyed_on_publish() {
        let app = setup_app();
        let alice = user(&app, "alice");
        let bob = user(&app, "bob");

        let outcome = app
            .create_post(
                &alice,
                NewPost {
                    content: "together".into(),
                    authors: vec!["bob".into()],
                    ..NewPost::default()
                },
            )
            .unwrap();
        assert_eq!(outcome.msg, MSG_PENDING);
        let pending_id = outcome.state.id().to_string();
        let PostState::Pending(pending) = &outcome.state else {
            panic!("expected a pending post");
        };
        assert_eq!(pending.requires_approval, vec![bob.clone()]);
        let record_id = app.post_sharing.get_by_resource(&pending_id).unwrap().id;

        let published = app.approve_post(&bob, &pending_id).unwrap();
        let PostState::Published(post) = published.state else {
            panic!("expected a published post");
        };
        assert_eq!(post.authors, vec![alice.clone(), bob.clone()]);

        let record = app.post_sharing.get_by_resource(&post.id).unwrap();
        assert_eq!(record.id, record_id);
        assert!(app.post_sharing.get_by_resource(&pending_id).is_err());
        app.post_sharing.is_owner(&alice, &record.id).unwrap();

        let visible = app.accessible_posts(&alice).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, post.id);
    }

    #[test]
    fn rejection_removes_sharing_record() {
        let app = setup_app();
        let alice = user(&app, "alice");
        let bob = user(&app, "bob");
        let outcome = app
            .create_post(
                &alice,
                NewPost {
                    content: "maybe".into(),
                    authors: vec!["bob".into()],
                    ..NewPost::default()
                },
            )
            .unwrap();
        let pending_id = outcome.state.id().to_string();

        app.reject_post(&bob, &pending_id).unwrap();
        assert!(app.post_sharing.get_by_resource(&pending_id).is_err());
        assert!(app.pending_posts(&alice).unwrap().is_empty());
    }

    #[test]
    fn unknown_share_target_leaves_nothing_behind() {
        let app = setup_app();
        let alice = user(&app, "alice");
        let err = app
            .create_post(
                &alice,
                NewPost {
                    content: "oops".into(),
                    share_with_users: vec!["ghost".into()],
                    ..NewPost::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SocialError::UserNotFound(_)));
        assert!(app.list_posts(None).unwrap().is_empty());
    }

    #[test]
    fn lists_grant_visibility() {
        let app = setup_app();
        let alice = user(&app, "alice");
        let bob = user(&app, "bob");
        let list = app.create_list(&alice, "friends", &["bob".into()]).unwrap();
        let post_id = solo_post(&app, &alice, false);

        assert!(app.accessible_posts(&bob).unwrap().is_empty());
        assert!(app.ensure_can_view(&bob, &post_id).is_err());

        app.grant_post_list(&alice, &post_id, &list.id).unwrap();
        assert_eq!(app.accessible_posts(&bob).unwrap().len(), 1);
        app.ensure_can_view(&bob, &post_id).unwrap();

        app.delete_list(&alice, &list.id).unwrap();
        assert!(app.accessible_posts(&bob).unwrap().is_empty());
    }

    #[test]
    fn only_owners_manage_access() {
        let app = setup_app();
        let alice = user(&app, "alice");
        let bob = user(&app, "bob");
        user(&app, "carol");
        let post_id = solo_post(&app, &alice, true);

        assert!(matches!(
            app.grant_post_access(&bob, &post_id, "carol"),
            Err(SocialError::ResourceOwnerMismatch { .. })
        ));
        app.request_post_access(&bob, &post_id).unwrap();
        app.grant_post_access(&alice, &post_id, "bob").unwrap();
        let record = app.post_sharing.get_by_resource(&post_id).unwrap();
        assert!(record.grants(&bob));
        assert!(record.requested_access.is_empty());

        app.revoke_post_access(&alice, &post_id, "bob").unwrap();
        assert!(app.ensure_can_view(&bob, &post_id).is_err());
    }

    #[test]
    fn comments_follow_post_visibility() {
        let app = setup_app();
        let alice = user(&app, "alice");
        let bob = user(&app, "bob");
        let carol = user(&app, "carol");
        let post_id = solo_post(&app, &alice, false);
        app.grant_post_access(&alice, &post_id, "bob").unwrap();
        app.grant_post_access(&alice, &post_id, "carol").unwrap();

        assert!(app
            .create_comment(
                &user(&app, "dave"),
                &post_id,
                NewComment {
                    content: "hi".into(),
                    ..NewComment::default()
                }
            )
            .is_err());

        app.create_comment(
            &bob,
            &post_id,
            NewComment {
                content: "for everyone".into(),
                ..NewComment::default()
            },
        )
        .unwrap();
        app.create_comment(
            &bob,
            &post_id,
            NewComment {
                content: "just alice".into(),
                share_with_users: vec!["alice".into()],
                ..NewComment::default()
            },
        )
        .unwrap();

        assert_eq!(app.comments_for_post(&alice, &post_id).unwrap().len(), 2);
        assert_eq!(app.comments_for_post(&bob, &post_id).unwrap().len(), 2);
        assert_eq!(app.comments_for_post(&carol, &post_id).unwrap().len(), 1);

        app.delete_post(&alice, &post_id).unwrap();
        assert!(app.comments.by_target(&post_id).unwrap().is_empty());
        assert!(app.comment_sharing.get_resources_by_owner(&bob).unwrap().is_empty());
    }

    #[test]
    fn deleting_a_user_cascades() {
        let app = setup_app();
        let alice = user(&app, "alice");
        let bob = user(&app, "bob");
        let solo = solo_post(&app, &bob, true);
        let shared = app
            .create_post(
                &alice,
                NewPost {
                    content: "shared".into(),
                    authors: vec!["bob".into()],
                    ..NewPost::default()
                },
            )
            .unwrap();
        let shared = app.approve_post(&bob, shared.state.id()).unwrap();
        let shared_id = shared.state.id().to_string();
        app.create_list(&bob, "bob's", &["alice".into()]).unwrap();
        app.send_friend_request(&alice, "bob").unwrap();
        let token = app.login(None, "bob", "pw").unwrap();

        app.delete_user(&bob).unwrap();

        assert!(app.post_sharing.get_by_resource(&solo).is_err());
        assert!(app.posts.get(&solo).is_err());
        let remaining = app.posts.get(&shared_id).unwrap();
        assert_eq!(remaining.authors, vec![alice.clone()]);
        let record = app.post_sharing.get_by_resource(&shared_id).unwrap();
        assert_eq!(record.owners, vec![alice.clone()]);
        assert!(app.lists.lists_containing(&alice).unwrap().is_empty());
        assert!(app.friend_requests(&alice).unwrap().is_empty());
        assert!(matches!(
            app.current_user(Some(&token)),
            Err(SocialError::NotLoggedIn)
        ));
        assert!(matches!(app.users.get_by_id(&bob), Err(SocialError::UserNotFound(_))));
    }

    #[test]
    fn comments_on_pending_post_move_to_published_post() {
        let app = setup_app();
        let alice = user(&app, "alice");
        let bob = user(&app, "bob");
        let pending_id = group_post(&app, &alice, "bob");
        comment(&app, &alice, &pending_id, "draft note");

        let published = app.approve_post(&bob, &pending_id).unwrap();
        let post_id = published.state.id().to_string();

        assert!(app.comments.by_target(&pending_id).unwrap().is_empty());
        let visible = app.comments_for_post(&alice, &post_id).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].target, post_id);

        app.delete_post(&alice, &post_id).unwrap();
        assert!(app.comments.by_target(&post_id).unwrap().is_empty());
        assert!(app.comment_sharing.get_resources_by_owner(&alice).unwrap().is_empty());
    }

    #[test]
    fn rejected_post_takes_its_comments_along() {
        let app = setup_app();
        let alice = user(&app, "alice");
        let bob = user(&app, "bob");
        let pending_id = group_post(&app, &alice, "bob");
        comment(&app, &alice, &pending_id, "draft note");

        app.reject_post(&bob, &pending_id).unwrap();
        assert!(app.comments.by_target(&pending_id).unwrap().is_empty());
        assert!(app.comment_sharing.get_resources_by_owner(&alice).unwrap().is_empty());
    }

    #[test]
    fn failed_sharing_setup_removes_new_post() {
        let (app, database) = setup_app_with_database();
        let alice = user(&app, "alice");
        user(&app, "bob");
        database
            .execute_batch("ALTER TABLE sharing_records RENAME TO sharing_records_offline;")
            .unwrap();

        let err = app
            .create_post(
                &alice,
                NewPost {
                    content: "solo".into(),
                    ..NewPost::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SocialError::Store(_)));
        assert!(app.list_posts(None).unwrap().is_empty());

        let err = app
            .create_post(
                &alice,
                NewPost {
                    content: "together".into(),
                    authors: vec!["bob".into()],
                    ..NewPost::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SocialError::Store(_)));
        assert!(app.pending_posts(&alice).unwrap().is_empty());
    }

    #[test]
    fn failed_rekey_leaves_post_published() {
        let (app, database) = setup_app_with_database();
        let alice = user(&app, "alice");
        let bob = user(&app, "bob");
        let pending_id = group_post(&app, &alice, "bob");
        database
            .execute_batch("ALTER TABLE sharing_records RENAME TO sharing_records_offline;")
            .unwrap();

        let err = app.approve_post(&bob, &pending_id).unwrap_err();
        assert!(matches!(err, SocialError::Store(_)));
        assert!(app.pending_posts(&alice).unwrap().is_empty());
        let published = app.list_posts(None).unwrap();
        assert_eq!(published.len(), 1);

        database
            .execute_batch("ALTER TABLE sharing_records_offline RENAME TO sharing_records;")
            .unwrap();
        assert!(app.post_sharing.get_by_resource(&pending_id).is_ok());
        app.delete_post(&alice, &published[0].id).unwrap();
        assert!(app.list_posts(None).unwrap().is_empty());
    }

    #[test]
    fn login_rules() {
        let app = setup_app();
        user(&app, "alice");
        let token = app.login(None, "alice", "pw").unwrap();
        assert!(matches!(
            app.login(Some(&token), "alice", "pw"),
            Err(SocialError::AlreadyLoggedIn)
        ));
        assert!(matches!(
            app.register(Some(&token), "bob", "pw"),
            Err(SocialError::AlreadyLoggedIn)
        ));
        app.logout(Some(&token)).unwrap();
        assert!(matches!(app.logout(Some(&token)), Err(SocialError::NotLoggedIn)));
    }
}
