use crate::database::models::FriendRequestRecord;
use crate::database::repositories::FriendRepository;
use crate::database::Database;
use crate::errors::{SocialError, SocialResult};
use crate::utils::{new_id, now_utc_iso};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(anyhow!("unknown friend request status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestView {
    pub id: String,
    pub from: String,
    pub to: String,
    pub status: RequestStatus,
    pub created_at: String,
}

impl TryFrom<FriendRequestRecord> for FriendRequestView {
    type Error = anyhow::Error;

    fn try_from(record: FriendRequestRecord) -> anyhow::Result<Self> {
        Ok(Self {
            id: record.id,
            from: record.from_user,
            to: record.to_user,
            status: RequestStatus::parse(&record.status)?,
            created_at: record.created_at,
        })
    }
}

#[derive(Clone)]
pub struct FriendService {
    database: Database,
}

impl FriendService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn send_request(&self, from: &str, to: &str) -> SocialResult<&'static str> {
        if from == to {
            return Err(SocialError::bad_request("You cannot befriend yourself."));
        }
        self.database.with_repositories(|repos| {
            let friends = repos.friends();
            if friends.are_friends(from, to)? {
                return Err(SocialError::AlreadyFriends(from.to_string(), to.to_string()));
            }
            if friends.has_pending_request(from, to)? || friends.has_pending_request(to, from)? {
                return Err(SocialError::FriendRequestAlreadyExists {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
            friends.create_request(&request_record(from, to, RequestStatus::Pending))?;
            tracing::debug!(from = %from, to = %to, "friend request sent");
            Ok("Sent request!")
        })
    }

    pub fn remove_request(&self, from: &str, to: &str) -> SocialResult<&'static str> {
        self.database.with_repositories(|repos| {
            take_pending(&repos.friends(), from, to)?;
            Ok("Removed request!")
        })
    }

    /// `to` accepts the pending request sent by `from`.
    pub fn accept_request(&self, from: &str, to: &str) -> SocialResult<&'static str> {
        self.database.with_repositories(|repos| {
            let friends = repos.friends();
            take_pending(&friends, from, to)?;
            friends.create_request(&request_record(from, to, RequestStatus::Accepted))?;
            friends.add_friendship(from, to, &now_utc_iso())?;
            tracing::info!(from = %from, to = %to, "friend request accepted");
            Ok("Accepted request!")
        })
    }

    pub fn reject_request(&self, from: &str, to: &str) -> SocialResult<&'static str> {
        self.database.with_repositories(|repos| {
            let friends = repos.friends();
            take_pending(&friends, from, to)?;
            friends.create_request(&request_record(from, to, RequestStatus::Rejected))?;
            Ok("Rejected request!")
        })
    }

    pub fn remove_friend(&self, user: &str, friend: &str) -> SocialResult<&'static str> {
        let removed: usize = self
            .database
            .with_repositories(|repos| repos.friends().remove_friendship(user, friend))?;
        if removed == 0 {
            return Err(SocialError::FriendNotFound(user.to_string(), friend.to_string()));
        }
        Ok("Unfriended!")
    }

    pub fn friends_of(&self, user: &str) -> SocialResult<Vec<String>> {
        self.database
            .with_repositories(|repos| repos.friends().friends_of(user))
            .map_err(SocialError::from)
    }

    /// Requests sent or received by `user`, newest first.
    pub fn requests_for(&self, user: &str) -> SocialResult<Vec<FriendRequestView>> {
        self.database.with_repositories(|repos| {
            repos
                .friends()
                .requests_for(user)?
                .into_iter()
                .map(FriendRequestView::try_from)
                .collect::<anyhow::Result<Vec<_>>>()
                .map_err(SocialError::from)
        })
    }

    pub fn remove_user(&self, user: &str) -> SocialResult<()> {
        let _: usize = self
            .database
            .with_repositories(|repos| repos.friends().remove_user(user))?;
        Ok(())
    }
}

fn request_record(from: &str, to: &str, status: RequestStatus) -> FriendRequestRecord {
    FriendRequestRecord {
        id: new_id(),
        from_user: from.to_string(),
        to_user: to.to_string(),
        status: status.as_str().to_string(),
        created_at: now_utc_iso(),
    }
}

fn take_pending(friends: &impl FriendRepository, from: &str, to: &str) -> SocialResult<()> {
    if friends.take_pending_request(from, to)? == 0 {
        return Err(SocialError::FriendRequestNotFound {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service() -> FriendService {
        FriendService::new(Database::open_in_memory().expect("in-memory db"))
    }

    #[test]
    fn unknown_stored_status_is_a_store_error() {
        let friends = setup_service();
        let mut record = request_record("alice", "bob", RequestStatus::Pending);
        record.status = "archived".into();
        let _: () = friends
            .database
            .with_repositories(|repos| repos.friends().create_request(&record))
            .unwrap();

        assert!(matches!(friends.requests_for("bob"), Err(SocialError::Store(_))));
    }

    #[test]
    fn accepted_request_creates_friendship() {
        let friends = setup_service();
        friends.send_request("alice", "bob").unwrap();
        assert!(matches!(
            friends.send_request("bob", "alice"),
            Err(SocialError::FriendRequestAlreadyExists { .. })
        ));

        friends.accept_request("alice", "bob").unwrap();
        assert_eq!(friends.friends_of("alice").unwrap(), vec!["bob"]);
        assert_eq!(friends.friends_of("bob").unwrap(), vec!["alice"]);
        assert!(matches!(
            friends.send_request("bob", "alice"),
            Err(SocialError::AlreadyFriends(..))
        ));

        let statuses: Vec<RequestStatus> = friends
            .requests_for("bob")
            .unwrap()
            .into_iter()
            .map(|request| request.status)
            .collect();
        assert_eq!(statuses, vec![RequestStatus::Accepted]);
    }

    #[test]
    fn missing_requests_and_friends_are_reported() {
        let friends = setup_service();
        assert!(matches!(
            friends.accept_request("alice", "bob"),
            Err(SocialError::FriendRequestNotFound { .. })
        ));
        assert!(matches!(
            friends.remove_friend("alice", "bob"),
            Err(SocialError::FriendNotFound(..))
        ));
        assert!(matches!(
            friends.send_request("alice", "alice"),
            Err(SocialError::BadRequest(_))
        ));
    }

    #[test]
    fn rejecting_and_withdrawing_requests() {
        let friends = setup_service();
        friends.send_request("alice", "bob").unwrap();
        friends.reject_request("alice", "bob").unwrap();
        assert!(friends.friends_of("bob").unwrap().is_empty());

        friends.send_request("alice", "bob").unwrap();
        friends.remove_request("alice", "bob").unwrap();
        assert!(matches!(
            friends.reject_request("alice", "bob"),
            Err(SocialError::FriendRequestNotFound { .. })
        ));
    }

    #[test]
    fn unfriend_and_remove_user() {
        let friends = setup_service();
        friends.send_request("alice", "bob").unwrap();
        friends.accept_request("alice", "bob").unwrap();
        friends.send_request("carol", "alice").unwrap();

        friends.remove_friend("bob", "alice").unwrap();
        assert!(friends.friends_of("alice").unwrap().is_empty());

        friends.remove_user("alice").unwrap();
        assert!(friends.requests_for("carol").unwrap().is_empty());
    }
}
