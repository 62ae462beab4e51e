//! Named sets of users. A list id can stand in for its members anywhere a
//! sharing record grants access.

use crate::database::models::UserListRecord;
use crate::database::repositories::UserListRepository;
use crate::database::Database;
use crate::errors::{SocialError, SocialResult};
use crate::utils::{new_id, now_utc_iso};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListView {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub members: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserListRecord> for UserListView {
    fn from(record: UserListRecord) -> Self {
        Self {
            id: record.id,
            owner: record.owner,
            name: record.name,
            members: record.members.into_iter().collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

fn validate_name(name: &str) -> SocialResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SocialError::bad_request("List name may not be empty."));
    }
    Ok(name)
}

#[derive(Clone)]
pub struct UserListService {
    database: Database,
}

impl UserListService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create(&self, owner: &str, name: &str, members: Vec<String>) -> SocialResult<UserListView> {
        let name = validate_name(name)?;
        let now = now_utc_iso();
        let record = UserListRecord {
            id: new_id(),
            owner: owner.to_string(),
            name: name.to_string(),
            members: members.into_iter().collect(),
            created_at: now.clone(),
            updated_at: now,
        };
        let _: () = self
            .database
            .with_repositories(|repos| repos.user_lists().create(&record))?;
        tracing::info!(list_id = %record.id, owner = %record.owner, "user list created");
        Ok(record.into())
    }

    pub fn get(&self, list_id: &str) -> SocialResult<UserListView> {
        self.database.with_repositories(|repos| {
            repos
                .user_lists()
                .get(list_id)?
                .map(UserListView::from)
                .ok_or_else(|| SocialError::UserListNotFound(list_id.to_string()))
        })
    }

    pub fn is_owner(&self, user: &str, list_id: &str) -> SocialResult<()> {
        if self.get(list_id)?.owner != user {
            return Err(SocialError::UserListOwnerMismatch {
                user: user.to_string(),
                list: list_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn rename(&self, list_id: &str, name: &str) -> SocialResult<&'static str> {
        let name = validate_name(name)?;
        let renamed: usize = self
            .database
            .with_repositories(|repos| repos.user_lists().rename(list_id, name, &now_utc_iso()))?;
        if renamed == 0 {
            return Err(SocialError::UserListNotFound(list_id.to_string()));
        }
        Ok("List renamed!")
    }

    pub fn add_member(&self, list_id: &str, user: &str) -> SocialResult<&'static str> {
        self.database.with_repositories(|repos| {
            let lists = repos.user_lists();
            if lists.get(list_id)?.is_none() {
                return Err(SocialError::UserListNotFound(list_id.to_string()));
            }
            lists.add_member(list_id, user)?;
            Ok("List member added!")
        })
    }

    pub fn remove_member(&self, list_id: &str, user: &str) -> SocialResult<&'static str> {
        self.database.with_repositories(|repos| {
            let lists = repos.user_lists();
            if lists.get(list_id)?.is_none() {
                return Err(SocialError::UserListNotFound(list_id.to_string()));
            }
            lists.remove_member(list_id, user)?;
            Ok("List member removed!")
        })
    }

    pub fn delete(&self, list_id: &str) -> SocialResult<&'static str> {
        let removed: usize = self
            .database
            .with_repositories(|repos| repos.user_lists().delete(list_id))?;
        if removed == 0 {
            return Err(SocialError::UserListNotFound(list_id.to_string()));
        }
        tracing::info!(list_id = %list_id, "user list deleted");
        Ok("List deleted!")
    }

    pub fn lists_owned_by(&self, owner: &str) -> SocialResult<Vec<UserListView>> {
        self.database.with_repositories(|repos| {
            Ok(repos
                .user_lists()
                .list_owned(owner)?
                .into_iter()
                .map(UserListView::from)
                .collect())
        })
    }

    /// Ids of every list `user` is a member of.
    pub fn lists_containing(&self, user: &str) -> SocialResult<Vec<String>> {
        self.database
            .with_repositories(|repos| repos.user_lists().ids_containing(user))
            .map_err(SocialError::from)
    }

    /// Deletes the lists `user` owns and removes them from every other list.
    /// Returns the ids of deleted lists.
    pub fn remove_user(&self, user: &str) -> SocialResult<Vec<String>> {
        self.database.with_repositories(|repos| {
            let lists = repos.user_lists();
            let mut deleted = Vec::new();
            for list in lists.list_owned(user)? {
                lists.delete(&list.id)?;
                deleted.push(list.id);
            }
            lists.remove_user_everywhere(user)?;
            Ok(deleted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service() -> UserListService {
        UserListService::new(Database::open_in_memory().expect("in-memory db"))
    }

    #[test]
    fn membership_round_trip() {
        let lists = setup_service();
        let list = lists
            .create("alice", "close friends", vec!["bob".into()])
            .unwrap();
        assert_eq!(list.members, vec!["bob"]);

        lists.add_member(&list.id, "carol").unwrap();
        lists.add_member(&list.id, "carol").unwrap();
        assert_eq!(lists.get(&list.id).unwrap().members, vec!["bob", "carol"]);
        assert_eq!(lists.lists_containing("carol").unwrap(), vec![list.id.clone()]);

        lists.remove_member(&list.id, "bob").unwrap();
        assert!(lists.lists_containing("bob").unwrap().is_empty());
    }

    #[test]
    fn owner_checks_and_missing_lists() {
        let lists = setup_service();
        let list = lists.create("alice", "family", vec![]).unwrap();
        lists.is_owner("alice", &list.id).unwrap();
        assert!(matches!(
            lists.is_owner("bob", &list.id),
            Err(SocialError::UserListOwnerMismatch { .. })
        ));
        assert!(matches!(
            lists.add_member("missing", "bob"),
            Err(SocialError::UserListNotFound(_))
        ));
        assert!(matches!(
            lists.rename("missing", "x"),
            Err(SocialError::UserListNotFound(_))
        ));
        assert!(matches!(
            lists.create("alice", "  ", vec![]),
            Err(SocialError::BadRequest(_))
        ));
    }

    #[test]
    fn rename_and_delete() {
        let lists = setup_service();
        let list = lists.create("alice", "work", vec![]).unwrap();
        lists.rename(&list.id, "colleagues").unwrap();
        assert_eq!(lists.get(&list.id).unwrap().name, "colleagues");
        lists.delete(&list.id).unwrap();
        assert!(matches!(lists.delete(&list.id), Err(SocialError::UserListNotFound(_))));
    }

    #[test]
    fn removing_user_drops_owned_lists_and_memberships() {
        let lists = setup_service();
        let owned = lists.create("bob", "bob's", vec!["alice".into()]).unwrap();
        let other = lists.create("alice", "alice's", vec!["bob".into()]).unwrap();

        assert_eq!(lists.remove_user("bob").unwrap(), vec![owned.id.clone()]);
        assert!(lists.get(&owned.id).is_err());
        assert!(lists.get(&other.id).unwrap().members.is_empty());
        assert!(lists.lists_owned_by("bob").unwrap().is_empty());
    }
}
