//! Access-control records that gate who may see a resource.
//!
//! A record points at its resource by id only and is keyed by its own id for
//! every mutation. One service instance governs one scope; posts and comments
//! keep separate record sets.

use crate::database::models::SharingRecord;
use crate::database::repositories::SharingRepository;
use crate::database::Database;
use crate::errors::{SocialError, SocialResult};
use crate::utils::{dedup_ordered, new_id, now_utc_iso};
use serde::{Deserialize, Serialize};

pub const POSTS_SCOPE: &str = "posts";
pub const COMMENTS_SCOPE: &str = "comments";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingView {
    pub id: String,
    pub resource: String,
    pub owners: Vec<String>,
    pub allow_requests: bool,
    pub requested_access: Vec<String>,
    pub with_access: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl SharingView {
    fn from_record(record: SharingRecord) -> Self {
        Self {
            id: record.id,
            resource: record.resource,
            owners: record.owners.into_iter().collect(),
            allow_requests: record.allow_requests,
            requested_access: record.requested_access.into_iter().collect(),
            with_access: record.with_access.into_iter().collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn grants(&self, target: &str) -> bool {
        self.with_access.iter().any(|member| member == target)
    }
}

#[derive(Clone)]
pub struct SharingService {
    database: Database,
    scope: &'static str,
}

impl SharingService {
    pub fn new(database: Database, scope: &'static str) -> Self {
        Self { database, scope }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    /// Creates the record for `resource`. Owners always end up with access.
    pub fn limit_sharing(
        &self,
        owners: Vec<String>,
        resource: &str,
        allow_requests: bool,
        with_access: Vec<String>,
    ) -> SocialResult<SharingView> {
        let owners = dedup_ordered(owners);
        if owners.is_empty() {
            return Err(SocialError::bad_request(
                "A shared resource needs at least one owner.",
            ));
        }
        let with_access = dedup_ordered(with_access.into_iter().chain(owners.iter().cloned()));
        let now = now_utc_iso();
        let record = SharingRecord {
            id: new_id(),
            scope: self.scope.to_string(),
            resource: resource.to_string(),
            owners: owners.into_iter().collect(),
            allow_requests,
            requested_access: Default::default(),
            with_access: with_access.into_iter().collect(),
            created_at: now.clone(),
            updated_at: now,
        };
        let _: () = self
            .database
            .with_repositories(|repos| repos.sharing(self.scope).create(&record))?;
        tracing::info!(
            scope = self.scope,
            record_id = %record.id,
            resource_id = %record.resource,
            grantees = record.with_access.len(),
            "shared resource created"
        );
        Ok(SharingView::from_record(record))
    }

    /// Points the record governing `old_resource` at `new_resource`.
    /// Returns how many records moved.
    pub fn update_resource(&self, old_resource: &str, new_resource: &str) -> SocialResult<usize> {
        let moved: usize = self.database.with_repositories(|repos| {
            repos.sharing(self.scope).set_resource(old_resource, new_resource)
        })?;
        tracing::info!(
            scope = self.scope,
            old_resource = %old_resource,
            new_resource = %new_resource,
            moved,
            "shared resource re-keyed"
        );
        Ok(moved)
    }

    /// Idempotent.
    pub fn delete_by_resource_id(&self, resource_id: &str) -> SocialResult<()> {
        let removed: usize = self
            .database
            .with_repositories(|repos| repos.sharing(self.scope).delete_by_resource(resource_id))?;
        if removed > 0 {
            tracing::info!(scope = self.scope, resource_id = %resource_id, "shared resource deleted");
        }
        Ok(())
    }

    pub fn get(&self, record_id: &str) -> SocialResult<SharingView> {
        self.database.with_repositories(|repos| {
            repos
                .sharing(self.scope)
                .get(record_id)?
                .map(SharingView::from_record)
                .ok_or_else(|| SocialError::SharedResourceNotFound(record_id.to_string()))
        })
    }

    pub fn get_by_resource(&self, resource_id: &str) -> SocialResult<SharingView> {
        self.database.with_repositories(|repos| {
            repos
                .sharing(self.scope)
                .get_by_resource(resource_id)?
                .map(SharingView::from_record)
                .ok_or_else(|| SocialError::SharedResourceNotFound(resource_id.to_string()))
        })
    }

    pub fn request_access(&self, record_id: &str, user: &str) -> SocialResult<&'static str> {
        self.database.with_repositories(|repos| {
            let sharing = repos.sharing(self.scope);
            let record = sharing
                .get(record_id)?
                .ok_or_else(|| SocialError::SharedResourceNotFound(record_id.to_string()))?;
            if !record.allow_requests {
                return Err(SocialError::RequestAccessNotAllowed(record_id.to_string()));
            }
            if record.with_access.contains(user) {
                return Err(SocialError::AccessAlreadyGranted {
                    record: record_id.to_string(),
                    user: user.to_string(),
                });
            }
            if record.requested_access.contains(user) {
                return Err(SocialError::RequestAlreadyExists {
                    record: record_id.to_string(),
                    user: user.to_string(),
                });
            }
            sharing.add_request(record_id, user)?;
            tracing::info!(scope = self.scope, record_id = %record_id, user_id = %user, "access requested");
            Ok("Successfully requested access!")
        })
    }

    /// Grants `member` (a user or list id), dropping any pending request.
    pub fn add_access(&self, record_id: &str, member: &str) -> SocialResult<&'static str> {
        self.database.with_repositories(|repos| {
            let sharing = repos.sharing(self.scope);
            let record = sharing
                .get(record_id)?
                .ok_or_else(|| SocialError::SharedResourceNotFound(record_id.to_string()))?;
            if record.with_access.contains(member) {
                return Err(SocialError::AccessAlreadyGranted {
                    record: record_id.to_string(),
                    user: member.to_string(),
                });
            }
            sharing.grant(record_id, member)?;
            tracing::info!(scope = self.scope, record_id = %record_id, member = %member, "access granted");
            Ok("Successfully added access!")
        })
    }

    /// Owners are not protected here.
    pub fn remove_access(&self, record_id: &str, member: &str) -> SocialResult<&'static str> {
        self.database.with_repositories(|repos| {
            let sharing = repos.sharing(self.scope);
            let record = sharing
                .get(record_id)?
                .ok_or_else(|| SocialError::SharedResourceNotFound(record_id.to_string()))?;
            if !record.with_access.contains(member) {
                return Err(SocialError::AccessDoesNotExist {
                    record: record_id.to_string(),
                    user: member.to_string(),
                });
            }
            sharing.revoke(record_id, member)?;
            tracing::info!(scope = self.scope, record_id = %record_id, member = %member, "access revoked");
            Ok("Successfully removed access!")
        })
    }

    /// Records granting any of `targets` (a user id plus the ids of lists
    /// they belong to).
    pub fn get_resources_by_accessible(&self, targets: &[String]) -> SocialResult<Vec<SharingView>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        self.database.with_repositories(|repos| {
            Ok(repos
                .sharing(self.scope)
                .list_accessible(targets)?
                .into_iter()
                .map(SharingView::from_record)
                .collect())
        })
    }

    pub fn get_resources_by_owner(&self, user: &str) -> SocialResult<Vec<SharingView>> {
        self.database.with_repositories(|repos| {
            Ok(repos
                .sharing(self.scope)
                .list_owned(user)?
                .into_iter()
                .map(SharingView::from_record)
                .collect())
        })
    }

    pub fn is_owner(&self, user: &str, record_id: &str) -> SocialResult<()> {
        let record = self.get(record_id)?;
        if !record.owners.iter().any(|owner| owner == user) {
            return Err(SocialError::ResourceOwnerMismatch {
                user: user.to_string(),
                record: record_id.to_string(),
            });
        }
        Ok(())
    }

    /// Strips `member` from every record in this scope and deletes records
    /// left without owners. Returns the resource ids of deleted records.
    pub fn remove_member_everywhere(&self, member: &str) -> SocialResult<Vec<String>> {
        let orphaned: Vec<String> = self.database.with_repositories(|repos| {
            let sharing = repos.sharing(self.scope);
            sharing.remove_member_everywhere(member)?;
            sharing.delete_ownerless()
        })?;
        tracing::debug!(
            scope = self.scope,
            member = %member,
            orphaned = orphaned.len(),
            "member removed from shared resources"
        );
        Ok(orphaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service() -> SharingService {
        SharingService::new(Database::open_in_memory().expect("in-memory db"), POSTS_SCOPE)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn assert_disjoint(record: &SharingView) {
        for member in &record.requested_access {
            assert!(!record.with_access.contains(member), "{member} in both sets");
        }
    }

    #[test]
    fn owners_are_seeded_into_access() {
        let sharing = setup_service();
        let record = sharing
            .limit_sharing(ids(&["alice", "alice"]), "post-1", true, ids(&["bob"]))
            .unwrap();
        assert_eq!(record.owners, vec!["alice"]);
        assert_eq!(record.with_access, vec!["alice", "bob"]);
        assert!(record.requested_access.is_empty());
    }

    #[test]
    fn delete_by_resource_is_idempotent() {
        let sharing = setup_service();
        sharing
            .limit_sharing(ids(&["alice"]), "post-1", true, vec![])
            .unwrap();
        sharing.delete_by_resource_id("post-1").unwrap();
        sharing.delete_by_resource_id("post-1").unwrap();
        assert!(matches!(
            sharing.get_by_resource("post-1"),
            Err(SocialError::SharedResourceNotFound(_))
        ));
    }

    #[test]
    fn requests_respect_allow_flag() {
        let sharing = setup_service();
        let closed = sharing
            .limit_sharing(ids(&["alice"]), "post-1", false, vec![])
            .unwrap();
        assert!(matches!(
            sharing.request_access(&closed.id, "bob"),
            Err(SocialError::RequestAccessNotAllowed(id)) if id == closed.id
        ));

        let open = sharing
            .limit_sharing(ids(&["alice"]), "post-2", true, vec![])
            .unwrap();
        sharing.request_access(&open.id, "bob").unwrap();
        let record = sharing.get(&open.id).unwrap();
        assert_eq!(record.requested_access, vec!["bob"]);
        assert!(!record.grants("bob"));

        assert!(matches!(
            sharing.request_access(&open.id, "bob"),
            Err(SocialError::RequestAlreadyExists { .. })
        ));
        assert!(matches!(
            sharing.request_access(&open.id, "alice"),
            Err(SocialError::AccessAlreadyGranted { .. })
        ));
    }

    #[test]
    fn granting_moves_a_pending_request() {
        let sharing = setup_service();
        let record = sharing
            .limit_sharing(ids(&["alice"]), "post-1", true, vec![])
            .unwrap();
        sharing.request_access(&record.id, "carol").unwrap();
        sharing.add_access(&record.id, "carol").unwrap();

        let record = sharing.get(&record.id).unwrap();
        assert!(record.grants("carol"));
        assert!(record.requested_access.is_empty());
        assert!(matches!(
            sharing.add_access(&record.id, "carol"),
            Err(SocialError::AccessAlreadyGranted { .. })
        ));
    }

    #[test]
    fn request_and_access_sets_stay_disjoint() {
        let sharing = setup_service();
        let record = sharing
            .limit_sharing(ids(&["alice"]), "post-1", true, vec![])
            .unwrap();
        let id = record.id.clone();

        let _ = sharing.request_access(&id, "bob");
        assert_disjoint(&sharing.get(&id).unwrap());
        let _ = sharing.add_access(&id, "bob");
        assert_disjoint(&sharing.get(&id).unwrap());
        let _ = sharing.request_access(&id, "bob");
        assert_disjoint(&sharing.get(&id).unwrap());
        let _ = sharing.remove_access(&id, "bob");
        assert_disjoint(&sharing.get(&id).unwrap());
        let _ = sharing.request_access(&id, "bob");
        let _ = sharing.request_access(&id, "carol");
        let _ = sharing.add_access(&id, "carol");
        assert_disjoint(&sharing.get(&id).unwrap());
        assert_eq!(sharing.get(&id).unwrap().requested_access, vec!["bob"]);
    }

    #[test]
    fn remove_access_requires_existing_grant() {
        let sharing = setup_service();
        let record = sharing
            .limit_sharing(ids(&["alice"]), "post-1", true, ids(&["bob"]))
            .unwrap();
        sharing.remove_access(&record.id, "bob").unwrap();
        assert!(matches!(
            sharing.remove_access(&record.id, "bob"),
            Err(SocialError::AccessDoesNotExist { .. })
        ));
        // Owners may be removed by the primitive itself.
        sharing.remove_access(&record.id, "alice").unwrap();
        assert!(sharing.get(&record.id).unwrap().with_access.is_empty());
        assert!(matches!(
            sharing.remove_access("missing", "bob"),
            Err(SocialError::SharedResourceNotFound(_))
        ));
    }

    #[test]
    fn rekeyed_records_resolve_only_by_new_resource() {
        let sharing = setup_service();
        let record = sharing
            .limit_sharing(ids(&["alice"]), "pending-1", true, vec![])
            .unwrap();
        assert_eq!(sharing.update_resource("pending-1", "post-1").unwrap(), 1);

        assert!(sharing.get_by_resource("pending-1").is_err());
        let moved = sharing.get_by_resource("post-1").unwrap();
        assert_eq!(moved.id, record.id);
        sharing.is_owner("alice", &moved.id).unwrap();

        let visible = sharing.get_resources_by_accessible(&ids(&["alice"])).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].resource, "post-1");
        assert_eq!(sharing.update_resource("pending-1", "post-2").unwrap(), 0);
    }

    #[test]
    fn accessible_matches_any_target() {
        let sharing = setup_service();
        sharing
            .limit_sharing(ids(&["alice"]), "post-1", true, ids(&["list-1"]))
            .unwrap();
        sharing
            .limit_sharing(ids(&["bob"]), "post-2", true, ids(&["carol"]))
            .unwrap();
        sharing
            .limit_sharing(ids(&["bob"]), "post-3", true, vec![])
            .unwrap();

        let mut resources: Vec<String> = sharing
            .get_resources_by_accessible(&ids(&["carol", "list-1"]))
            .unwrap()
            .into_iter()
            .map(|record| record.resource)
            .collect();
        resources.sort();
        assert_eq!(resources, vec!["post-1", "post-2"]);
        assert!(sharing.get_resources_by_accessible(&[]).unwrap().is_empty());
    }

    #[test]
    fn owner_checks_use_owner_set() {
        let sharing = setup_service();
        let record = sharing
            .limit_sharing(ids(&["alice", "bob"]), "post-1", true, vec![])
            .unwrap();
        sharing.is_owner("bob", &record.id).unwrap();
        assert!(matches!(
            sharing.is_owner("carol", &record.id),
            Err(SocialError::ResourceOwnerMismatch { .. })
        ));
        assert!(matches!(
            sharing.is_owner("alice", "missing"),
            Err(SocialError::SharedResourceNotFound(_))
        ));
        assert_eq!(sharing.get_resources_by_owner("bob").unwrap().len(), 1);
        assert!(sharing.get_resources_by_owner("carol").unwrap().is_empty());
    }

    #[test]
    fn removing_last_owner_deletes_record() {
        let sharing = setup_service();
        sharing
            .limit_sharing(ids(&["alice"]), "post-1", true, ids(&["bob"]))
            .unwrap();
        sharing
            .limit_sharing(ids(&["alice", "bob"]), "post-2", true, vec![])
            .unwrap();

        let orphaned = sharing.remove_member_everywhere("alice").unwrap();
        assert_eq!(orphaned, vec!["post-1"]);
        let remaining = sharing.get_by_resource("post-2").unwrap();
        assert_eq!(remaining.owners, vec!["bob"]);
        assert_eq!(remaining.with_access, vec!["bob"]);
    }
}
