//! Users and the id <-> username mapping the rest of the backend leans on.

use crate::database::models::UserRecord;
use crate::database::repositories::UserRepository;
use crate::database::Database;
use crate::errors::{SocialError, SocialResult};
use crate::utils::{new_id, now_utc_iso};
use anyhow::anyhow;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Rendered in place of ids whose user no longer exists.
pub const DELETED_USER: &str = "DELETED_USER";

/// Resolves stable user ids to public handles and back.
pub trait HandleResolver {
    fn id_to_handle(&self, id: &str) -> SocialResult<String>;
    fn handle_to_id(&self, handle: &str) -> SocialResult<String>;
    /// Unknown ids come back as [`DELETED_USER`].
    fn ids_to_handles(&self, ids: &[String]) -> SocialResult<Vec<String>>;
    /// Fails on the first unknown handle.
    fn handles_to_ids(&self, handles: &[String]) -> SocialResult<Vec<String>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UserView {
    fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]{1,32}$").expect("static username regex"))
}

fn validate_username(username: &str) -> SocialResult<()> {
    if !username_pattern().is_match(username) {
        return Err(SocialError::bad_request(
            "Username must be 1-32 characters of letters, digits, '_', '.' or '-'.",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> SocialResult<()> {
    if password.is_empty() {
        return Err(SocialError::bad_request("Password may not be empty."));
    }
    Ok(())
}

/// Argon2id digest in PHC form; the salt and parameters travel inside it.
fn hash_password(password: &str) -> SocialResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| SocialError::Store(anyhow!("failed to hash password: {err}")))
}

fn password_matches(record: &UserRecord, password: &str) -> SocialResult<bool> {
    let stored = PasswordHash::new(&record.password_hash).map_err(|err| {
        SocialError::Store(anyhow!("stored password hash for {} is malformed: {err}", record.id))
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &stored)
        .is_ok())
}

#[derive(Clone)]
pub struct UserService {
    database: Database,
}

impl UserService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create(&self, username: &str, password: &str) -> SocialResult<UserView> {
        let username = username.trim();
        validate_username(username)?;
        validate_password(password)?;
        let now = now_utc_iso();
        let record = UserRecord {
            id: new_id(),
            username: username.to_string(),
            password_hash: hash_password(password)?,
            created_at: now.clone(),
            updated_at: now,
        };
        self.database.with_repositories(|repos| {
            if repos.users().get_by_username(username)?.is_some() {
                return Err(SocialError::UsernameTaken(username.to_string()));
            }
            repos.users().create(&record)?;
            Ok(())
        })?;
        tracing::info!(user_id = %record.id, username = %record.username, "user created");
        Ok(UserView::from_record(record))
    }

    pub fn authenticate(&self, username: &str, password: &str) -> SocialResult<UserView> {
        let record: Option<UserRecord> = self
            .database
            .with_repositories(|repos| repos.users().get_by_username(username.trim()))?;
        let Some(record) = record else {
            return Err(SocialError::InvalidCredentials);
        };
        if !password_matches(&record, password)? {
            return Err(SocialError::InvalidCredentials);
        }
        Ok(UserView::from_record(record))
    }

    pub fn get_by_id(&self, id: &str) -> SocialResult<UserView> {
        self.database.with_repositories(|repos| {
            repos
                .users()
                .get(id)?
                .map(UserView::from_record)
                .ok_or_else(|| SocialError::UserNotFound(id.to_string()))
        })
    }

    pub fn get_by_username(&self, username: &str) -> SocialResult<UserView> {
        self.database.with_repositories(|repos| {
            repos
                .users()
                .get_by_username(username)?
                .map(UserView::from_record)
                .ok_or_else(|| SocialError::UserNotFound(username.to_string()))
        })
    }

    pub fn list(&self) -> SocialResult<Vec<UserView>> {
        self.database.with_repositories(|repos| {
            Ok(repos
                .users()
                .list()?
                .into_iter()
                .map(UserView::from_record)
                .collect())
        })
    }

    pub fn update(&self, id: &str, update: UserUpdate) -> SocialResult<UserView> {
        let now = now_utc_iso();
        let password_hash = match update.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };
        self.database.with_repositories(|repos| {
            let users = repos.users();
            if users.get(id)?.is_none() {
                return Err(SocialError::UserNotFound(id.to_string()));
            }
            if let Some(username) = update.username.as_deref().map(str::trim) {
                validate_username(username)?;
                match users.get_by_username(username)? {
                    Some(existing) if existing.id != id => {
                        return Err(SocialError::UsernameTaken(username.to_string()));
                    }
                    _ => {}
                }
                users.set_username(id, username, &now)?;
            }
            if let Some(hash) = password_hash.as_deref() {
                users.set_password(id, hash, &now)?;
            }
            Ok(())
        })?;
        self.get_by_id(id)
    }

    /// id -> username for every id that still names a user.
    pub fn usernames_for(&self, ids: &[String]) -> SocialResult<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.database
            .with_repositories(|repos| repos.users().usernames_for(ids))
            .map_err(SocialError::from)
    }

    /// Removes the credential row only; callers cascade the rest.
    pub fn delete(&self, id: &str) -> SocialResult<()> {
        let removed: usize = self
            .database
            .with_repositories(|repos| repos.users().delete(id))?;
        if removed == 0 {
            return Err(SocialError::UserNotFound(id.to_string()));
        }
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }
}

impl HandleResolver for UserService {
    fn id_to_handle(&self, id: &str) -> SocialResult<String> {
        Ok(self.get_by_id(id)?.username)
    }

    fn handle_to_id(&self, handle: &str) -> SocialResult<String> {
        Ok(self.get_by_username(handle)?.id)
    }

    fn ids_to_handles(&self, ids: &[String]) -> SocialResult<Vec<String>> {
        let names = self.usernames_for(ids)?;
        Ok(ids
            .iter()
            .map(|id| names.get(id).cloned().unwrap_or_else(|| DELETED_USER.to_string()))
            .collect())
    }

    fn handles_to_ids(&self, handles: &[String]) -> SocialResult<Vec<String>> {
        handles
            .iter()
            .map(|handle| self.handle_to_id(handle.trim()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service() -> UserService {
        UserService::new(Database::open_in_memory().expect("in-memory db"))
    }

    #[test]
    fn create_then_authenticate() {
        let users = setup_service();
        let alice = users.create("alice", "hunter2").expect("create");
        let authed = users.authenticate("alice", "hunter2").expect("authenticate");
        assert_eq!(authed.id, alice.id);
        assert!(matches!(
            users.authenticate("alice", "wrong"),
            Err(SocialError::InvalidCredentials)
        ));
        assert!(matches!(
            users.authenticate("nobody", "hunter2"),
            Err(SocialError::InvalidCredentials)
        ));
    }

    #[test]
    fn passwords_are_stored_as_salted_argon2id() {
        let users = setup_service();
        let alice = users.create("alice", "hunter2").unwrap();
        let bob = users.create("bob", "hunter2").unwrap();
        let stored = |id: &str| -> String {
            users
                .database
                .with_repositories(|repos| repos.users().get(id))
                .unwrap()
                .map(|record| record.password_hash)
                .unwrap()
        };

        let alice_hash = stored(&alice.id);
        assert!(alice_hash.starts_with("$argon2id$"));
        assert!(!alice_hash.contains("hunter2"));
        assert_ne!(alice_hash, stored(&bob.id));
    }

    #[test]
    fn malformed_stored_hash_is_a_store_error() {
        let users = setup_service();
        let alice = users.create("alice", "pw").unwrap();
        let _: usize = users
            .database
            .with_repositories(|repos| repos.users().set_password(&alice.id, "not-a-phc-string", "now"))
            .unwrap();
        assert!(matches!(
            users.authenticate("alice", "pw"),
            Err(SocialError::Store(_))
        ));
    }

    #[test]
    fn duplicate_and_invalid_usernames_are_rejected() {
        let users = setup_service();
        users.create("alice", "pw").unwrap();
        assert!(matches!(
            users.create("alice", "other"),
            Err(SocialError::UsernameTaken(name)) if name == "alice"
        ));
        assert!(matches!(users.create("has space", "pw"), Err(SocialError::BadRequest(_))));
        assert!(matches!(users.create("bob", ""), Err(SocialError::BadRequest(_))));
    }

    #[test]
    fn update_changes_username_and_password() {
        let users = setup_service();
        let alice = users.create("alice", "old").unwrap();
        users.create("bob", "pw").unwrap();

        assert!(matches!(
            users.update(
                &alice.id,
                UserUpdate {
                    username: Some("bob".into()),
                    password: None
                }
            ),
            Err(SocialError::UsernameTaken(_))
        ));

        let updated = users
            .update(
                &alice.id,
                UserUpdate {
                    username: Some("alicia".into()),
                    password: Some("new".into()),
                },
            )
            .unwrap();
        assert_eq!(updated.username, "alicia");
        assert!(users.authenticate("alicia", "new").is_ok());
        assert!(users.authenticate("alicia", "old").is_err());
    }

    #[test]
    fn resolver_maps_both_directions() {
        let users = setup_service();
        let alice = users.create("alice", "pw").unwrap();
        let bob = users.create("bob", "pw").unwrap();

        assert_eq!(users.id_to_handle(&alice.id).unwrap(), "alice");
        assert_eq!(users.handle_to_id("bob").unwrap(), bob.id);

        let handles = users
            .ids_to_handles(&[bob.id.clone(), "ghost".into(), alice.id.clone()])
            .unwrap();
        assert_eq!(handles, vec!["bob", DELETED_USER, "alice"]);

        assert!(matches!(
            users.handles_to_ids(&["alice".into(), "ghost".into()]),
            Err(SocialError::UserNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn delete_missing_user_is_not_found() {
        let users = setup_service();
        let alice = users.create("alice", "pw").unwrap();
        users.delete(&alice.id).unwrap();
        assert!(matches!(users.delete(&alice.id), Err(SocialError::UserNotFound(_))));
    }
}
