use crate::database::models::SessionRecord;
use crate::database::repositories::SessionRepository;
use crate::database::Database;
use crate::errors::{SocialError, SocialResult};
use crate::utils::{new_id, now_utc_iso};

/// Opaque cookie tokens mapped to user ids.
#[derive(Clone)]
pub struct SessionService {
    database: Database,
}

impl SessionService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn start(&self, user_id: &str) -> SocialResult<String> {
        let record = SessionRecord {
            token: new_id(),
            user_id: user_id.to_string(),
            created_at: now_utc_iso(),
        };
        let _: () = self
            .database
            .with_repositories(|repos| repos.sessions().create(&record))?;
        tracing::debug!(user_id = %user_id, "session started");
        Ok(record.token)
    }

    /// User behind `token`, failing with `NotLoggedIn` when absent or stale.
    pub fn user_for(&self, token: Option<&str>) -> SocialResult<String> {
        let Some(token) = token else {
            return Err(SocialError::NotLoggedIn);
        };
        let session: Option<SessionRecord> = self
            .database
            .with_repositories(|repos| repos.sessions().get(token))?;
        session
            .map(|session| session.user_id)
            .ok_or(SocialError::NotLoggedIn)
    }

    /// Fails with `AlreadyLoggedIn` when `token` names a live session.
    pub fn ensure_logged_out(&self, token: Option<&str>) -> SocialResult<()> {
        match self.user_for(token) {
            Ok(_) => Err(SocialError::AlreadyLoggedIn),
            Err(SocialError::NotLoggedIn) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn end(&self, token: &str) -> SocialResult<()> {
        let _: usize = self
            .database
            .with_repositories(|repos| repos.sessions().delete(token))?;
        Ok(())
    }

    pub fn end_all_for(&self, user_id: &str) -> SocialResult<()> {
        let _: usize = self
            .database
            .with_repositories(|repos| repos.sessions().delete_for_user(user_id))?;
        Ok(())
    }
}
