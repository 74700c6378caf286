use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("author not found")]
    AuthorNotFound,
}

/// What a follow request did to the edge set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollowIgnored,
    Removed,
    NotFollowing,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FollowError::AuthorNotFound)
    }

    /// Get-or-create the edge; following oneself is a silent no-op.
    pub async fn follow(
        &self,
        user_id: i64,
        username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.author(username).await?;
        if author.id == user_id {
            debug!(user_id, "ignoring self-follow");
            return Ok(FollowOutcome::SelfFollowIgnored);
        }

        if self.follows.exists(user_id, author.id).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }
        self.follows.get_or_create(user_id, author.id).await?;
        Ok(FollowOutcome::Created)
    }

    /// Removing an edge that does not exist is a no-op.
    pub async fn unfollow(
        &self,
        user_id: i64,
        username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.author(username).await?;
        let removed = self.follows.delete(user_id, author.id).await?;
        Ok(if removed > 0 {
            FollowOutcome::Removed
        } else {
            FollowOutcome::NotFollowing
        })
    }
}
