use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{SlugError, derive_slug, validate_slug};

pub const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("group title is required and must be at most {MAX_TITLE_CHARS} characters")]
    InvalidTitle,
    #[error("invalid group slug: {0}")]
    InvalidSlug(#[from] SlugError),
    #[error("a group with slug `{0}` already exists")]
    DuplicateSlug(String),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

/// Operator-side group management (CLI and admin listener).
#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create(&self, cmd: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = cmd.title.trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            return Err(GroupError::InvalidTitle);
        }

        let slug = match cmd
            .slug
            .map(|slug| slug.trim().to_string())
            .filter(|slug| !slug.is_empty())
        {
            Some(slug) => {
                validate_slug(&slug)?;
                slug
            }
            None => derive_slug(&title)?,
        };

        if self.groups.find_by_slug(&slug).await?.is_some() {
            return Err(GroupError::DuplicateSlug(slug));
        }

        let group = match self
            .groups
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: cmd.description.trim().to_string(),
            })
            .await
        {
            Ok(group) => group,
            Err(RepoError::Duplicate { .. }) => return Err(GroupError::DuplicateSlug(slug)),
            Err(err) => return Err(err.into()),
        };

        info!(
            target: "murmur::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }
}
