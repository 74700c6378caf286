use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::forms::{
    CONTRADICTORY_IMAGE, FormErrors, INVALID_CHOICE, INVALID_IMAGE, PostFormInput,
    PostFormValues, UploadedFile, optional_choice, required_text,
};
use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRecord, PostRecord};
use crate::infra::uploads::{ImageStorage, UploadStorageError};

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
    #[error("submitted post form is invalid")]
    Invalid {
        errors: FormErrors,
        values: PostFormValues,
    },
}

/// Outcome of checking whether a user may edit a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAccess {
    NotFound,
    NotAuthor(PostRecord),
    Allowed(PostRecord),
}

#[derive(Debug)]
enum ImageChange {
    Keep,
    Clear,
    Replace(UploadedFile),
}

#[derive(Debug)]
struct ValidatedPost {
    text: String,
    group_id: Option<i64>,
    image: ImageChange,
}

/// Write side for posts: creation and author-only edits.
#[derive(Clone)]
pub struct PostService {
    pub(crate) reader: Arc<dyn PostsRepo>,
    pub(crate) writer: Arc<dyn PostsWriteRepo>,
    pub(crate) groups: Arc<dyn GroupsRepo>,
    pub(crate) images: Arc<ImageStorage>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        images: Arc<ImageStorage>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            images,
        }
    }

    /// Choices for the group select.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create(
        &self,
        author_id: i64,
        input: PostFormInput,
    ) -> Result<PostRecord, PostError> {
        let validated = self.validate(input, None).await?;

        let image = match validated.image {
            ImageChange::Replace(file) => Some(self.store_image(file).await?),
            ImageChange::Keep | ImageChange::Clear => None,
        };

        let result = self
            .writer
            .create_post(CreatePostParams {
                author_id,
                text: validated.text,
                group_id: validated.group_id,
                image: image.clone(),
            })
            .await;

        match result {
            Ok(post) => {
                info!(
                    target: "murmur::posts",
                    post_id = post.id,
                    author_id,
                    "post created"
                );
                Ok(post)
            }
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                Err(err.into())
            }
        }
    }

    pub async fn edit_access(&self, post_id: i64, user_id: i64) -> Result<EditAccess, PostError> {
        Ok(match self.reader.find_by_id(post_id).await? {
            None => EditAccess::NotFound,
            Some(post) if post.author_id != user_id => EditAccess::NotAuthor(post),
            Some(post) => EditAccess::Allowed(post),
        })
    }

    /// Apply an edit by the post's author; the caller checks authorship via
    /// [`PostService::edit_access`].
    pub async fn update(
        &self,
        post: &PostRecord,
        input: PostFormInput,
    ) -> Result<PostRecord, PostError> {
        let validated = self.validate(input, post.image.clone()).await?;

        let (image, stored) = match validated.image {
            ImageChange::Keep => (post.image.clone(), None),
            ImageChange::Clear => (None, None),
            ImageChange::Replace(file) => {
                let reference = self.store_image(file).await?;
                (Some(reference.clone()), Some(reference))
            }
        };

        let result = self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                text: validated.text,
                group_id: validated.group_id,
                image,
            })
            .await;

        match result {
            Ok(updated) => {
                info!(target: "murmur::posts", post_id = updated.id, "post updated");
                Ok(updated)
            }
            Err(err) => {
                self.discard_image(stored.as_deref()).await;
                Err(err.into())
            }
        }
    }

    async fn validate(
        &self,
        input: PostFormInput,
        current_image: Option<String>,
    ) -> Result<ValidatedPost, PostError> {
        let mut errors = FormErrors::new();

        let text = required_text(&mut errors, "text", &input.text);

        let mut group_id = optional_choice(&mut errors, "group", input.group.as_deref());
        if let Some(id) = group_id
            && self.groups.find_by_id(id).await?.is_none()
        {
            errors.add("group", INVALID_CHOICE);
            group_id = None;
        }

        let upload = input
            .image
            .filter(|file| !(file.filename.is_empty() && file.data.is_empty()));
        let image = match upload {
            Some(_) if input.clear_image => {
                errors.add("image", CONTRADICTORY_IMAGE);
                ImageChange::Keep
            }
            Some(file) => match ImageStorage::probe(&file.data) {
                Ok(_) => ImageChange::Replace(file),
                Err(_) => {
                    errors.add("image", INVALID_IMAGE);
                    ImageChange::Keep
                }
            },
            None if input.clear_image => ImageChange::Clear,
            None => ImageChange::Keep,
        };

        if !errors.is_empty() {
            return Err(PostError::Invalid {
                errors,
                values: PostFormValues {
                    text,
                    group_id,
                    current_image,
                },
            });
        }

        Ok(ValidatedPost {
            text,
            group_id,
            image,
        })
    }

    async fn store_image(&self, file: UploadedFile) -> Result<String, PostError> {
        Ok(self.images.store_image(&file.filename, file.data).await?)
    }

    async fn discard_image(&self, reference: Option<&str>) {
        if let Some(reference) = reference
            && let Err(err) = self.images.delete(reference).await
        {
            warn!(reference, error = %err, "failed to remove orphaned image");
        }
    }
}
