use std::sync::Arc;

use thiserror::Error;

use crate::application::forms::{FormErrors, required_text};
use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::CommentRecord;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("post not found")]
    PostNotFound,
    #[error("submitted comment is invalid")]
    Invalid(FormErrors),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    pub async fn add_comment(
        &self,
        post_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<CommentRecord, CommentError> {
        if self.posts.find_by_id(post_id).await?.is_none() {
            return Err(CommentError::PostNotFound);
        }

        let mut errors = FormErrors::new();
        let text = required_text(&mut errors, "text", text);
        errors.into_result().map_err(CommentError::Invalid)?;

        Ok(self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id,
                text,
            })
            .await?)
    }
}
