use std::num::NonZeroU32;
use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{Page, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentListing, GroupRecord, PostListing, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<PostListing>,
}

#[derive(Debug, Clone)]
pub struct ProfileFeed {
    pub author: UserRecord,
    pub page: Page<PostListing>,
    pub posts_count: u64,
    /// Only ever true for an authenticated viewer other than the author.
    pub following: bool,
    /// Whether to offer a follow/unfollow control at all.
    pub can_follow: bool,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub listing: PostListing,
    pub comments: Vec<CommentListing>,
    pub author_posts_count: u64,
    pub can_edit: bool,
    pub can_comment: bool,
}

/// Read side: listing pages and post detail.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    page_size: NonZeroU32,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        page_size: NonZeroU32,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            comments,
            follows,
            page_size,
        }
    }

    pub async fn home(&self, page: Option<&str>) -> Result<Page<PostListing>, FeedError> {
        self.paginate(PostFilter::All, page).await
    }

    pub async fn group(
        &self,
        slug: &str,
        page: Option<&str>,
    ) -> Result<Option<GroupFeed>, FeedError> {
        let Some(group) = self.groups.find_by_slug(slug).await? else {
            return Ok(None);
        };
        let page = self.paginate(PostFilter::Group(group.id), page).await?;
        Ok(Some(GroupFeed { group, page }))
    }

    pub async fn profile(
        &self,
        username: &str,
        page: Option<&str>,
        viewer: Option<i64>,
    ) -> Result<Option<ProfileFeed>, FeedError> {
        let Some(author) = self.users.find_by_username(username).await? else {
            return Ok(None);
        };

        let page = self.paginate(PostFilter::Author(author.id), page).await?;
        let can_follow = viewer.is_some_and(|viewer| viewer != author.id);
        let following = match viewer {
            Some(viewer) if can_follow => self.follows.exists(viewer, author.id).await?,
            _ => false,
        };

        Ok(Some(ProfileFeed {
            posts_count: page.window.total,
            author,
            page,
            following,
            can_follow,
        }))
    }

    /// Posts by every author `user_id` follows.
    pub async fn follow_feed(
        &self,
        user_id: i64,
        page: Option<&str>,
    ) -> Result<Page<PostListing>, FeedError> {
        self.paginate(PostFilter::FollowedBy(user_id), page).await
    }

    pub async fn post_detail(
        &self,
        id: i64,
        viewer: Option<i64>,
    ) -> Result<Option<PostDetail>, FeedError> {
        let Some(listing) = self.posts.find_listing(id).await? else {
            return Ok(None);
        };

        let comments = self.comments.list_for_post(id).await?;
        let author_posts_count = self
            .posts
            .count_posts(PostFilter::Author(listing.post.author_id))
            .await?;

        Ok(Some(PostDetail {
            can_edit: viewer == Some(listing.post.author_id),
            can_comment: viewer.is_some(),
            listing,
            comments,
            author_posts_count,
        }))
    }

    async fn paginate(
        &self,
        filter: PostFilter,
        raw_page: Option<&str>,
    ) -> Result<Page<PostListing>, FeedError> {
        let total = self.posts.count_posts(filter).await?;
        let window = Paginator::new(total, self.page_size).get_page(raw_page);

        let items = if window.limit == 0 {
            Vec::new()
        } else {
            self.posts
                .list_posts(filter, window.limit, window.offset)
                .await?
        };

        Ok(Page::new(items, window))
    }
}
