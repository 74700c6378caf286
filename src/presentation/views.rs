use crate::application::{
    accounts::AuthenticatedUser,
    error::{ErrorReport, HttpError},
    feed::{GroupFeed, PostDetail, ProfileFeed},
    forms::{FormErrors, PostFormValues},
    pagination::{Page, PageWindow},
};
use crate::domain::entities::{CommentListing, GroupRecord, PostListing};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use url::form_urlencoded;

const SITE_NAME: &str = "Murmur";

const DISPLAY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome, path: &str) -> Response {
    let content = NotFoundView {
        path: path.to_string(),
    };
    let view = LayoutContext::new(chrome, "Page not found", content);
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

/// The logged-in user as shown in the navigation bar.
#[derive(Clone)]
pub struct ViewerView {
    pub profile_href: String,
    pub full_name: String,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub viewer: Option<ViewerView>,
}

impl LayoutChrome {
    pub fn for_viewer(viewer: Option<&AuthenticatedUser>) -> Self {
        Self {
            brand: BrandView {
                title: SITE_NAME.to_string(),
                href: "/".to_string(),
            },
            viewer: viewer.map(|user| ViewerView {
                profile_href: profile_href(&user.username),
                full_name: user.full_name.clone(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub viewer: Option<ViewerView>,
    pub title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, title: impl Into<String>, content: T) -> Self {
        Self {
            brand: chrome.brand,
            viewer: chrome.viewer,
            title: title.into(),
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub label: String,
    pub author_username: String,
    pub author_name: String,
    pub author_href: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
    pub published: String,
    pub iso_date: String,
    pub detail_href: String,
}

impl From<&PostListing> for PostCard {
    fn from(listing: &PostListing) -> Self {
        let post = &listing.post;
        Self {
            id: post.id,
            text: post.text.clone(),
            label: post.label(),
            author_username: listing.author.username.clone(),
            author_name: listing.author.full_name.clone(),
            author_href: profile_href(&listing.author.username),
            group: listing.group.as_ref().map(|group| GroupBadge {
                title: group.title.clone(),
                href: group_href(&group.slug),
            }),
            image_url: post.image.as_deref().map(media_href),
            published: format_date(post.created_at),
            iso_date: format_iso_date(post.created_at),
            detail_href: post_href(post.id),
        }
    }
}

#[derive(Clone, Copy)]
pub struct PageLink {
    pub number: u32,
    pub current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
    pub previous: Option<u32>,
    pub next: Option<u32>,
    pub links: Vec<PageLink>,
    pub has_other_pages: bool,
}

impl From<&PageWindow> for PaginatorView {
    fn from(window: &PageWindow) -> Self {
        Self {
            number: window.number,
            num_pages: window.num_pages,
            total: window.total,
            previous: window.previous_number(),
            next: window.next_number(),
            links: window
                .page_numbers()
                .into_iter()
                .map(|number| PageLink {
                    number,
                    current: number == window.number,
                })
                .collect(),
            has_other_pages: window.has_other_pages(),
        }
    }
}

/// One page of post cards with its paginator.
#[derive(Clone)]
pub struct FeedView {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl From<&Page<PostListing>> for FeedView {
    fn from(page: &Page<PostListing>) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            paginator: PaginatorView::from(&page.window),
        }
    }
}

pub struct HomeView {
    pub feed: FeedView,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<HomeView>,
}

pub struct GroupView {
    pub title: String,
    pub description: String,
    pub feed: FeedView,
}

impl From<&GroupFeed> for GroupView {
    fn from(feed: &GroupFeed) -> Self {
        Self {
            title: feed.group.title.clone(),
            description: feed.group.description.clone(),
            feed: FeedView::from(&feed.page),
        }
    }
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupView>,
}

pub struct ProfileView {
    pub username: String,
    pub full_name: String,
    pub posts_count: u64,
    pub following: bool,
    pub can_follow: bool,
    pub follow_href: String,
    pub unfollow_href: String,
    pub feed: FeedView,
}

impl From<&ProfileFeed> for ProfileView {
    fn from(profile: &ProfileFeed) -> Self {
        let base = profile_href(&profile.author.username);
        Self {
            username: profile.author.username.clone(),
            full_name: profile.author.full_name(),
            posts_count: profile.posts_count,
            following: profile.following,
            can_follow: profile.can_follow,
            follow_href: format!("{base}follow/"),
            unfollow_href: format!("{base}unfollow/"),
            feed: FeedView::from(&profile.page),
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct CommentView {
    pub author_username: String,
    pub author_name: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentListing> for CommentView {
    fn from(listing: &CommentListing) -> Self {
        Self {
            author_username: listing.author.username.clone(),
            author_name: listing.author.full_name.clone(),
            author_href: profile_href(&listing.author.username),
            text: listing.comment.text.clone(),
            published: format_date(listing.comment.created_at),
        }
    }
}

pub struct PostDetailView {
    pub post: PostCard,
    pub author_posts_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
    pub edit_href: String,
    pub comment_action: String,
}

impl From<&PostDetail> for PostDetailView {
    fn from(detail: &PostDetail) -> Self {
        let id = detail.listing.post.id;
        Self {
            post: PostCard::from(&detail.listing),
            author_posts_count: detail.author_posts_count,
            comments: detail.comments.iter().map(CommentView::from).collect(),
            can_edit: detail.can_edit,
            can_comment: detail.can_comment,
            edit_href: format!("/posts/{id}/edit/"),
            comment_action: format!("/posts/{id}/comment/"),
        }
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct GroupChoice {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub text_errors: Vec<String>,
    pub groups: Vec<GroupChoice>,
    pub group_errors: Vec<String>,
    pub current_image: Option<String>,
    pub image_errors: Vec<String>,
}

impl PostFormView {
    pub fn create(groups: &[GroupRecord]) -> Self {
        Self::build(
            false,
            "/create/".to_string(),
            &PostFormValues::default(),
            groups,
            &FormErrors::new(),
        )
    }

    pub fn edit(
        post_id: i64,
        values: &PostFormValues,
        groups: &[GroupRecord],
        errors: &FormErrors,
    ) -> Self {
        Self::build(true, format!("/posts/{post_id}/edit/"), values, groups, errors)
    }

    pub fn with_errors(
        is_edit: bool,
        action: String,
        values: &PostFormValues,
        groups: &[GroupRecord],
        errors: &FormErrors,
    ) -> Self {
        Self::build(is_edit, action, values, groups, errors)
    }

    fn build(
        is_edit: bool,
        action: String,
        values: &PostFormValues,
        groups: &[GroupRecord],
        errors: &FormErrors,
    ) -> Self {
        Self {
            is_edit,
            action,
            text: values.text.clone(),
            text_errors: errors.field("text").to_vec(),
            groups: groups
                .iter()
                .map(|group| GroupChoice {
                    id: group.id,
                    title: group.title.clone(),
                    selected: values.group_id == Some(group.id),
                })
                .collect(),
            group_errors: errors.field("group").to_vec(),
            current_image: values.current_image.clone(),
            image_errors: errors.field("image").to_vec(),
        }
    }

    pub fn current_image_url(&self) -> Option<String> {
        self.current_image.as_deref().map(media_href)
    }
}

#[derive(Template)]
#[template(path = "post_create.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct FollowView {
    pub feed: FeedView,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FollowView>,
}

#[derive(Default)]
pub struct LoginView {
    pub username: String,
    pub next: String,
    pub errors: Vec<String>,
    pub username_errors: Vec<String>,
    pub password_errors: Vec<String>,
}

impl LoginView {
    pub fn new(username: impl Into<String>, next: impl Into<String>, errors: &FormErrors) -> Self {
        Self {
            username: username.into(),
            next: next.into(),
            errors: errors.non_field().to_vec(),
            username_errors: errors.field("username").to_vec(),
            password_errors: errors.field("password").to_vec(),
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

#[derive(Default)]
pub struct SignupView {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub username_errors: Vec<String>,
    pub email_errors: Vec<String>,
    pub password1_errors: Vec<String>,
    pub password2_errors: Vec<String>,
}

impl SignupView {
    pub fn with_errors(mut self, errors: &FormErrors) -> Self {
        self.username_errors = errors.field("username").to_vec();
        self.email_errors = errors.field("email").to_vec();
        self.password1_errors = errors.field("password1").to_vec();
        self.password2_errors = errors.field("password2").to_vec();
        self
    }
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

pub struct LoggedOutView;

#[derive(Template)]
#[template(path = "logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<LoggedOutView>,
}

pub struct NotFoundView {
    pub path: String,
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<NotFoundView>,
}

/// Usernames may hold non-ASCII letters and `+`, so the segment is
/// percent-encoded.
pub fn profile_href(username: &str) -> String {
    let segment: String = form_urlencoded::byte_serialize(username.as_bytes()).collect();
    format!("/profile/{segment}/")
}

pub fn group_href(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn post_href(id: i64) -> String {
    format!("/posts/{id}/")
}

pub fn media_href(reference: &str) -> String {
    format!("/media/{reference}")
}

fn format_date(value: OffsetDateTime) -> String {
    value.format(DISPLAY_DATE).unwrap_or_default()
}

fn format_iso_date(value: OffsetDateTime) -> String {
    value.format(ISO_DATE).unwrap_or_default()
}
