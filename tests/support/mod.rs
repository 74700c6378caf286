#![allow(dead_code)]

mod memory;

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use argon2::{Algorithm, Argon2, Params, Version};
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use murmur::{
    application::{
        accounts::AccountService,
        comments::CommentService,
        feed::FeedService,
        follows::FollowService,
        groups::GroupService,
        posts::PostService,
        repos::{
            CommentsRepo, CreateGroupParams, CreatePostParams, FollowsRepo, GroupsRepo,
            HealthRepo, PostsRepo, PostsWriteRepo, SessionsRepo, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState, ResponseStore},
    domain::entities::{GroupRecord, PostRecord, UserRecord},
    infra::{
        http::{self, AdminState, HttpState, SessionCookieSettings},
        uploads::ImageStorage,
    },
};
use tempfile::TempDir;
use tower::ServiceExt;

pub use memory::MemoryRepositories;

pub const PASSWORD: &str = "correct-horse-battery";
pub const COOKIE_NAME: &str = "murmur_session";
pub const BOUNDARY: &str = "murmur-test-boundary";

/// A 1x1 GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x21, 0xf9,
    0x04, 0x01, 0x0a, 0x00, 0x01, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
    0x00, 0x02, 0x02, 0x4c, 0x01, 0x00, 0x3b,
];

pub struct TestApp {
    pub router: Router,
    pub admin: Router,
    pub repos: Arc<MemoryRepositories>,
    pub accounts: Arc<AccountService>,
    pub cache: CacheState,
    pub uploads: TempDir,
}

pub struct TestOptions {
    pub page_size: u32,
    pub cache: CacheConfig,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            page_size: 8,
            cache: CacheConfig::default(),
        }
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    pub fn with_options(options: TestOptions) -> Self {
        let repos = Arc::new(MemoryRepositories::new());
        let users: Arc<dyn UsersRepo> = repos.clone();
        let groups: Arc<dyn GroupsRepo> = repos.clone();
        let posts: Arc<dyn PostsRepo> = repos.clone();
        let posts_write: Arc<dyn PostsWriteRepo> = repos.clone();
        let comments: Arc<dyn CommentsRepo> = repos.clone();
        let follows: Arc<dyn FollowsRepo> = repos.clone();
        let sessions: Arc<dyn SessionsRepo> = repos.clone();
        let health: Arc<dyn HealthRepo> = repos.clone();

        let uploads = tempfile::tempdir().expect("uploads dir");
        let images =
            Arc::new(ImageStorage::new(uploads.path().to_path_buf()).expect("image storage"));

        let page_size = NonZeroU32::new(options.page_size).expect("non-zero page size");
        let feed = Arc::new(FeedService::new(
            posts.clone(),
            groups.clone(),
            users.clone(),
            comments.clone(),
            follows.clone(),
            page_size,
        ));
        let post_service = Arc::new(PostService::new(
            posts.clone(),
            posts_write,
            groups.clone(),
            images.clone(),
        ));
        let comment_service = Arc::new(CommentService::new(posts, comments));
        let follow_service = Arc::new(FollowService::new(users.clone(), follows));
        let session_ttl = Duration::from_secs(60 * 60);
        let accounts = Arc::new(
            AccountService::new(users, sessions, session_ttl).with_argon2(cheap_argon2()),
        );
        let cache = CacheState::new(Arc::new(ResponseStore::new(options.cache.clone())));

        let http_state = HttpState {
            feed,
            posts: post_service,
            comments: comment_service,
            follows: follow_service,
            accounts: accounts.clone(),
            images,
            session: SessionCookieSettings {
                cookie_name: COOKIE_NAME.to_string(),
                secure: false,
                ttl: session_ttl,
            },
            upload_limit_bytes: 1024 * 1024,
            cache: options.cache.enabled.then(|| cache.clone()),
        };
        let admin_state = AdminState {
            cache: cache.clone(),
            groups: Arc::new(GroupService::new(groups)),
            health,
        };

        Self {
            router: http::build_router(http_state),
            admin: http::build_admin_router(admin_state),
            repos,
            accounts,
            cache,
            uploads,
        }
    }

    pub async fn user(&self, username: &str) -> UserRecord {
        let password_hash = self.accounts.hash_password(PASSWORD).await.expect("hash");
        UsersRepo::create_user(
            &*self.repos,
            murmur::application::repos::CreateUserParams {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: format!("{username}@example.org"),
                password_hash,
            },
        )
        .await
        .expect("create user")
    }

    /// Cookie header value for a fresh session of an existing user.
    pub async fn login(&self, username: &str) -> String {
        let issued = self.accounts.login(username, PASSWORD).await.expect("login");
        format!("{COOKIE_NAME}={}", issued.token)
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        GroupsRepo::create_group(
            &*self.repos,
            CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: format!("About {title}"),
            },
        )
        .await
        .expect("create group")
    }

    pub async fn post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        PostsWriteRepo::create_post(
            &*self.repos,
            CreatePostParams {
                author_id: author.id,
                text: text.to_string(),
                group_id: group.map(|group| group.id),
                image: None,
            },
        )
        .await
        .expect("create post")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        form: MultipartBody,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut request = Request::post(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(form.finish())).unwrap())
            .await
    }

    pub async fn admin_request(&self, request: Request<Body>) -> Response<Body> {
        self.admin.clone().oneshot(request).await.unwrap()
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

fn cheap_argon2() -> Argon2<'static> {
    Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(8, 1, 1, None).expect("argon2 params"),
    )
}

/// Hand-assembled `multipart/form-data` payload.
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Number of post cards rendered on a feed page.
pub fn post_cards(html: &str) -> usize {
    html.matches("class=\"post-text\"").count()
}

/// Extract the session cookie pair from a `Set-Cookie` header.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(COOKIE_NAME))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}
