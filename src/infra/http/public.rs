use std::{io::ErrorKind, sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, RawQuery, State},
    http::{
        HeaderValue, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use tracing::error;
use url::form_urlencoded;

use crate::{
    application::{
        accounts::AccountService, comments::CommentService, error::HttpError, feed::FeedService,
        follows::FollowService, posts::PostService,
    },
    cache::{CacheState, response_cache_layer},
    infra::uploads::{ImageStorage, UploadStorageError},
    presentation::views::{
        FeedView, GroupTemplate, GroupView, HomeView, IndexTemplate, LayoutContext,
        PostDetailTemplate, PostDetailView, ProfileTemplate, ProfileView,
        render_not_found_response, render_template_response,
    },
};

use super::{
    Viewer, accounts, follows,
    middleware::{load_session, log_responses, require_login, set_request_context},
    parse_id, posts,
};

/// How the session cookie is issued.
#[derive(Debug, Clone)]
pub struct SessionCookieSettings {
    pub cookie_name: String,
    pub secure: bool,
    pub ttl: Duration,
}

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub images: Arc<ImageStorage>,
    pub session: SessionCookieSettings,
    pub upload_limit_bytes: usize,
    pub cache: Option<CacheState>,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the home feed is cached.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            response_cache_layer,
        ))
    } else {
        cached_routes
    };

    let upload_limit = DefaultBodyLimit::max(state.upload_limit_bytes);
    let protected_routes = Router::new()
        .route(
            "/create/",
            get(posts::post_create_form)
                .post(posts::post_create)
                .layer(upload_limit.clone()),
        )
        .route(
            "/posts/{id}/edit/",
            get(posts::post_edit_form)
                .post(posts::post_update)
                .layer(upload_limit),
        )
        .route("/posts/{id}/comment/", post(posts::add_comment))
        .route("/follow/", get(follows::follow_index))
        .route(
            "/profile/{username}/follow/",
            get(follows::profile_follow).post(follows::profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(follows::profile_unfollow).post(follows::profile_unfollow),
        )
        .route_layer(middleware::from_fn(require_login));

    let open_routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route(
            "/auth/signup/",
            get(accounts::signup_form).post(accounts::signup),
        )
        .route("/auth/login/", get(accounts::login_form).post(accounts::login))
        .route(
            "/auth/logout/",
            get(accounts::logout).post(accounts::logout),
        )
        .route("/media/{*path}", get(serve_media));

    cached_routes
        .merge(protected_routes)
        .merge(open_routes)
        .fallback(not_found)
        .with_state(state.clone())
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state, load_session))
        .layer(middleware::from_fn(set_request_context))
}

/// The `page` query parameter; the last occurrence wins.
pub(super) fn page_param(query: Option<&str>) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .filter(|(key, _)| key == "page")
        .map(|(_, value)| value.into_owned())
        .last()
}

async fn index(
    State(state): State<HttpState>,
    viewer: Viewer,
    RawQuery(query): RawQuery,
) -> Response {
    let page = page_param(query.as_deref());
    match state.feed.home(page.as_deref()).await {
        Ok(page) => {
            let content = HomeView {
                feed: FeedView::from(&page),
            };
            let view = LayoutContext::new(viewer.chrome(), "Latest posts", content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let page = page_param(query.as_deref());
    match state.feed.group(&slug, page.as_deref()).await {
        Ok(Some(feed)) => {
            let content = GroupView::from(&feed);
            let title = format!("Group {}", content.title);
            let view = LayoutContext::new(viewer.chrome(), title, content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(viewer.chrome(), &format!("/group/{slug}/")),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let page = page_param(query.as_deref());
    match state
        .feed
        .profile(&username, page.as_deref(), viewer.id())
        .await
    {
        Ok(Some(feed)) => {
            let content = ProfileView::from(&feed);
            let title = format!("Profile of {}", content.full_name);
            let view = LayoutContext::new(viewer.chrome(), title, content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(viewer.chrome(), &format!("/profile/{username}/")),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(viewer.chrome(), &format!("/posts/{raw_id}/"));
    };

    match state.feed.post_detail(id, viewer.id()).await {
        Ok(Some(detail)) => {
            let content = PostDetailView::from(&detail);
            let title = format!("Post {}", content.post.label);
            let view = LayoutContext::new(viewer.chrome(), title, content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(viewer.chrome(), &format!("/posts/{id}/")),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.images.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target: SOURCE,
                path = %path,
                error = %err,
                "failed to read stored image"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read stored file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn not_found(viewer: Viewer, request: Request<Body>) -> Response {
    render_not_found_response(viewer.chrome(), request.uri().path())
}
