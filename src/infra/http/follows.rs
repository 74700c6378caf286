use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;

use crate::{
    application::{
        accounts::AuthenticatedUser,
        error::HttpError,
        follows::{FollowError, FollowOutcome},
    },
    presentation::views::{
        FeedView, FollowTemplate, FollowView, LayoutChrome, LayoutContext, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{CurrentUser, HttpState, public::page_param};

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    RawQuery(query): RawQuery,
) -> Response {
    let page = page_param(query.as_deref());
    match state.feed.follow_feed(user.id, page.as_deref()).await {
        Ok(page) => {
            let content = FollowView {
                feed: FeedView::from(&page),
            };
            let view = LayoutContext::new(
                LayoutChrome::for_viewer(Some(&user)),
                "Following",
                content,
            );
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn profile_follow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    let result = state.follows.follow(user.id, &username).await;
    if matches!(result, Ok(FollowOutcome::Created)) {
        info!(
            target: "murmur::follows",
            user_id = user.id,
            author = %username,
            "follow edge created"
        );
    }
    follow_response(result, &user, &username)
}

pub(super) async fn profile_unfollow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    let result = state.follows.unfollow(user.id, &username).await;
    follow_response(result, &user, &username)
}

fn follow_response(
    result: Result<FollowOutcome, FollowError>,
    user: &AuthenticatedUser,
    username: &str,
) -> Response {
    match result {
        Ok(_) => Redirect::to(&profile_href(username)).into_response(),
        Err(FollowError::AuthorNotFound) => render_not_found_response(
            LayoutChrome::for_viewer(Some(user)),
            &format!("/profile/{username}/"),
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}
