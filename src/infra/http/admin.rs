//! Operator endpoints bound to the admin listener.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::{
    application::{
        error::HttpError,
        groups::{CreateGroupCommand, GroupService},
        repos::HealthRepo,
    },
    cache::CacheState,
    domain::entities::GroupRecord,
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct AdminState {
    pub cache: CacheState,
    pub groups: Arc<GroupService>,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/cache/clear", post(clear_cache))
        .route("/cache/invalidate", post(invalidate_cache_path))
        .route("/groups", get(list_groups).post(create_group))
        .route("/_health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn clear_cache(State(state): State<AdminState>) -> Response {
    let removed = state.cache.store.invalidate_all();
    counter!("murmur_response_cache_invalidated_total").increment(removed as u64);
    info!(
        target: "murmur::http::admin",
        removed,
        "response cache cleared"
    );
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InvalidateQuery {
    path: Option<String>,
}

async fn invalidate_cache_path(
    State(state): State<AdminState>,
    Query(query): Query<InvalidateQuery>,
) -> Response {
    let Some(path) = query.path.filter(|path| path.starts_with('/')) else {
        return HttpError::new(
            "infra::http::admin::invalidate_cache_path",
            StatusCode::BAD_REQUEST,
            "Missing path",
            "`path` must be an absolute request path",
        )
        .into_response();
    };

    let removed = state.cache.store.invalidate_path(&path);
    counter!("murmur_response_cache_invalidated_total").increment(removed as u64);
    info!(
        target: "murmur::http::admin",
        path = %path,
        removed,
        "cached responses invalidated"
    );
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Serialize)]
struct GroupResponse {
    id: i64,
    title: String,
    slug: String,
    description: String,
    created_at: String,
}

impl From<GroupRecord> for GroupResponse {
    fn from(group: GroupRecord) -> Self {
        Self {
            id: group.id,
            created_at: group.created_at.format(&Rfc3339).unwrap_or_default(),
            title: group.title,
            slug: group.slug,
            description: group.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateGroupRequest {
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    description: String,
}

async fn list_groups(State(state): State<AdminState>) -> Response {
    match state.groups.list().await {
        Ok(groups) => {
            let body: Vec<GroupResponse> = groups.into_iter().map(GroupResponse::from).collect();
            Json(body).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn create_group(
    State(state): State<AdminState>,
    Json(request): Json<CreateGroupRequest>,
) -> Response {
    let command = CreateGroupCommand {
        title: request.title,
        slug: request.slug,
        description: request.description,
    };

    match state.groups.create(command).await {
        Ok(group) => (StatusCode::CREATED, Json(GroupResponse::from(group))).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.health.ping().await)
}
