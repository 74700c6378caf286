use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    application::{
        comments::CommentError,
        error::HttpError,
        forms::{FormErrors, PostFormInput, PostFormValues, UploadedFile},
        posts::{EditAccess, PostError},
    },
    presentation::views::{
        LayoutChrome, LayoutContext, PostFormTemplate, PostFormView, post_href, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{CurrentUser, HttpState, parse_id};

const SOURCE_BASE: &str = "infra::http::posts";

pub(super) async fn post_create_form(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
) -> Response {
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let content = PostFormView::create(&groups);
    render_form(LayoutChrome::for_viewer(Some(&user)), content)
}

pub(super) async fn post_create(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Response {
    let input = match read_post_form(&mut multipart).await {
        Ok(input) => input,
        Err(err) => return err.into_response(),
    };

    match state.posts.create(user.id, input).await {
        Ok(_) => Redirect::to(&profile_href(&user.username)).into_response(),
        Err(PostError::Invalid { errors, values }) => {
            let groups = match state.posts.group_choices().await {
                Ok(groups) => groups,
                Err(err) => return HttpError::from(err).into_response(),
            };
            let content = PostFormView::with_errors(
                false,
                "/create/".to_string(),
                &values,
                &groups,
                &errors,
            );
            render_form(LayoutChrome::for_viewer(Some(&user)), content)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn post_edit_form(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user));
    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(chrome, &format!("/posts/{raw_id}/edit/"));
    };

    let post = match state.posts.edit_access(id, user.id).await {
        Ok(EditAccess::Allowed(post)) => post,
        Ok(EditAccess::NotAuthor(post)) => {
            debug!(post_id = post.id, user_id = user.id, "edit denied to non-author");
            return Redirect::to(&post_href(post.id)).into_response();
        }
        Ok(EditAccess::NotFound) => {
            return render_not_found_response(chrome, &format!("/posts/{id}/edit/"));
        }
        Err(err) => return HttpError::from(err).into_response(),
    };

    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let values = PostFormValues {
        text: post.text.clone(),
        group_id: post.group_id,
        current_image: post.image.clone(),
    };
    let content = PostFormView::edit(post.id, &values, &groups, &FormErrors::new());
    render_form(chrome, content)
}

pub(super) async fn post_update(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user));
    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(chrome, &format!("/posts/{raw_id}/edit/"));
    };

    let post = match state.posts.edit_access(id, user.id).await {
        Ok(EditAccess::Allowed(post)) => post,
        Ok(EditAccess::NotAuthor(post)) => {
            debug!(post_id = post.id, user_id = user.id, "edit denied to non-author");
            return Redirect::to(&post_href(post.id)).into_response();
        }
        Ok(EditAccess::NotFound) => {
            return render_not_found_response(chrome, &format!("/posts/{id}/edit/"));
        }
        Err(err) => return HttpError::from(err).into_response(),
    };

    let input = match read_post_form(&mut multipart).await {
        Ok(input) => input,
        Err(err) => return err.into_response(),
    };

    match state.posts.update(&post, input).await {
        Ok(updated) => Redirect::to(&post_href(updated.id)).into_response(),
        Err(PostError::Invalid { errors, values }) => {
            let groups = match state.posts.group_choices().await {
                Ok(groups) => groups,
                Err(err) => return HttpError::from(err).into_response(),
            };
            let content = PostFormView::edit(post.id, &values, &groups, &errors);
            render_form(chrome, content)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user));
    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(chrome, &format!("/posts/{raw_id}/comment/"));
    };

    match state.comments.add_comment(id, user.id, &form.text).await {
        Ok(_) => Redirect::to(&post_href(id)).into_response(),
        Err(CommentError::Invalid(_)) => {
            debug!(post_id = id, user_id = user.id, "dropping empty comment");
            Redirect::to(&post_href(id)).into_response()
        }
        Err(CommentError::PostNotFound) => {
            render_not_found_response(chrome, &format!("/posts/{id}/comment/"))
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn render_form(chrome: LayoutChrome, content: PostFormView) -> Response {
    let title = if content.is_edit {
        "Edit post"
    } else {
        "New post"
    };
    let view = LayoutContext::new(chrome, title, content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

async fn read_post_form(multipart: &mut Multipart) -> Result<PostFormInput, HttpError> {
    let mut input = PostFormInput::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target: SOURCE_BASE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(HttpError::from_error(
                    SOURCE_BASE,
                    status,
                    "Could not read the submitted form",
                    &err,
                ));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => input.text = field_text(field).await?,
            Some("group") => input.group = Some(field_text(field).await?),
            Some("image-clear") => {
                let value = field_text(field).await?;
                input.clear_image = !matches!(value.trim(), "" | "false" | "0" | "off");
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(|value| value.to_string())
                    .unwrap_or_default();
                let data = field.bytes().await.map_err(|err| {
                    HttpError::from_error(
                        SOURCE_BASE,
                        err.status(),
                        "Could not read the uploaded file",
                        &err,
                    )
                })?;
                input.image = Some(UploadedFile {
                    filename,
                    data,
                });
            }
            _ => continue,
        }
    }

    Ok(input)
}

async fn field_text(
    field: axum_extra::extract::multipart::Field,
) -> Result<String, HttpError> {
    field.text().await.map_err(|err| {
        HttpError::from_error(
            SOURCE_BASE,
            err.status(),
            "Could not read the submitted form",
            &err,
        )
    })
}
