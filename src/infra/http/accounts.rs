use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    application::{
        accounts::{AccountError, INVALID_LOGIN, SessionIssued, SignupCommand},
        error::HttpError,
        forms::FormErrors,
    },
    presentation::views::{
        LayoutChrome, LayoutContext, LoggedOutTemplate, LoggedOutView, LoginTemplate, LoginView,
        SignupTemplate, SignupView, render_template_response,
    },
};

use super::{HttpState, Viewer, safe_next};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    first_name: String,
    last_name: String,
    username: String,
    email: String,
    password1: String,
    password2: String,
}

pub(super) async fn login_form(viewer: Viewer, Query(query): Query<NextQuery>) -> Response {
    let next = query.next.unwrap_or_default();
    render_login(viewer.chrome(), LoginView::new("", next, &FormErrors::new()))
}

pub(super) async fn login(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = form.next.clone().unwrap_or_default();

    match state.accounts.login(&form.username, &form.password).await {
        Ok(issued) => {
            let target = safe_next(form.next.as_deref()).unwrap_or("/").to_string();
            info!(
                target: "murmur::accounts",
                user_id = issued.user.id,
                "user logged in"
            );
            (session_cookie(&state, jar, &issued), Redirect::to(&target)).into_response()
        }
        Err(AccountError::InvalidCredentials) => {
            let mut errors = FormErrors::new();
            errors.add_non_field(INVALID_LOGIN);
            render_login(
                viewer.chrome(),
                LoginView::new(form.username.trim(), next, &errors),
            )
        }
        Err(AccountError::Invalid(errors)) => render_login(
            viewer.chrome(),
            LoginView::new(form.username.trim(), next, &errors),
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn signup_form(viewer: Viewer) -> Response {
    render_signup(viewer.chrome(), SignupView::default())
}

pub(super) async fn signup(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    let echo = SignupView {
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        username: form.username.clone(),
        email: form.email.clone(),
        ..SignupView::default()
    };

    let command = SignupCommand {
        first_name: form.first_name,
        last_name: form.last_name,
        username: form.username,
        email: form.email,
        password1: form.password1,
        password2: form.password2,
    };

    match state.accounts.signup(command).await {
        Ok(issued) => (session_cookie(&state, jar, &issued), Redirect::to("/")).into_response(),
        Err(AccountError::Invalid(errors)) => {
            render_signup(viewer.chrome(), echo.with_errors(&errors))
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn logout(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
) -> Response {
    if let Some(user) = viewer.0.as_ref()
        && let Err(err) = state.accounts.logout(user.session_id).await
    {
        warn!(
            target: "murmur::accounts",
            user_id = user.id,
            error = %err,
            "failed to delete session"
        );
    }

    let jar = jar.remove(Cookie::build((state.session.cookie_name.clone(), "")).path("/"));
    let view = LayoutContext::new(LayoutChrome::for_viewer(None), "Logged out", LoggedOutView);
    (
        jar,
        render_template_response(LoggedOutTemplate { view }, StatusCode::OK),
    )
        .into_response()
}

fn session_cookie(state: &HttpState, jar: CookieJar, issued: &SessionIssued) -> CookieJar {
    let max_age = time::Duration::try_from(state.session.ttl).unwrap_or(time::Duration::WEEK);
    let cookie = Cookie::build((state.session.cookie_name.clone(), issued.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.session.secure)
        .max_age(max_age);
    jar.add(cookie)
}

fn render_login(chrome: LayoutChrome, content: LoginView) -> Response {
    let view = LayoutContext::new(chrome, "Log in", content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

fn render_signup(chrome: LayoutChrome, content: SignupView) -> Response {
    let view = LayoutContext::new(chrome, "Sign up", content);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}
