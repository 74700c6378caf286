mod support;

use axum::http::{StatusCode, header};

use support::{COOKIE_NAME, PASSWORD, TestApp, body_string, location, session_cookie};

fn login_body(username: &str, password: &str, next: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("username", username)
        .append_pair("password", password)
        .append_pair("next", next)
        .finish()
}

#[tokio::test]
async fn login_sets_a_session_cookie_and_follows_local_next() {
    let app = TestApp::new();
    app.user("leo").await;

    let response = app
        .post_form("/auth/login/", &login_body("leo", PASSWORD, "/create/"), None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/create/");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with(&format!("{COOKIE_NAME}=ms_")));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let cookie = session_cookie(&response).expect("session cookie");
    let page = app.get("/create/", Some(&cookie)).await;
    assert_eq!(page.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_ignores_foreign_next_targets() {
    let app = TestApp::new();
    app.user("leo").await;

    for next in ["https://evil.example/", "//evil.example/", ""] {
        let response = app
            .post_form("/auth/login/", &login_body("leo", PASSWORD, next), None)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{next}");
        assert_eq!(location(&response), "/", "{next}");
    }
}

#[tokio::test]
async fn wrong_password_re_renders_the_form() {
    let app = TestApp::new();
    app.user("leo").await;

    let response = app
        .post_form("/auth/login/", &login_body("leo", "nope", "/follow/"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    let html = body_string(response).await;
    assert!(html.contains("Please enter a correct username and password."));
    assert!(html.contains("value=\"/follow/\""));
}

#[tokio::test]
async fn login_form_carries_next_from_the_query() {
    let app = TestApp::new();

    let response = app.get("/auth/login/?next=%2Fcreate%2F", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("value=\"/create/\""));
}

#[tokio::test]
async fn signup_creates_an_account_and_logs_in() {
    let app = TestApp::new();

    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("first_name", "Lev")
        .append_pair("last_name", "Tolstoy")
        .append_pair("username", "lev")
        .append_pair("email", "lev@example.org")
        .append_pair("password1", PASSWORD)
        .append_pair("password2", PASSWORD)
        .finish();
    let response = app.post_form("/auth/signup/", &body, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let cookie = session_cookie(&response).expect("session cookie");
    let home = body_string(app.get("/", Some(&cookie)).await).await;
    assert!(home.contains("Lev Tolstoy"));

    let duplicate = app.post_form("/auth/signup/", &body, None).await;
    assert_eq!(duplicate.status(), StatusCode::OK);
    assert!(
        body_string(duplicate)
            .await
            .contains("A user with that username already exists.")
    );
}

#[tokio::test]
async fn signup_rejects_mismatched_passwords() {
    let app = TestApp::new();

    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("username", "lev")
        .append_pair("password1", PASSWORD)
        .append_pair("password2", "something-else-entirely")
        .finish();
    let response = app.post_form("/auth/signup/", &body, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert!(app.repos.sessions().await.is_empty());
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    app.user("leo").await;
    let cookie = app.login("leo").await;
    assert_eq!(app.repos.sessions().await.len(), 1);

    let response = app.get("/auth/logout/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.repos.sessions().await.is_empty());

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn garbage_cookies_are_treated_as_anonymous() {
    let app = TestApp::new();

    let cookie = format!("{COOKIE_NAME}=ms_deadbeef_{}", "x".repeat(40));
    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app.get("/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn concurrent_logins_each_get_a_session() {
    let app = TestApp::new();
    app.user("leo").await;
    app.user("mia").await;

    let leo = login_body("leo", PASSWORD, "/");
    let mia = login_body("mia", PASSWORD, "/");
    let (first, second) = tokio::join!(
        app.post_form("/auth/login/", &leo, None),
        app.post_form("/auth/login/", &mia, None),
    );

    for response in [first, second] {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(session_cookie(&response).is_some());
    }
    assert_eq!(app.repos.sessions().await.len(), 2);
}

#[tokio::test]
async fn password_hashes_are_salted() {
    let app = TestApp::new();

    let first = app.accounts.hash_password(PASSWORD).await.unwrap();
    let second = app.accounts.hash_password(PASSWORD).await.unwrap();
    assert!(first.starts_with("$argon2id$"));
    assert_ne!(first, second);
}
