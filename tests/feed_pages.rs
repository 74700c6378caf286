mod support;

use axum::http::StatusCode;

use support::{TestApp, body_string, post_cards};

#[tokio::test]
async fn listing_pages_render_for_anonymous_visitors() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    let cats = app.group("Cats", "cats").await;
    let post = app.post(&leo, "Whiskers on kittens", Some(&cats)).await;

    for uri in [
        "/".to_string(),
        "/group/cats/".to_string(),
        "/profile/leo/".to_string(),
        format!("/posts/{}/", post.id),
    ] {
        let response = app.get(&uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let html = body_string(response).await;
        assert!(html.contains("Whiskers on kittens"), "{uri}");
    }
}

#[tokio::test]
async fn unknown_resources_render_not_found() {
    let app = TestApp::new();
    app.user("leo").await;

    for uri in [
        "/group/missing/",
        "/profile/nobody/",
        "/posts/999/",
        "/posts/abc/",
        "/posts/0/",
        "/unexisting_page/",
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn home_splits_thirteen_posts_into_eight_and_five() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    for n in 0..13 {
        app.post(&leo, &format!("Post number {n}"), None).await;
    }

    let first = body_string(app.get("/", None).await).await;
    assert_eq!(post_cards(&first), 8);
    assert!(first.contains("Post number 12"));
    assert!(!first.contains("Post number 4<"));

    let second = body_string(app.get("/?page=2", None).await).await;
    assert_eq!(post_cards(&second), 5);
    assert!(second.contains("Post number 0"));
}

#[tokio::test]
async fn out_of_range_and_garbage_pages_are_clamped() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    for n in 0..13 {
        app.post(&leo, &format!("Post number {n}"), None).await;
    }

    let beyond = body_string(app.get("/?page=99", None).await).await;
    assert_eq!(post_cards(&beyond), 5);

    let garbage = body_string(app.get("/?page=abc", None).await).await;
    assert_eq!(post_cards(&garbage), 8);
}

#[tokio::test]
async fn group_and_profile_pages_filter_their_posts() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    let anna = app.user("anna").await;
    let cats = app.group("Cats", "cats").await;
    let dogs = app.group("Dogs", "dogs").await;
    app.post(&leo, "A post about cats", Some(&cats)).await;
    app.post(&anna, "A post about dogs", Some(&dogs)).await;

    let group = body_string(app.get("/group/cats/", None).await).await;
    assert!(group.contains("A post about cats"));
    assert!(!group.contains("A post about dogs"));

    let profile = body_string(app.get("/profile/anna/", None).await).await;
    assert!(profile.contains("A post about dogs"));
    assert!(!profile.contains("A post about cats"));
    assert!(profile.contains("<span id=\"posts-count\">1</span>"));
}

#[tokio::test]
async fn post_detail_shows_author_count_comments_and_edit_link_for_author() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    app.user("anna").await;
    app.post(&leo, "Earlier post", None).await;
    let post = app.post(&leo, "The one with comments", None).await;

    let leo_cookie = app.login("leo").await;
    let anna_cookie = app.login("anna").await;
    let response = app
        .post_form(
            &format!("/posts/{}/comment/", post.id),
            "text=Lovely+words",
            Some(&anna_cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let uri = format!("/posts/{}/", post.id);
    let as_author = body_string(app.get(&uri, Some(&leo_cookie)).await).await;
    assert!(as_author.contains("<span id=\"author-posts-count\">2</span>"));
    assert!(as_author.contains("Lovely words"));
    assert!(as_author.contains(&format!("/posts/{}/edit/", post.id)));

    let as_reader = body_string(app.get(&uri, Some(&anna_cookie)).await).await;
    assert!(!as_reader.contains(&format!("/posts/{}/edit/", post.id)));
    assert!(as_reader.contains("name=\"text\""));

    let anonymous = body_string(app.get(&uri, None).await).await;
    assert!(!anonymous.contains("Add a comment"));
}
