mod support;

use axum::http::StatusCode;

use support::{MultipartBody, SMALL_GIF, TestApp, body_string, location};

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login_with_next() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    let post = app.post(&leo, "Hello", None).await;

    let edit = format!("/posts/{}/edit/", post.id);
    for uri in [
        "/create/",
        "/follow/",
        "/profile/leo/follow/",
        "/profile/leo/unfollow/",
        edit.as_str(),
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        let encoded: String = url::form_urlencoded::byte_serialize(uri.as_bytes()).collect();
        assert_eq!(location(&response), format!("/auth/login/?next={encoded}"));
    }

    let response = app
        .post_form(&format!("/posts/{}/comment/", post.id), "text=hi", None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login/?next="));
    assert!(app.repos.comments().await.is_empty());
}

#[tokio::test]
async fn create_form_lists_groups() {
    let app = TestApp::new();
    app.user("leo").await;
    app.group("Cats", "cats").await;
    let cookie = app.login("leo").await;

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("name=\"text\""));
    assert!(html.contains(">Cats</option>"));
}

#[tokio::test]
async fn valid_post_is_created_and_redirects_to_profile() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    let cats = app.group("Cats", "cats").await;
    let cookie = app.login("leo").await;

    let form = MultipartBody::new()
        .text("text", "Fresh thoughts")
        .text("group", &cats.id.to_string())
        .file("image", "small.gif", "image/gif", SMALL_GIF);
    let response = app.post_multipart("/create/", form, Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo/");

    let posts = app.repos.posts().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "Fresh thoughts");
    assert_eq!(posts[0].author_id, leo.id);
    assert_eq!(posts[0].group_id, Some(cats.id));
    let image = posts[0].image.clone().expect("stored image");
    assert!(image.starts_with("posts/"));

    let media = app.get(&format!("/media/{image}"), None).await;
    assert_eq!(media.status(), StatusCode::OK);
    assert_eq!(media.headers()["content-type"], "image/gif");

    let group_page = body_string(app.get("/group/cats/", None).await).await;
    assert!(group_page.contains(&format!("/media/{image}")));
}

#[tokio::test]
async fn invalid_submissions_re_render_without_saving() {
    let app = TestApp::new();
    app.user("leo").await;
    let cookie = app.login("leo").await;

    let blank = MultipartBody::new().text("text", "   ").text("group", "");
    let response = app.post_multipart("/create/", blank, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("This field is required."));

    let bad_group = MultipartBody::new().text("text", "Hi").text("group", "4242");
    let response = app.post_multipart("/create/", bad_group, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Select a valid choice."));

    let not_an_image = MultipartBody::new()
        .text("text", "Hi")
        .file("image", "notes.txt", "text/plain", b"plain text");
    let response = app
        .post_multipart("/create/", not_an_image, Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Upload a valid image."));

    assert!(app.repos.posts().await.is_empty());
}

#[tokio::test]
async fn author_can_edit_and_others_are_redirected() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    app.user("anna").await;
    let cats = app.group("Cats", "cats").await;
    let post = app.post(&leo, "Original", None).await;
    let edit = format!("/posts/{}/edit/", post.id);

    let anna = app.login("anna").await;
    let response = app.get(&edit, Some(&anna)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let response = app
        .post_multipart(&edit, MultipartBody::new().text("text", "Hijacked"), Some(&anna))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.repos.posts().await[0].text, "Original");

    let leo_cookie = app.login("leo").await;
    let form_page = body_string(app.get(&edit, Some(&leo_cookie)).await).await;
    assert!(form_page.contains("Original"));

    let form = MultipartBody::new()
        .text("text", "Edited")
        .text("group", &cats.id.to_string());
    let response = app.post_multipart(&edit, form, Some(&leo_cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let posts = app.repos.posts().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "Edited");
    assert_eq!(posts[0].group_id, Some(cats.id));
}

#[tokio::test]
async fn editing_a_missing_post_is_not_found() {
    let app = TestApp::new();
    app.user("leo").await;
    let cookie = app.login("leo").await;

    let response = app.get("/posts/404/edit/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_are_added_and_blank_ones_dropped() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    app.user("anna").await;
    let post = app.post(&leo, "Discuss", None).await;
    let cookie = app.login("anna").await;
    let uri = format!("/posts/{}/comment/", post.id);

    let response = app.post_form(&uri, "text=First%21", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let response = app.post_form(&uri, "text=+++", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let comments = app.repos.comments().await;
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "First!");
    assert_eq!(comments[0].post_id, Some(post.id));

    let response = app
        .post_form("/posts/9999/comment/", "text=hello", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edit_keeps_replaces_and_clears_the_image() {
    let app = TestApp::new();
    app.user("leo").await;
    let cookie = app.login("leo").await;

    let form = MultipartBody::new()
        .text("text", "With a picture")
        .file("image", "first.gif", "image/gif", SMALL_GIF);
    let response = app.post_multipart("/create/", form, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let post = app.repos.posts().await.remove(0);
    let first = post.image.clone().expect("stored image");
    let edit = format!("/posts/{}/edit/", post.id);

    let form = MultipartBody::new().text("text", "Text only");
    let response = app.post_multipart(&edit, form, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let posts = app.repos.posts().await;
    assert_eq!(posts[0].text, "Text only");
    assert_eq!(posts[0].image.as_deref(), Some(first.as_str()));

    let form = MultipartBody::new()
        .text("text", "New picture")
        .file("image", "second.gif", "image/gif", SMALL_GIF);
    let response = app.post_multipart(&edit, form, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let second = app.repos.posts().await[0].image.clone().expect("replaced image");
    assert_ne!(second, first);
    assert!(second.starts_with("posts/"));
    assert!(second.ends_with("-second.gif"));
    let media = app.get(&format!("/media/{second}"), None).await;
    assert_eq!(media.status(), StatusCode::OK);

    let form = MultipartBody::new()
        .text("text", "Both at once")
        .text("image-clear", "on")
        .file("image", "third.gif", "image/gif", SMALL_GIF);
    let response = app.post_multipart(&edit, form, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_string(response)
            .await
            .contains("Please either submit a file or check the clear checkbox, not both.")
    );
    let posts = app.repos.posts().await;
    assert_eq!(posts[0].text, "New picture");
    assert_eq!(posts[0].image.as_deref(), Some(second.as_str()));

    let form = MultipartBody::new()
        .text("text", "No picture")
        .text("image-clear", "on");
    let response = app.post_multipart(&edit, form, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let posts = app.repos.posts().await;
    assert_eq!(posts[0].text, "No picture");
    assert_eq!(posts[0].image, None);
}
