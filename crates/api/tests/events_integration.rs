//! Integration tests for tenant event management.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    create_event, event_body, multipart_request, request, FilePart, TestApp, TestTenant,
    STORAGE_BASE_URL, STORAGE_BUCKET,
};
use serde_json::json;

fn object_path(url: &str) -> String {
    let prefix = format!("{}/storage/v1/object/public/{}/", STORAGE_BASE_URL, STORAGE_BUCKET);
    url.strip_prefix(&prefix)
        .expect("public storage url")
        .to_string()
}

#[tokio::test]
async fn test_create_and_get_event() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let created = create_event(&app, &tenant, "Spring Fair!", 3, true).await;
    assert_eq!(created["title"], "Spring Fair!");
    assert_eq!(created["slug"], "spring-fair");
    assert!(created["cover_image"].is_null());

    let id = created["id"].as_str().unwrap();
    let (status, body) = app
        .send(request(Method::GET, &format!("/api/v1/events/{}", id), None, Some(&tenant.token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], created["id"]);
    assert_eq!(body["location"], "Parish Hall");
}

#[tokio::test]
async fn test_duplicate_titles_get_numbered_slugs() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let first = create_event(&app, &tenant, "Bake Sale", 2, true).await;
    let second = create_event(&app, &tenant, "Bake Sale", 4, true).await;
    let third = create_event(&app, &tenant, "bake   sale", 5, true).await;

    assert_eq!(first["slug"], "bake-sale");
    assert_eq!(second["slug"], "bake-sale-1");
    assert_eq!(third["slug"], "bake-sale-2");

    // Slugs are scoped per tenant.
    let other = TestTenant::new();
    let theirs = create_event(&app, &other, "Bake Sale", 2, true).await;
    assert_eq!(theirs["slug"], "bake-sale");
}

#[tokio::test]
async fn test_list_events_ordered_by_start() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    create_event(&app, &tenant, "Later", 10, true).await;
    create_event(&app, &tenant, "Sooner", 1, false).await;
    create_event(&app, &tenant, "Middle", 5, true).await;

    let (status, body) = app
        .send(request(Method::GET, "/api/v1/events", None, Some(&tenant.token)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Sooner", "Middle", "Later"]);

    let (_, page) = app
        .send(request(
            Method::GET,
            "/api/v1/events?limit=1&offset=1",
            None,
            Some(&tenant.token),
        ))
        .await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["title"], "Middle");
}

#[tokio::test]
async fn test_events_are_isolated_between_tenants() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let owner = TestTenant::new();
    let intruder = TestTenant::new();

    let event = create_event(&app, &owner, "Private Gathering", 3, false).await;
    let uri = format!("/api/v1/events/{}", event["id"].as_str().unwrap());

    let (status, body) = app
        .send(request(Method::GET, &uri, None, Some(&intruder.token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Event not found");

    let (status, _) = app
        .send(request(
            Method::PATCH,
            &uri,
            Some(json!({ "title": "Hijacked" })),
            Some(&intruder.token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(request(Method::DELETE, &uri, None, Some(&intruder.token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app
        .send(request(Method::GET, "/api/v1/events", None, Some(&intruder.token)))
        .await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_event_rejects_end_before_start() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let mut body = event_body("Backwards", 5, true);
    body["end_at"] = json!((chrono::Utc::now() + chrono::Duration::days(4)).to_rfc3339());

    let (status, response) = app
        .send(request(Method::POST, "/api/v1/events", Some(body), Some(&tenant.token)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "validation_error");
}

#[tokio::test]
async fn test_create_event_trims_before_validation() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let mut body = event_body("Padded", 5, true);
    body["title"] = json!("  ab  ");
    let (status, response) = app
        .send(request(Method::POST, "/api/v1/events", Some(body), Some(&tenant.token)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["details"][0]["field"], "title");

    let mut body = event_body("Padded", 5, true);
    body["title"] = json!("  Bake Sale ");
    body["location"] = json!(" Church Hall ");
    let (status, event) = app
        .send(request(Method::POST, "/api/v1/events", Some(body), Some(&tenant.token)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["title"], "Bake Sale");
    assert_eq!(event["location"], "Church Hall");
    assert_eq!(event["slug"], "bake-sale");
}

#[tokio::test]
async fn test_create_event_rejects_past_start() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let (status, _) = app
        .send(request(
            Method::POST,
            "/api/v1/events",
            Some(event_body("Yesterday", -1, true)),
            Some(&tenant.token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_event_keeps_slug() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let event = create_event(&app, &tenant, "Choir Night", 3, false).await;
    let uri = format!("/api/v1/events/{}", event["id"].as_str().unwrap());

    let (status, body) = app
        .send(request(
            Method::PATCH,
            &uri,
            Some(json!({ "title": "Choir Evening", "is_published": true })),
            Some(&tenant.token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["title"], "Choir Evening");
    assert_eq!(body["slug"], "choir-night");
    assert_eq!(body["is_published"], true);
    assert_eq!(body["summary"], event["summary"]);

    let (status, unchanged) = app
        .send(request(Method::PATCH, &uri, Some(json!({})), Some(&tenant.token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unchanged["title"], "Choir Evening");
}

#[tokio::test]
async fn test_update_event_end_before_existing_start() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let event = create_event(&app, &tenant, "Harvest Supper", 6, true).await;
    let uri = format!("/api/v1/events/{}", event["id"].as_str().unwrap());
    let new_end = (chrono::Utc::now() + chrono::Duration::days(2)).to_rfc3339();

    let (status, body) = app
        .send(request(
            Method::PATCH,
            &uri,
            Some(json!({ "end_at": new_end })),
            Some(&tenant.token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "end_at");
}

#[tokio::test]
async fn test_upload_and_replace_cover() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let event = create_event(&app, &tenant, "Summer Picnic", 7, true).await;
    let cover_uri = format!("/api/v1/events/{}/cover", event["id"].as_str().unwrap());

    let (status, body) = app
        .send(multipart_request(
            Method::PUT,
            &cover_uri,
            &tenant.token,
            &[FilePart::png("file", "picnic.png")],
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let first_url = body["cover_image"].as_str().unwrap().to_string();
    assert!(first_url.ends_with("/events/summer-picnic.png"));
    assert!(app.storage.contains(&object_path(&first_url)));

    let jpeg_header: &[u8] = &[0xFF, 0xD8, 0xFF];
    let (status, _) = app
        .send(multipart_request(
            Method::PUT,
            &cover_uri,
            &tenant.token,
            &[FilePart {
                field: "file",
                file_name: "fake.jpg",
                content_type: "image/jpeg",
                data: jpeg_header,
            }],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.storage.contains(&object_path(&first_url)));

    let (status, body) = app
        .send(multipart_request(
            Method::PUT,
            &cover_uri,
            &tenant.token,
            &[FilePart::png("file", "picnic-again.png")],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cover_image"].as_str().unwrap(), first_url);
    assert_eq!(app.storage.len(), 1);
}

#[tokio::test]
async fn test_replace_cover_when_stored_object_is_gone() {
    use domain::services::ObjectStorage;

    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let event = create_event(&app, &tenant, "Carol Service", 9, true).await;
    let cover_uri = format!("/api/v1/events/{}/cover", event["id"].as_str().unwrap());

    let (status, body) = app
        .send(multipart_request(
            Method::PUT,
            &cover_uri,
            &tenant.token,
            &[FilePart::png("file", "carols.png")],
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let url = body["cover_image"].as_str().unwrap().to_string();

    // Removed behind the service's back, so the pre-upload delete fails.
    assert!(app.storage.delete(&url).await);
    assert!(app.storage.is_empty());

    let (status, body) = app
        .send(multipart_request(
            Method::PUT,
            &cover_uri,
            &tenant.token,
            &[FilePart::png("file", "carols-2.png")],
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["cover_image"].as_str().unwrap(), url);
    assert!(app.storage.contains(&object_path(&url)));
}

#[tokio::test]
async fn test_cover_rejects_non_image() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let event = create_event(&app, &tenant, "Quiz Night", 7, true).await;
    let (status, body) = app
        .send(multipart_request(
            Method::PUT,
            &format!("/api/v1/events/{}/cover", event["id"].as_str().unwrap()),
            &tenant.token,
            &[FilePart {
                field: "file",
                file_name: "notes.txt",
                content_type: "text/plain",
                data: b"hello",
            }],
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid content type"));
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn test_delete_event_removes_cover() {
    let Some(pool) = common::create_test_pool().await else {
        return;
    };
    let app = TestApp::new(pool);
    let tenant = TestTenant::new();

    let event = create_event(&app, &tenant, "Carol Service", 9, true).await;
    let id = event["id"].as_str().unwrap();

    let (status, _) = app
        .send(multipart_request(
            Method::PUT,
            &format!("/api/v1/events/{}/cover", id),
            &tenant.token,
            &[FilePart::png("file", "carols.png")],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.storage.len(), 1);

    let uri = format!("/api/v1/events/{}", id);
    let (status, _) = app
        .send(request(Method::DELETE, &uri, None, Some(&tenant.token)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.storage.is_empty());

    let (status, _) = app
        .send(request(Method::GET, &uri, None, Some(&tenant.token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
