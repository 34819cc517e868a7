use super::*;
use axum::{
    body::{self, Body},
    http::Request,
    response::Response,
};
use image_store::MemoryImageStore;
use tower::ServiceExt;

const PASSWORD: &str = "open-sesame";
const BOUNDARY: &str = "site-test-boundary";

async fn test_app_with_limit(max_body_bytes: usize) -> (Router, Arc<MemoryImageStore>) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let images = Arc::new(MemoryImageStore::default());
    let state = AppState {
        api: ApiContext {
            storage,
            images: images.clone(),
        },
        session: SessionConfig {
            admin_password: PASSWORD.into(),
            secret: "test-secret".into(),
            ttl_seconds: 300,
        },
    };
    (build_router(Arc::new(state), max_body_bytes), images)
}

async fn test_app() -> (Router, Arc<MemoryImageStore>) {
    test_app_with_limit(1024 * 1024).await
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn login(app: &Router) -> String {
    let request = Request::post("/api/admin/login")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "password": PASSWORD }).to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let dto: AdminLoginResponse =
        serde_json::from_value(json_body(response).await).expect("login dto");
    dto.token
}

fn multipart(field: &str, files: &[(&str, &str, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (name, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn upload_request(
    path: &str,
    token: Option<&str>,
    field: &str,
    files: &[(&str, &str, &[u8])],
) -> Request<Body> {
    let mut builder = Request::post(path).header(
        "content-type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(multipart(field, files)).expect("request")
}

fn json_request(
    method: &str,
    path: &str,
    token: Option<&str>,
    value: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(value.to_string())).expect("request")
}

fn authed(method: &str, path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

async fn gallery_urls(app: &Router) -> Vec<String> {
    let request = Request::get("/api/gallery?t=1")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let body: GalleryResponse =
        serde_json::from_value(json_body(response).await).expect("gallery");
    body.images.unwrap_or_default()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn health_reports_unreachable_image_store() {
    let (app, images) = test_app().await;
    let request = Request::get("/api/health").body(Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    images.set_unreachable(true).await;
    let request = Request::get("/api/health").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["image_store"]["ok"], false);
    assert_eq!(body["database"]["ok"], true);
}

#[tokio::test]
async fn gallery_listing_is_never_cached() {
    let (app, _) = test_app().await;
    let request = Request::get("/api/gallery?t=1700000000000")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).expect("header"),
        "no-store"
    );
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn admin_routes_require_a_session() {
    let (app, _) = test_app().await;
    let response = app
        .clone()
        .oneshot(upload_request(
            "/api/gallery/upload",
            None,
            "files",
            &[("a.png", "image/png", b"png")],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "unauthorized");

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/contact/queries", "not-a-jwt"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/admin/login",
            None,
            serde_json::json!({ "password": "wrong" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_then_delete_round_trip() {
    let (app, _) = test_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(upload_request(
            "/api/gallery/upload",
            Some(&token),
            "files",
            &[
                ("one.png", "image/png", b"png"),
                ("two.jpg", "image/jpeg", b"jpg"),
            ],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);

    let urls = gallery_urls(&app).await;
    assert_eq!(urls.len(), 2);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/gallery/delete",
            Some(&token),
            serde_json::json!({ "images": [urls[0], "https://elsewhere/missing.png"] }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["deleted"], 1);
    assert_eq!(body["count"], 1);
    assert_eq!(gallery_urls(&app).await, vec![urls[1].clone()]);
}

#[tokio::test]
async fn disallowed_format_rejects_the_upload() {
    let (app, images) = test_app().await;
    let token = login(&app).await;

    let response = app
        .oneshot(upload_request(
            "/api/gallery/upload",
            Some(&token),
            "files",
            &[
                ("one.png", "image/png", b"png"),
                ("notes.txt", "text/plain", b"hello"),
            ],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "validation");
    assert!(images.is_empty().await);
}

#[tokio::test]
async fn delete_without_matches_is_not_found() {
    let (app, _) = test_app().await;
    let token = login(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/gallery/delete",
            Some(&token),
            serde_json::json!({ "images": ["https://elsewhere/missing.png"] }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No matching images found in gallery");
}

#[tokio::test]
async fn unreachable_store_is_bad_gateway() {
    let (app, images) = test_app().await;
    images.set_unreachable(true).await;
    let request = Request::get("/api/gallery").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["code"], "unavailable");
}

#[tokio::test]
async fn settings_and_qr_code_lifecycle() {
    let (app, images) = test_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(Request::get("/api/settings").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["upi_id"], "");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/settings",
            Some(&token),
            serde_json::json!({ "upiId": " trust@upi ", "upiName": "Helping Hands" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["upi_id"], "trust@upi");

    let response = app
        .clone()
        .oneshot(upload_request(
            "/api/settings/qr",
            Some(&token),
            "qr",
            &[("qr.png", "image/png", b"qr")],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let qr_url = json_body(response).await["url"]
        .as_str()
        .expect("url")
        .to_string();

    let response = app
        .clone()
        .oneshot(Request::get("/api/settings").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["qr_code"], qr_url.as_str());
    assert_eq!(body["upi_name"], "Helping Hands");

    let response = app
        .clone()
        .oneshot(authed("DELETE", "/api/settings/qr", &token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(images.is_empty().await);

    let response = app
        .oneshot(Request::get("/api/settings").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert!(json_body(response).await["qr_code"].is_null());
}

#[tokio::test]
async fn contact_queries_flow() {
    let (app, _) = test_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/contact",
            None,
            serde_json::json!({ "fullName": "Asha", "phoneNumber": "", "subject": "Hi", "message": "Hello" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "All fields are required.");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/contact",
            None,
            serde_json::json!({
                "full_name": "Asha",
                "phone_number": "98765",
                "subject": "Volunteering",
                "message": "Weekend slots?"
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/contact/queries", &token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let queries: Vec<ContactQuery> =
        serde_json::from_value(json_body(response).await).expect("queries");
    assert_eq!(queries.len(), 1);
    let id = queries[0].id.0;

    let response = app
        .clone()
        .oneshot(authed("DELETE", &format!("/api/contact/queries/{id}"), &token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(authed("DELETE", &format!("/api/contact/queries/{id}"), &token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let (app, images) = test_app_with_limit(256).await;
    let token = login(&app).await;

    let big = vec![0u8; 4096];
    let mut request = upload_request(
        "/api/gallery/upload",
        Some(&token),
        "files",
        &[("big.png", "image/png", &big)],
    );
    let length = body::to_bytes(
        multipart("files", &[("big.png", "image/png", &big)]),
        usize::MAX,
    )
    .await
    .expect("body")
    .len();
    request
        .headers_mut()
        .insert(header::CONTENT_LENGTH, length.into());

    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(images.is_empty().await);
}
