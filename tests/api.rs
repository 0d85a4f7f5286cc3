use axum::{
    body::{Body, Bytes},
    http::{header, Method, Request, StatusCode},
    Router,
};
use docvault::{app, auth::TokenIssuer, db::Database, storage::FileStore, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "docvault-test-boundary";

async fn test_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState {
        db: Database::open_in_memory().unwrap(),
        files: FileStore::open(dir.path().join("uploads")).await.unwrap(),
        tokens: TokenIssuer::new("test-secret", 30),
        bcrypt_cost: 4,
        max_upload_bytes: 1024 * 1024,
    };
    (app(state), dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Bytes) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

async fn upload(
    app: &Router,
    query: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/documents/upload?{query}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart_body(fields, file))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

const FULL_QUERY: &str = "category_id=1&doc_type_id=2&subtype_id=3&doc_date=2024-05-01\
    &party_main_account=ACME&party_sub_account=ACME-01&uploaded_by=7";

fn alice() -> Value {
    json!({
        "username": "alice",
        "password": "s3cret",
        "fullname": "Alice Liddell",
        "email": "alice@example.com",
        "phone_number": "555-0100"
    })
}

#[tokio::test]
async fn root_welcomes() {
    let (app, _dir) = test_app().await;
    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["message"].as_str().unwrap().contains("Welcome"));
}

#[tokio::test]
async fn signup_then_duplicate_email() {
    let (app, _dir) = test_app().await;

    let (status, user) = send_json(&app, Method::POST, "/users/signup", alice()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["username"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());

    let mut again = alice();
    again["username"] = json!("alice2");
    let (status, body) = send_json(&app, Method::POST, "/users/signup", again).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");
}

#[tokio::test]
async fn login_returns_bearer_token() {
    let (app, _dir) = test_app().await;
    let (_, user) = send_json(&app, Method::POST, "/users/signup", alice()).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/users/login",
        json!({ "username": "alice", "password": "s3cret" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["userId"], user["id"]);
    let token = body["access_token"].as_str().unwrap();
    let claims = TokenIssuer::new("test-secret", 30).verify(token).unwrap();
    assert_eq!(claims.sub, "alice");

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/users/login",
        json!({ "username": "alice", "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid credentials");
}

#[tokio::test]
async fn upload_and_download() {
    let (app, _dir) = test_app().await;

    let (status, doc) = upload(&app, FULL_QUERY, &[], Some(("report.pdf", &b"%PDF-1.7 body"[..]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["file_name"], "report.pdf");
    assert_eq!(doc["uploaded_by"], 7);
    assert_eq!(doc["modified_by"], 7);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/documents/file/{}", doc["id"]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"%PDF-1.7 body");

    let (status, bytes) = get(&app, "/documents/uploads/report.pdf").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..], b"%PDF-1.7 body");
}

#[tokio::test]
async fn upload_accepts_form_fields() {
    let (app, _dir) = test_app().await;
    let fields = [
        ("category_id", "4"),
        ("doc_type_id", "5"),
        ("subtype_id", "6"),
        ("doc_date", "2024-07-01"),
        ("party_main_account", "Globex"),
        ("party_sub_account", "Globex-9"),
        ("uploaded_by", "11"),
        ("remarks", "scanned"),
    ];

    let (status, doc) = upload(&app, "", &fields, Some(("scan.png", &b"png"[..]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["category_id"], 4);
    assert_eq!(doc["uploaded_by"], 11);
    assert_eq!(doc["remarks"], "scanned");
}

#[tokio::test]
async fn upload_without_owner_is_rejected() {
    let (app, _dir) = test_app().await;
    let query = "category_id=1&doc_type_id=2&subtype_id=3&doc_date=2024-05-01\
        &party_main_account=ACME&party_sub_account=ACME-01&uploaded_by=0";

    let (status, body) = upload(&app, query, &[], Some(("orphan.pdf", &b"x"[..]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing required field: uploaded_by");

    let (status, _) = get(&app, "/documents/uploads/orphan.pdf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = upload(&app, FULL_QUERY, &[], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing required field: file");
}

#[tokio::test]
async fn filter_rejects_inverted_range() {
    let (app, _dir) = test_app().await;

    let (status, body) = get(&app, "/documents/filter?uid=7&from_date=2024-02-01&to_date=2024-01-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["detail"], "from_date cannot be after to_date");

    let (status, _) = get(&app, "/documents/user/7/filter?from_date=2024-02-01&to_date=2024-01-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_and_filter_by_owner() {
    let (app, _dir) = test_app().await;
    upload(&app, FULL_QUERY, &[], Some(("a.pdf", &b"a"[..]))).await;
    let other = FULL_QUERY.replace("category_id=1", "category_id=9");
    upload(&app, &other, &[], Some(("b.pdf", &b"b"[..]))).await;

    for uri in ["/documents/?uid=7", "/documents/user/7"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK);
        let docs: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(docs.len(), 2);
    }

    let (_, body) = get(&app, "/documents/user/8").await;
    let docs: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert!(docs.is_empty());

    for uri in [
        "/documents/filter?uid=7&category_id=9",
        "/documents/user/7/filter?category_id=9&doc_type_id=2",
    ] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK);
        let docs: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["file_name"], "b.pdf");
    }
}

#[tokio::test]
async fn update_and_delete_lifecycle() {
    let (app, _dir) = test_app().await;
    let (_, doc) = upload(&app, FULL_QUERY, &[], Some(("cycle.pdf", &b"cycle"[..]))).await;
    let id = doc["id"].as_i64().unwrap();

    let changes = |caller: i64| {
        json!({
            "category_id": 9,
            "doc_type_id": 2,
            "subtype_id": 3,
            "doc_date": "2024-06-01",
            "party_main_account": "ACME",
            "party_sub_account": "ACME-02",
            "modified_by": caller,
            "remarks": "revised"
        })
    };

    let (status, body) = send_json(&app, Method::PUT, &format!("/documents/{id}"), changes(8)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Document not found or not owned by user");

    let (status, updated) = send_json(&app, Method::PUT, &format!("/documents/{id}"), changes(7)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["category_id"], 9);
    assert_eq!(updated["uploaded_by"], 7);
    assert_eq!(updated["modified_by"], 7);
    assert_eq!(updated["remarks"], "revised");

    let delete = |uid: i64| {
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/documents/{id}?uid={uid}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = send(&app, delete(8)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, delete(7)).await;
    assert_eq!(status, StatusCode::OK);
    let deleted: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(deleted["id"], id);
    assert_eq!(deleted["category_id"], 9);

    let (status, body) = get(&app, &format!("/documents/file/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["detail"], "Document not found");

    let (_, body) = get(&app, "/documents/user/7").await;
    let docs: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn empty_owner_is_a_missing_field() {
    let (app, _dir) = test_app().await;
    let query = "category_id=1&doc_type_id=2&subtype_id=3&doc_date=2024-05-01\
        &party_main_account=ACME&party_sub_account=ACME-01&uploaded_by=";

    let (status, body) = upload(&app, query, &[], Some(("blank.pdf", &b"x"[..]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing required field: uploaded_by");

    let (status, body) =
        upload(&app, FULL_QUERY, &[("uploaded_by", "")], Some(("blank.pdf", &b"x"[..]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing required field: uploaded_by");
}

#[tokio::test]
async fn malformed_requests_answer_with_detail() {
    let (app, _dir) = test_app().await;

    let (status, body) = get(&app, "/documents/?uid=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"].as_str().unwrap().starts_with("Bad request"));

    let (status, body) = get(&app, "/documents/user/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"].is_string());

    let (status, body) = get(&app, "/documents/filter?uid=7&category_id=two").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"].is_string());

    let (status, body) = send_json(
        &app,
        Method::PUT,
        "/documents/1",
        json!({ "remarks": "no caller id" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().starts_with("Invalid input"));
}

#[tokio::test]
async fn signup_rejects_email_with_space() {
    let (app, _dir) = test_app().await;
    let mut user = alice();
    user["email"] = json!("a b@c.d");

    let (status, body) = send_json(&app, Method::POST, "/users/signup", user).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("not a valid email"));
}
