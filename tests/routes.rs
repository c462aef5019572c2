use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use partitioner::api::{ColumnsResponse, FilesResponse, PartitionResponse, UploadResponse};
use partitioner::app::{AppState, router};
use partitioner::backend::{MULTIPART_BOUNDARY, multipart_body};
use partitioner::client::UploadForm;
use partitioner::config::ServerConfig;
use partitioner::storage::UploadStore;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const SALES_CSV: &str = "region,amount,product\nnorth,10,tea\nsouth,20,coffee\neast,30,tea\nwest,40,cocoa\n";

struct TestServer {
    _dir: TempDir,
    router: Router,
    store: UploadStore,
}

fn test_server() -> TestServer {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let config = ServerConfig {
        upload_dir: dir.path().join("uploads"),
        static_dir: dir.path().join("static"),
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.static_dir).expect("should create static dir");
    fs::write(config.static_dir.join("script.js"), "// client").expect("should write asset");

    let store = UploadStore::open(&config.upload_dir).expect("should open store");
    let router = router(Arc::new(AppState::new(store.clone())), &config);
    TestServer {
        _dir: dir,
        router,
        store,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn upload_request(form: &UploadForm) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        )
        .body(Body::from(multipart_body(form)))
        .unwrap()
}

fn partition_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/partition")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn index_and_static_assets_are_served() {
    let server = test_server();

    let (status, body) = send(&server.router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("id=\"uploadForm\""));
    assert!(html.contains("id=\"numGroups\""));

    let (status, body) = send(&server.router, get("/static/script.js")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"// client");
}

#[tokio::test]
async fn upload_stores_file_and_lists_it() {
    let server = test_server();

    let mut form = UploadForm::with_file("sales.csv", SALES_CSV);
    form.fields.push(("note".to_string(), "quarterly".to_string()));
    let (status, body) = send(&server.router, upload_request(&form)).await;

    assert_eq!(status, StatusCode::OK);
    let reply: UploadResponse = serde_json::from_slice(&body).unwrap();
    assert!(reply.success);
    assert_eq!(reply.message, "File uploaded successfully: sales.csv");

    let (_, body) = send(&server.router, get("/files")).await;
    let files: FilesResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(files.files, vec!["sales.csv"]);
    assert_eq!(server.store.columns("sales.csv").unwrap().len(), 3);
}

#[tokio::test]
async fn upload_without_file_part_fails() {
    let server = test_server();
    let form = UploadForm {
        file: None,
        fields: vec![("note".to_string(), "nothing".to_string())],
    };

    let (status, body) = send(&server.router, upload_request(&form)).await;

    assert_eq!(status, StatusCode::OK);
    let reply: UploadResponse = serde_json::from_slice(&body).unwrap();
    assert!(!reply.success);
    assert_eq!(reply.message, "Unable to upload file.");
}

#[tokio::test]
async fn upload_with_unusable_name_is_refused() {
    let server = test_server();
    let form = UploadForm::with_file("..", SALES_CSV);

    let (status, body) = send(&server.router, upload_request(&form)).await;

    assert_eq!(status, StatusCode::OK);
    let reply: UploadResponse = serde_json::from_slice(&body).unwrap();
    assert!(!reply.success);
    assert_eq!(reply.message, "Unable to create the file for writing.");
    assert!(server.store.list().unwrap().is_empty());
}

#[tokio::test]
async fn empty_upload_directory_lists_an_empty_array() {
    let server = test_server();
    let (status, body) = send(&server.router, get("/files")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, br#"{"files":[]}"#);
}

#[tokio::test]
async fn columns_endpoint_reports_header_and_errors() {
    let server = test_server();
    server.store.save("sales.csv", SALES_CSV.as_bytes()).unwrap();

    let (status, body) = send(&server.router, get("/columns?file=sales.csv")).await;
    assert_eq!(status, StatusCode::OK);
    let columns: ColumnsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(columns.columns, vec!["region", "amount", "product"]);

    let (status, body) = send(&server.router, get("/columns")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"File name is required.");

    let (status, body) = send(&server.router, get("/columns?file=missing.csv")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, b"Unable to open the file.");

    let (status, _) = send(&server.router, get("/columns?file=..%2Fsales.csv")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn partition_runs_the_job() {
    let server = test_server();
    server.store.save("sales.csv", SALES_CSV.as_bytes()).unwrap();

    let (status, body) = send(
        &server.router,
        partition_request(r#"{"file":"sales.csv","numGroups":2,"columns":["region","amount"]}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let reply: PartitionResponse = serde_json::from_slice(&body).unwrap();
    assert!(reply.success);
    assert_eq!(reply.message.as_deref(), Some("Partitioning completed."));
    let log = reply.log.expect("log should be present");
    assert!(log.contains("Partitioning is possible. Final number of groups: 2"));
    assert!(log.contains("Group 1 (2 records, 50.00%): (region: (north, south) , amount: (10, 20))"));
}

#[tokio::test]
async fn partition_errors_are_reported_in_the_message() {
    let server = test_server();
    server.store.save("sales.csv", SALES_CSV.as_bytes()).unwrap();

    let (_, body) = send(
        &server.router,
        partition_request(r#"{"file":"sales.csv","numGroups":0,"columns":["amount"]}"#),
    )
    .await;
    let reply: PartitionResponse = serde_json::from_slice(&body).unwrap();
    assert!(!reply.success);
    assert_eq!(reply.log, None);
    assert_eq!(
        reply.message.as_deref(),
        Some("Error executing partitioning: invalid number of groups; enter a different number of partitions")
    );

    let (_, body) = send(
        &server.router,
        partition_request(r#"{"file":"other.csv","numGroups":2,"columns":["amount"]}"#),
    )
    .await;
    let reply: PartitionResponse = serde_json::from_slice(&body).unwrap();
    assert!(!reply.success);
    assert_eq!(
        reply.message.as_deref(),
        Some("Error executing partitioning: file not found: other.csv")
    );
}

#[tokio::test]
async fn partition_with_more_groups_than_rows_is_not_possible() {
    let server = test_server();
    server.store.save("sales.csv", SALES_CSV.as_bytes()).unwrap();

    let (status, body) = send(
        &server.router,
        partition_request(r#"{"file":"sales.csv","numGroups":18446744073709551615,"columns":["amount"]}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let reply: PartitionResponse = serde_json::from_slice(&body).unwrap();
    assert!(reply.success);
    let log = reply.log.expect("log should be present");
    assert!(log.ends_with("Partitioning under the given conditions is not possible\n"));
}

#[tokio::test]
async fn partition_rejects_malformed_body() {
    let server = test_server();
    let (status, body) = send(&server.router, partition_request("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Invalid request body.");
}
