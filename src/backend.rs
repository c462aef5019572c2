use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{Method, Request, header},
};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use crate::api::{
    ColumnsResponse, FilesResponse, PartitionRequest, PartitionResponse, UploadResponse,
};
use crate::client::{Backend, ClientError, UploadForm};

pub const MULTIPART_BOUNDARY: &str = "----partitioner-form-boundary";

/// Sends the controller's requests straight into an axum [`Router`], as real
/// HTTP requests, without opening a socket.
#[derive(Clone)]
pub struct RouterBackend {
    router: Router,
}

impl RouterBackend {
    pub fn new(router: Router) -> Self {
        RouterBackend { router }
    }

    async fn send<T: DeserializeOwned>(&self, request: Request<Body>) -> Result<T, ClientError> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        // Like `response.json()` in the browser: the status is not inspected.
        Ok(serde_json::from_slice(&body)?)
    }
}

fn build(request: axum::http::request::Builder, body: Body) -> Result<Request<Body>, ClientError> {
    request
        .body(body)
        .map_err(|e| ClientError::Transport(e.to_string()))
}

/// Encodes the form as `multipart/form-data`; the file part is named `file`.
pub fn multipart_body(form: &UploadForm) -> Bytes {
    let mut body = Vec::new();
    for (name, value) in &form.fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                MULTIPART_BOUNDARY,
                quote_escape(name),
                value
            )
            .as_bytes(),
        );
    }
    if let Some(file) = &form.file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                MULTIPART_BOUNDARY,
                quote_escape(&file.name)
            )
            .as_bytes(),
        );
        body.extend_from_slice(&file.contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    Bytes::from(body)
}

fn quote_escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

impl Backend for RouterBackend {
    async fn upload(&self, form: &UploadForm) -> Result<UploadResponse, ClientError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            );
        self.send(build(request, Body::from(multipart_body(form)))?)
            .await
    }

    async fn files(&self) -> Result<FilesResponse, ClientError> {
        let request = Request::builder().method(Method::GET).uri("/files");
        self.send(build(request, Body::empty())?).await
    }

    async fn columns(&self, file: &str) -> Result<ColumnsResponse, ClientError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("/columns?file={}", urlencoding::encode(file)));
        self.send(build(request, Body::empty())?).await
    }

    async fn partition(
        &self,
        request: &PartitionRequest,
    ) -> Result<PartitionResponse, ClientError> {
        let body = serde_json::to_vec(request)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/partition")
            .header(header::CONTENT_TYPE, "application/json");
        self.send(build(request, Body::from(body))?).await
    }
}
