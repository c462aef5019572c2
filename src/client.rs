//! The upload/partition page controller.
//!
//! The controller only talks to two seams: a [`Page`] (the log area, the file
//! selection, the column checkboxes and the group count input) and a
//! [`Backend`] (the four HTTP endpoints). `static/script.js` is the browser
//! rendition of the same flow.

use crate::api::{
    ColumnsResponse, FilesResponse, PartitionRequest, PartitionResponse, UploadResponse,
};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

lazy_static! {
    static ref DIGITS_REGEX: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupCountError {
    #[error("enter the required number of groups")]
    Empty,
    #[error("must enter an integer for the number of groups")]
    NotInteger,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

/// A file chosen in the upload form's file input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub contents: Vec<u8>,
}

/// Everything the upload form submits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    pub file: Option<FilePart>,
    pub fields: Vec<(String, String)>,
}

impl UploadForm {
    pub fn with_file(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        UploadForm {
            file: Some(FilePart {
                name: name.into(),
                contents: contents.into(),
            }),
            fields: Vec::new(),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn upload(&self, form: &UploadForm) -> Result<UploadResponse, ClientError>;
    async fn files(&self) -> Result<FilesResponse, ClientError>;
    async fn columns(&self, file: &str) -> Result<ColumnsResponse, ClientError>;
    async fn partition(&self, request: &PartitionRequest)
    -> Result<PartitionResponse, ClientError>;
}

/// The page elements the controller reads and writes.
pub trait Page {
    fn set_log(&self, text: &str);
    /// Replaces the file options; the selection moves to the first option.
    fn replace_files(&self, files: &[String]);
    fn selected_file(&self) -> Option<String>;
    /// Renders one checkbox per column, all unchecked. An empty slice clears the container.
    fn render_columns(&self, columns: &[String]);
    fn checked_columns(&self) -> Vec<String>;
    fn group_count_input(&self) -> String;
    /// Developer-facing error sink; never shown in the log area.
    fn console_error(&self, error: &ClientError);
}

/// Validates the group count text: non-empty after trimming and digits only.
pub fn validate_group_count(input: &str) -> Result<u64, GroupCountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(GroupCountError::Empty);
    }
    if !DIGITS_REGEX.is_match(trimmed) {
        return Err(GroupCountError::NotInteger);
    }
    trimmed.parse().map_err(|_| GroupCountError::NotInteger)
}

pub struct Controller<B, P> {
    backend: B,
    page: P,
    columns_generation: AtomicU64,
}

impl<B: Backend, P: Page> Controller<B, P> {
    pub fn new(backend: B, page: P) -> Self {
        Controller {
            backend,
            page,
            columns_generation: AtomicU64::new(0),
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Page load: fill the file list (and the columns of the first file).
    pub async fn init(&self) {
        self.refresh_files().await;
    }

    pub async fn submit_upload(&self, form: &UploadForm) {
        match self.backend.upload(form).await {
            Ok(response) => {
                self.page.set_log(&response.message);
                if response.success {
                    self.refresh_files().await;
                }
            }
            Err(err) => {
                warn!("upload failed: {}", err);
                self.page.console_error(&err);
            }
        }
    }

    pub async fn refresh_files(&self) {
        match self.backend.files().await {
            Ok(response) => {
                self.page.replace_files(&response.files);
                if response.files.is_empty() {
                    self.page.render_columns(&[]);
                } else {
                    self.load_columns().await;
                }
            }
            Err(err) => {
                warn!("listing files failed: {}", err);
                self.page.console_error(&err);
            }
        }
    }

    /// Loads the columns of the selected file. A response is dropped when a
    /// newer load was started while it was in flight.
    pub async fn load_columns(&self) {
        let Some(file) = self.page.selected_file().filter(|f| !f.is_empty()) else {
            return;
        };
        let ticket = self.columns_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self.backend.columns(&file).await;
        if self.columns_generation.load(Ordering::SeqCst) != ticket {
            debug!("dropping stale columns response for {}", file);
            return;
        }

        match result {
            Ok(response) => self.page.render_columns(&response.columns),
            Err(err) => {
                warn!("loading columns of {} failed: {}", file, err);
                self.page.console_error(&err);
            }
        }
    }

    pub async fn start_partitioning(&self) {
        let file = self.page.selected_file().unwrap_or_default();
        let columns = self.page.checked_columns();

        let num_groups = match validate_group_count(&self.page.group_count_input()) {
            Ok(n) => n,
            Err(err) => {
                self.page.set_log(&err.to_string());
                return;
            }
        };

        let request = PartitionRequest {
            file,
            num_groups,
            columns,
        };
        match self.backend.partition(&request).await {
            Ok(response) => self.page.set_log(response.display_text()),
            Err(err) => {
                self.page.set_log(&format!("Error: {}", err));
                self.page.console_error(&err);
            }
        }
    }
}
