/*!
# CSV Partitioner

A small web application that splits the rows of an uploaded CSV file into a
requested number of groups, built in Rust.

## Architecture

### Frontend Layer
- **Technologies**: HTML, JavaScript (`static/`)
- **Key Components**:
  - Upload form - posts the chosen file as multipart data
  - File list - every stored upload, the first one selected after each refresh
  - Column picker - one checkbox per header column of the selected file
  - Partition trigger - validates the group count and starts a job

The same flow is available to Rust front ends as [`client::Controller`].

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Upload store - a directory of uploaded files
  - Dataset loader - CSV parsing and column typing
  - Partitioning job - encoding, sorting, splitting and balance evaluation

## REST API Endpoints

- `POST /upload` - stores a file (`multipart/form-data`, field `file`)
- `GET /files` - lists stored files
- `GET /columns?file=<name>` - header columns of a stored file
- `POST /partition` - `{file, numGroups, columns}`, answers with the job log
*/

pub mod api;
pub mod client;
pub mod dataset;
pub mod export;
pub mod partition;
pub mod storage;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod backend;
#[cfg(feature = "web")]
pub mod config;

pub use api::*;
pub use dataset::{ColumnKind, Dataset, DatasetError};
pub use partition::{PartitionError, PartitionJob, PartitionReport};
pub use storage::{StorageError, UploadStore};
