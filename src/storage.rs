use std::fs::{self, File, create_dir_all};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("failed to read csv header: {0}")]
    Header(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Directory holding the uploaded data files.
///
/// File names handed out by [`UploadStore::list`] are the only names
/// [`UploadStore::resolve`] accepts: a single plain path component.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Opens the store, creating the directory if it does not exist yet.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            create_dir_all(&dir)?;
        }
        Ok(UploadStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes an uploaded file, keeping only the last component of the
    /// client-supplied name. Returns the name the file was stored under.
    pub fn save(&self, client_name: &str, contents: &[u8]) -> Result<String, StorageError> {
        let name = sanitize_file_name(client_name)
            .ok_or_else(|| StorageError::InvalidName(client_name.to_string()))?;

        let mut file = File::create(self.dir.join(&name))?;
        file.write_all(contents)?;
        file.flush()?;

        Ok(name)
    }

    /// Names of the stored files, sorted.
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_name(name) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(path)
    }

    /// Header row of a stored CSV file.
    pub fn columns(&self, name: &str) -> Result<Vec<String>, StorageError> {
        let path = self.resolve(name)?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;
        let headers = reader.headers()?;
        Ok(headers.iter().map(str::to_string).collect())
    }
}

/// Reduces a client-supplied path (browsers may send `C:\fakepath\x.csv`) to
/// its final component.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next()?.trim();
    if is_plain_name(last) {
        Some(last.to_string())
    } else {
        None
    }
}

fn is_plain_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
