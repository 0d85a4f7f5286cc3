use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Upload directory. Files are keyed by their original name, so a second
/// upload with the same name replaces the first.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path component of a client-supplied name, if there is one.
    pub fn storage_name(file_name: &str) -> Option<String> {
        Path::new(file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub async fn save(&self, file_name: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(file_name);
        fs::write(&path, data).await?;
        Ok(path)
    }

    /// `None` when nothing exists at `path`.
    pub async fn open_file(&self, path: &Path) -> io::Result<Option<fs::File>> {
        match fs::File::open(path).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns whether a file was actually removed; absence is not an error.
    pub async fn remove(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
