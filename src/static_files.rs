//! Files under `<root>/public`, served ahead of controller dispatch for
//! GET and HEAD requests.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Content type for a lowercase file extension; `None` if unknown.
#[must_use]
pub fn content_type_for(ext: &str) -> Option<&'static str> {
    let ct = match ext {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(ct)
}

#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Decoded URL path -> file path under the base directory. Anything
    /// that would climb out (`..`, absolute components) is rejected.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(url_path).ok()?;
        let mut pb = self.base_dir.clone();
        for comp in Path::new(decoded.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    /// The file `url_path` names, if it exists and is a regular file.
    #[must_use]
    pub fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        self.map_path(url_path).filter(|p| p.is_file())
    }

    fn content_type(path: &Path) -> &'static str {
        path.extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase)
            .and_then(|ext| content_type_for(&ext))
            .unwrap_or("application/octet-stream")
    }

    /// Bytes and content type of the file at `url_path`.
    ///
    /// # Errors
    ///
    /// `NotFound` for unmapped or missing paths, or the read error.
    pub fn load(&self, url_path: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let path = self
            .resolve(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))?;
        let bytes = fs::read(&path)?;
        Ok((bytes, Self::content_type(&path)))
    }
}
