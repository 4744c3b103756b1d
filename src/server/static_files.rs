use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Public asset extensions and their content types.
const ASSET_TYPES: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("ico", "image/x-icon"),
    ("svg", "image/svg+xml"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("eot", "application/vnd.ms-fontobject"),
    ("pdf", "application/pdf"),
];

/// Serves files from the public directory ahead of routing.
///
/// Only paths ending in a known asset extension are considered; anything
/// else, and any asset that does not exist on disk, falls through to the
/// router.
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

    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    /// Content type for `path` when it names a servable asset.
    #[must_use]
    pub fn content_type(path: &str) -> Option<&'static str> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        ASSET_TYPES
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, ct)| *ct)
    }

    /// Load an asset, returning its bytes and content type.
    ///
    /// # Errors
    ///
    /// `NotFound` for non-asset paths, traversal attempts and missing files.
    pub fn load(&self, url_path: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let content_type = Self::content_type(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not an asset"))?;
        let path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        Ok((fs::read(&path)?, content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_path_prevents_traversal() {
        let sf = StaticFiles::new("public");
        assert!(sf.map_path("../Cargo.toml").is_none());
        assert!(sf.map_path("/css/../../secret.css").is_none());
        assert_eq!(sf.map_path("/css/app.css"), Some(PathBuf::from("public/css/app.css")));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(StaticFiles::content_type("/css/app.css"), Some("text/css"));
        assert_eq!(StaticFiles::content_type("/img/LOGO.PNG"), Some("image/png"));
        assert_eq!(StaticFiles::content_type("/fonts/a.woff2"), Some("font/woff2"));
        assert_eq!(StaticFiles::content_type("/index.html"), None);
        assert_eq!(StaticFiles::content_type("/users/42"), None);
    }

    #[test]
    fn test_load_asset() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/app.css"), "body{}").unwrap();
        let sf = StaticFiles::new(dir.path());

        let (bytes, ct) = sf.load("/css/app.css").unwrap();
        assert_eq!(ct, "text/css");
        assert_eq!(bytes, b"body{}");

        assert!(sf.load("/css/missing.css").is_err());
        assert!(sf.load("/css").is_err());
    }
}
