//! `file://` URI helpers for document identifiers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// Convert a local path to an absolute `file://` URI.
///
/// The path is canonicalized first, so it must exist.
pub fn file_uri(path: &Path) -> io::Result<String> {
    let abs = fs::canonicalize(path)?;
    Url::from_file_path(&abs)
        .map(String::from)
        .map_err(|()| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot express {} as a file URI", abs.display()),
            )
        })
}

/// Convert a `file://` URI back into a local path.
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    Url::parse(uri).ok()?.to_file_path().ok()
}
