use std::io;
use std::path::{Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A file received in the `image` field of an upload form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub data: Vec<u8>,
}

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Reduces a client supplied filename to a single safe path component.
///
/// The name is NFKD-normalized so accented letters keep their ASCII base,
/// then any remaining non-ASCII is dropped. `/` and whitespace become `_`.
/// Anything outside `[A-Za-z0-9_.-]` is removed, backslashes included, and
/// leading or trailing dots and underscores are stripped. The result can be
/// empty.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c == '_')
        .to_string()
}

/// Directory that uploads are written into, keyed by sanitized filename.
/// Writing an existing name overwrites it.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        UploadStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    pub fn save(&self, filename: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.root.join(filename);
        std::fs::write(&path, data)?;
        Ok(path)
    }
}
