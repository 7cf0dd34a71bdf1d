// CSV recording sink on the local filesystem
use crate::application::recorder::RecordingSink;
use std::fs::OpenOptions;
use std::path::{Component, Path, PathBuf};

/// Joins a requested recording path onto `root`.
///
/// Only plain relative paths are accepted; absolute paths and `..` segments
/// would let a client write outside the recordings directory.
pub fn resolve(root: &Path, requested: &Path) -> Option<PathBuf> {
    if requested.as_os_str().is_empty() {
        return None;
    }
    let mut resolved = root.to_path_buf();
    for component in requested.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (resolved != root).then_some(resolved)
}

/// Creates (or truncates) the recording file. The csv writer buffers, so the file is returned as-is.
pub fn create(path: &Path) -> std::io::Result<RecordingSink> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(Box::new(file))
}
