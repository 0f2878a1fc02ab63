//! Directory listing tool.

use crate::error::{DbError, DbResult};
use std::path::Path;

/// List a directory's entries, directories first, alphabetically.
pub fn list_directory(path: &str) -> DbResult<String> {
    let dir = Path::new(path);
    let meta = std::fs::metadata(dir)
        .map_err(|e| DbError::parameter(format!("cannot access path {}: {}", path, e)))?;
    if !meta.is_dir() {
        return Err(DbError::parameter(format!("path is not a directory: {}", path)));
    }

    let mut entries: Vec<(bool, String, u64)> = std::fs::read_dir(dir)
        .map_err(|e| DbError::internal(format!("failed to read directory: {}", e)))?
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = entry.metadata().ok();
            let is_dir = meta.as_ref().map(|m| m.is_dir()).unwrap_or(false);
            let size = meta.map(|m| m.len()).unwrap_or(0);
            (is_dir, name, size)
        })
        .collect();

    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut out = format!("Contents of {}:\n\n", path);
    for (is_dir, name, size) in &entries {
        if *is_dir {
            out.push_str(&format!("[DIR]  {} (-)\n", name));
        } else {
            out.push_str(&format!("[FILE] {} ({} bytes)\n", name, size));
        }
    }
    if entries.is_empty() {
        out.push_str("(empty directory)");
    }
    Ok(out)
}
