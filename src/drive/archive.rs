//! Zip packaging of a directory subtree for bulk download.

use std::fs::File;
use std::io::{self, Cursor, Write};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::{DriveError, Result};

/// Archive everything below `dir` into an in-memory zip.
///
/// Entry names are relative to `dir` and always use `/`. Directories get
/// their own entries so empty ones survive extraction. Traversal is
/// depth-first in file-name order.
pub fn package_subtree(dir: &Path) -> Result<Vec<u8>> {
    if !dir.is_dir() {
        return Err(DriveError::NotFound(format!(
            "directory '{}'",
            dir.display()
        )));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let file_options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let dir_options = FileOptions::default().compression_method(CompressionMethod::Stored);

    let mut entries = 0usize;
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| DriveError::Archive(e.to_string()))?;
        let name = entry_name(dir, entry.path())?;

        if entry.file_type().is_dir() {
            writer.add_directory(name, dir_options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, file_options)?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, &mut writer)?;
        } else {
            continue;
        }
        entries += 1;
    }

    let mut cursor = writer.finish()?;
    cursor.flush()?;
    debug!(dir = %dir.display(), entries, "subtree archived");
    Ok(cursor.into_inner())
}

/// Archive-relative name of `path` with `/` separators.
fn entry_name(base: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|e| DriveError::Archive(e.to_string()))?;

    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(segments.join("/"))
}
