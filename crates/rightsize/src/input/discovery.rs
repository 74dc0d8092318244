use std::path::{Path, PathBuf};

use tailor::profile::InputFile;

/// Stats an input path. A directory expands to the regular files directly inside it,
/// sorted by path. Subdirectories are not descended into.
pub fn discover_inputs(path: &Path) -> crate::Result<Vec<InputFile>> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_dir() {
        return Ok(vec![InputFile::new(path, metadata.len())]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            files.push(InputFile::new(entry.path(), metadata.len()));
        }
    }
    files.sort_unstable_by(|a, b| a.path.cmp(&b.path));
    log::debug!(
        "Directory {} expanded to {} input file(s)",
        path.display(),
        files.len()
    );
    Ok(files)
}

/// Resolves one declared input. A declared size is trusted and the file is not touched.
pub fn resolve_input(path: PathBuf, size: Option<u64>) -> crate::Result<Vec<InputFile>> {
    match size {
        Some(size) => Ok(vec![InputFile::new(path, size)]),
        None => discover_inputs(&path),
    }
}
