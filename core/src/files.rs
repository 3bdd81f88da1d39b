use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Map an asset URL onto the upload directory. Returns `None` when the
/// URL lives outside the upload tree. The match must break on a `/`
/// right after the base, and no path segment may climb out of the tree.
pub fn url_to_upload_path(upload_dir: &Path, base_url: &str, url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix(base_url)?;
    if !rest.starts_with('/') {
        return None;
    }
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        return None;
    }
    let escapes = Path::new(rest)
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)));
    if escapes {
        return None;
    }
    Some(upload_dir.join(rest))
}

/// Remove a stored file together with every variation sharing its
/// filename stem: `stem-WxH.ext` size renditions and `stem*.webp`
/// format derivatives, then the original. Returns how many files went.
pub fn delete_file_and_variations(path: &Path) -> io::Result<usize> {
    if !path.is_file() {
        return Ok(0);
    }
    let dir = match path.parent() {
        Some(dir) => dir,
        None => return Ok(0),
    };
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();

    let mut removed = 0;
    let size_prefix = format!("{stem}-");
    let size_suffix = format!(".{ext}");
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let candidate = entry.path();
        if !candidate.is_file() || candidate == path {
            continue;
        }
        let name = match candidate.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        let is_size_variation = name.starts_with(&size_prefix) && name.ends_with(&size_suffix);
        let is_webp_derivative = name.starts_with(&stem) && name.ends_with(".webp");
        if is_size_variation || is_webp_derivative {
            fs::remove_file(&candidate)?;
            debug!(file = %candidate.display(), "removed variation");
            removed += 1;
        }
    }

    fs::remove_file(path)?;
    removed += 1;
    Ok(removed)
}
