use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Extensions considered music on both sides of a sync.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".flac", ".mp3", ".wav", ".ogg", ".m4a"];

/// Case-insensitive suffix match against [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(name: &str) -> bool {
    let lower = name.to_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Immediate entries of `folder` with a supported extension, in enumeration
/// order. A missing or unreadable folder yields nothing.
pub fn list_local_music_files(folder: &Path) -> Vec<PathBuf> {
    if !folder.is_dir() {
        debug!("Local folder {} is not a directory", folder.display());
        return Vec::new();
    }

    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) => {
            error!("Error reading directory {}: {}", folder.display(), err);
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(err) => {
                warn!("Error reading entry in {}: {}", folder.display(), err);
                None
            }
        })
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(is_supported)
        })
        .collect()
}

/// Base names of `paths`. Names that are not valid UTF-8 cannot be addressed
/// through the bridge shell and are skipped.
pub fn file_name_set(paths: &[PathBuf]) -> BTreeSet<String> {
    paths
        .iter()
        .filter_map(|path| match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => Some(name.to_string()),
            None => {
                warn!("Skipping non UTF-8 file name {}", path.display());
                None
            }
        })
        .collect()
}

/// Applies the extension filter to a raw remote directory listing.
pub fn filter_music_names<I, S>(entries: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| entry.as_ref().trim_end_matches(['\r', '\n']).to_string())
        .filter(|entry| !entry.is_empty() && is_supported(entry))
        .collect()
}
