/// Root of the device's shared storage as seen through the bridge shell.
pub const REMOTE_STORAGE_ROOT: &str = "/sdcard";

const COMPUTER_ROOT_LABELS: &[&str] = &["此电脑", "This PC"];
const INTERNAL_STORAGE_MARKERS: &[&str] = &["内部共享存储空间", "内部存储", "Internal"];

/// Converts a path copied from Windows Explorer's MTP view, e.g.
/// `此电脑\Pixel 7\内部共享存储空间\Music`, into a bridge path (`/sdcard/Music`).
pub fn explorer_path_to_remote(explorer_path: &str) -> String {
    let mut parts: Vec<&str> = explorer_path
        .trim()
        .split('\\')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts
        .first()
        .is_some_and(|first| COMPUTER_ROOT_LABELS.contains(first))
    {
        parts.remove(0);
    }

    // Device name.
    if !parts.is_empty() {
        parts.remove(0);
    }

    if parts.first().is_some_and(|storage| {
        INTERNAL_STORAGE_MARKERS
            .iter()
            .any(|marker| storage.contains(marker))
    }) {
        parts.remove(0);
    }

    if parts.is_empty() {
        REMOTE_STORAGE_ROOT.to_string()
    } else {
        format!("{}/{}", REMOTE_STORAGE_ROOT, parts.join("/"))
    }
}

/// True for POSIX-style device paths, false for Explorer paths.
pub fn is_remote_path(path: &str) -> bool {
    path.starts_with('/') && !path.contains('\\')
}

/// Accepts either form and returns a bridge path.
pub fn normalize_remote_folder(path: &str) -> String {
    if is_remote_path(path) {
        path.to_string()
    } else {
        explorer_path_to_remote(path)
    }
}

pub fn join_remote(folder: &str, name: &str) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), name)
}
