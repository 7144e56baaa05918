//! Deterministic local paths for cached files.
//!
//! Layout: `{host cache dir}/{cache_directory}/{namespace key}/{owner key}/{name}.{ext}`.
//!
//! Every component derived from caller input is reduced to `[A-Za-z0-9_-]` so
//! neither a display name nor an owner id can escape the namespace directory.
//! Namespace and owner keys end in a fixed-length hash of the raw value, so two
//! ids that sanitize to the same text still get separate directories.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = "mp3";
const MAX_EXTENSION_LEN: usize = 5;
const MAX_NAME_LEN: usize = 64;
const KEY_HASH_LEN: usize = 16;

/// Suffix of the temporary file a download streams into.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Make a string safe to use as a single path component.
///
/// Characters outside `[A-Za-z0-9_-]` become `_`. An empty result becomes
/// `"track"`. Lossy: use [`directory_key`] where distinct inputs must stay
/// distinct.
pub fn sanitize_component(raw: &str) -> String {
    let safe: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();

    if safe.is_empty() {
        "track".to_string()
    } else {
        safe
    }
}

/// Readable, collision-free directory name for a raw id.
pub fn directory_key(raw: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(raw.as_bytes()));
    format!("{}-{}", sanitize_component(raw), &digest[..KEY_HASH_LEN])
}

/// Extension of the last path segment of `url`, lowercased.
///
/// Query strings and fragments are ignored. Falls back to `mp3` when the URL
/// has no plausible extension.
pub fn extension_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = without_query.rsplit('/').next().unwrap_or(without_query);

    match last_segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Directory holding every cached file of a namespace.
pub fn namespace_dir(cache_root: &Path, cache_directory: &str, namespace: &str) -> PathBuf {
    cache_root
        .join(cache_directory)
        .join(directory_key(namespace))
}

/// Directory holding one owner's cached file.
pub fn owner_dir(namespace_dir: &Path, owner_id: &str) -> PathBuf {
    namespace_dir.join(directory_key(owner_id))
}

/// Final local path for an owner's file.
pub fn cached_file_path(
    namespace_dir: &Path,
    owner_id: &str,
    display_name: &str,
    remote_url: &str,
) -> PathBuf {
    owner_dir(namespace_dir, owner_id).join(format!(
        "{}.{}",
        sanitize_component(display_name),
        extension_from_url(remote_url)
    ))
}

pub fn is_partial(path: &Path) -> bool {
    path.to_string_lossy().ends_with(PARTIAL_SUFFIX)
}

/// Fresh temporary path next to `final_path` for one download attempt.
///
/// Each call returns a different path, so cleanup of an abandoned attempt
/// can never touch the file of a later one.
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(format!(".{}{}", Uuid::new_v4().simple(), PARTIAL_SUFFIX));
    PathBuf::from(name)
}

/// Render a local path as a `file://` URL for host audio engines.
pub fn path_to_file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    if raw.starts_with('/') {
        format!("file://{}", raw)
    } else {
        format!("file:///{}", raw)
    }
}
