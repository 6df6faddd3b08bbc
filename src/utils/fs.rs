//! File system helpers: lexical path normalization and the atomic-or-failing move.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Bytes kept verbatim in a file name component; everything else, `%`
/// included, is percent-encoded.
const FILE_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

/// Encodes `key` into a single file name component.
///
/// Distinct keys always map to distinct names, and the result never
/// contains a path separator.
pub fn encode_file_component(key: &str) -> String {
    utf8_percent_encode(key, FILE_COMPONENT).to_string()
}

/// Normalizes `path` lexically, resolving `.` and `..` without touching the disk.
///
/// `..` never climbs above the root of an absolute path.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => (),
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Moves `from` to `to`, replacing whatever `to` held.
///
/// The destination either ends up holding the complete file or is left
/// untouched. Missing parent directories are created. When a plain rename is
/// impossible (different volumes), the file is copied next to the destination
/// and renamed over it.
pub fn move_replacing(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            debug!("Creating destination directory {:?}", parent);
            fs::create_dir_all(parent)?;
        }
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!("Rename {:?} -> {:?} failed ({}), copying instead", from, to, rename_err);
            let staging = staging_path(to);
            let copied = fs::copy(from, &staging).and_then(|_| fs::rename(&staging, to));
            match copied {
                Ok(()) => {
                    let _ = fs::remove_file(from);
                    Ok(())
                }
                Err(_) => {
                    let _ = fs::remove_file(&staging);
                    Err(rename_err)
                }
            }
        }
    }
}

fn staging_path(to: &Path) -> PathBuf {
    let mut name = to
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".trawl-partial");
    to.with_file_name(name)
}
