//! Atomic file helpers.
//!
//! Every file a concurrent reader may poll (series caches, snapshots, the job
//! status record) is written to a sibling temp file first and renamed into
//! place, so readers observe either the old or the new content in full.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt};

/// Sibling temp path for `path`, unique per call.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let tag = &uuid::Uuid::new_v4().simple().to_string()[..8];
    path.with_file_name(format!(".{name}.{tag}.tmp"))
}

/// Write `bytes` to `path` via temp file + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .context(format!("creating directory {}", parent.display()))?;
        }
    }

    let tmp = temp_path_for(path);
    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(crate::Error::from(e).with_context(format!("writing {}", path.display())));
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Copy `src` over `dst` atomically (temp copy next to `dst`, then rename).
pub fn copy_atomic(src: &Path, dst: &Path) -> Result<()> {
    let bytes = fs::read(src).context(format!("reading {}", src.display()))?;
    write_atomic(dst, &bytes)
}

/// Read a JSON file. A missing file is `Ok(None)`; unreadable or undecodable
/// content is an error (see [`crate::Error::is_decode`]).
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(crate::Error::from(e).with_context(format!("reading {}", path.display()))),
    };
    let value = serde_json::from_slice(&bytes).context(format!("decoding {}", path.display()))?;
    Ok(Some(value))
}
