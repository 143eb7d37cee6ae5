use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::EmbedResult;

/// Replaces `path` with `content` through a sibling temp file, keeping the
/// previous content as `<name>.bak` when `backup` is set.
pub fn write_atomic(path: &Path, content: &str, backup: bool) -> EmbedResult<()> {
    let tmp_path = unique_sibling(path, "tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    if backup && path.exists() {
        if let Err(err) = fs::copy(path, backup_path(path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }

    Ok(())
}

pub fn backup_path(path: &Path) -> PathBuf {
    append_suffix(path, "bak")
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("body"));
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn unique_sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut counter = 0u32;
    loop {
        let candidate = if counter == 0 {
            append_suffix(path, suffix)
        } else {
            append_suffix(path, &format!("{suffix}{counter}"))
        };

        if !candidate.exists() {
            return candidate;
        }

        counter += 1;
    }
}
