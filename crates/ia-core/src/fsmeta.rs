//! Filesystem metadata reader.
//!
//! Creation timestamps back the two weakest install-date tiers. Both lookups
//! are infallible by contract: a path that is missing, of the wrong kind, or
//! on a filesystem without birth times simply yields `None`.

use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::trace;

/// Creation-time lookups for files and directories.
pub trait FileMetadata {
    /// Creation time of `path` in local time, if it exists and is a regular file.
    fn file_created(&self, path: &str) -> Option<NaiveDateTime>;

    /// Creation time of `path` in local time, if it exists and is a directory.
    fn dir_created(&self, path: &str) -> Option<NaiveDateTime>;
}

/// Expands abbreviated (8.3) path components to their long form.
pub trait PathNormalizer {
    /// Long form of `path`. Returns the input unchanged when it cannot be expanded.
    fn normalize(&self, path: &str) -> String;
}

/// [`FileMetadata`] over `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileMetadata;

impl StdFileMetadata {
    fn created(path: &str, want_dir: bool) -> Option<NaiveDateTime> {
        let meta = match fs::metadata(Path::new(path)) {
            Ok(meta) => meta,
            Err(e) => {
                trace!(path, error = %e, "no metadata");
                return None;
            }
        };
        let kind_ok = if want_dir { meta.is_dir() } else { meta.is_file() };
        if !kind_ok {
            return None;
        }
        match meta.created() {
            Ok(created) => Some(to_local(created)),
            Err(e) => {
                trace!(path, error = %e, "creation time unavailable");
                None
            }
        }
    }
}

impl FileMetadata for StdFileMetadata {
    fn file_created(&self, path: &str) -> Option<NaiveDateTime> {
        Self::created(path, false)
    }

    fn dir_created(&self, path: &str) -> Option<NaiveDateTime> {
        Self::created(path, true)
    }
}

/// Convert a platform timestamp to a naive local timestamp.
pub fn to_local(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

/// Leaves every path untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl PathNormalizer for IdentityNormalizer {
    fn normalize(&self, path: &str) -> String {
        path.to_string()
    }
}

/// The platform normalizer: `GetLongPathNameW` on Windows, identity elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPathNormalizer;

#[cfg(windows)]
impl PathNormalizer for SystemPathNormalizer {
    fn normalize(&self, path: &str) -> String {
        long_path_name(path).unwrap_or_else(|| path.to_string())
    }
}

#[cfg(not(windows))]
impl PathNormalizer for SystemPathNormalizer {
    fn normalize(&self, path: &str) -> String {
        path.to_string()
    }
}

#[cfg(windows)]
fn long_path_name(path: &str) -> Option<String> {
    use std::ffi::{OsStr, OsString};
    use std::os::windows::ffi::{OsStrExt, OsStringExt};
    use windows_sys::Win32::Storage::FileSystem::GetLongPathNameW;

    /// MAX_PATH; the call reports the real size when this is too small.
    const INITIAL_CHARS: usize = 260;

    let wide: Vec<u16> = OsStr::new(path)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let mut buf = vec![0u16; INITIAL_CHARS];
    for _ in 0..2 {
        // SAFETY: `wide` is NUL-terminated; `buf` is writable for `buf.len()` u16s.
        let len = unsafe { GetLongPathNameW(wide.as_ptr(), buf.as_mut_ptr(), buf.len() as u32) }
            as usize;
        if len == 0 {
            trace!(path, "long path lookup failed");
            return None;
        }
        if len < buf.len() {
            return Some(OsString::from_wide(&buf[..len]).to_string_lossy().into_owned());
        }
        buf.resize(len, 0);
    }
    None
}
