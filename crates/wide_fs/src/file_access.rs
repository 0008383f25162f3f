//! Opening files through the two-code-page fallback
//!
//! Paths arrive as byte strings in the active encoding mode. Every open
//! converts with the primary code page first and retries once with the
//! secondary page, but only when the failure was "not found" — any other
//! failure is real and must not be masked by a retry under a different
//! spelling of the path.

use std::fs::{File, OpenOptions};

use crate::encoding;
use crate::error::{display_path, ErrorKind, FsError};
use crate::wide_path;
use crate::Result;

/// Parse an fopen-style mode string into `OpenOptions`.
///
/// Accepts `r`, `w`, `a`, an optional `+`, and ignored `b`/`t` suffixes.
/// Mode strings are plain ASCII and are read as UTF-8 regardless of the
/// active encoding mode.
fn options_for_mode(mode: &[u8]) -> Option<OpenOptions> {
    let mode = std::str::from_utf8(mode).ok()?;
    let mut bytes = mode.bytes();
    let primary = bytes.next()?;
    let mut plus = false;
    for c in bytes {
        match c {
            b'+' => plus = true,
            b'b' | b't' => {}
            _ => return None,
        }
    }

    let mut opts = OpenOptions::new();
    match primary {
        b'r' => {
            opts.read(true);
            if plus {
                opts.write(true);
            }
        }
        b'w' => {
            opts.write(true).create(true).truncate(true);
            if plus {
                opts.read(true);
            }
        }
        b'a' => {
            opts.append(true).create(true);
            if plus {
                opts.read(true);
            }
        }
        _ => return None,
    }
    Some(opts)
}

/// Open a file by byte-string path with the requested share mode.
///
/// `exclusive` denies write access to other handles for as long as the
/// returned handle is open.
pub fn open_file(path: &[u8], mode: &[u8], exclusive: bool) -> Result<File> {
    let opts = options_for_mode(mode).ok_or_else(|| FsError::Os {
        kind: ErrorKind::InvalidArgument,
        path: display_path(path),
    })?;

    let mut last: Option<FsError> = None;
    for try_no in 0..2 {
        let code_page = encoding::select_code_page(encoding::encoding_mode(), try_no);
        let wide = match encoding::multibyte_to_wide(path, code_page) {
            Some(w) => w,
            None => {
                last.get_or_insert(FsError::Encoding(code_page));
                continue;
            }
        };
        match open_wide(&wide, &opts, exclusive) {
            Ok(file) => return Ok(file),
            Err(err) => {
                let retry = err.kind() == ErrorKind::NotFound;
                last = Some(err);
                if !retry {
                    break;
                }
                tracing::debug!(
                    path = %display_path(path),
                    "file not found under primary code page, retrying with secondary"
                );
            }
        }
    }
    Err(last.unwrap_or_else(|| FsError::Os {
        kind: ErrorKind::NotFound,
        path: display_path(path),
    }))
}

/// Whether the file can be opened with exclusive write access right now.
///
/// Opens read-only with write access denied, releasing the handle before
/// returning. A boolean probe only: no error code is reported.
pub fn can_open_exclusive(path: &[u8]) -> bool {
    let mut opts = OpenOptions::new();
    opts.read(true);
    for try_no in 0..2 {
        let code_page = encoding::select_code_page(encoding::encoding_mode(), try_no);
        let Some(wide) = encoding::multibyte_to_wide(path, code_page) else {
            continue;
        };
        if open_wide(&wide, &opts, true).is_ok() {
            // handle dropped here
            return true;
        }
    }
    false
}

#[cfg(windows)]
fn open_wide(wide: &[u16], opts: &OpenOptions, exclusive: bool) -> Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    use windows::Win32::Storage::FileSystem::{
        FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
    };

    // wide strings from the codec are always valid here
    let path = match wide_path::wide_to_path(wide) {
        Some(p) => p,
        None => {
            return Err(FsError::Os {
                kind: ErrorKind::InvalidArgument,
                path: String::new(),
            })
        }
    };
    let share = if exclusive {
        FILE_SHARE_READ.0
    } else {
        FILE_SHARE_READ.0 | FILE_SHARE_WRITE.0 | FILE_SHARE_DELETE.0
    };
    let mut opts = opts.clone();
    opts.share_mode(share);
    opts.open(&path)
        .map_err(|e| FsError::os(&e, path.display().to_string()))
}

#[cfg(not(windows))]
fn open_wide(wide: &[u16], opts: &OpenOptions, exclusive: bool) -> Result<File> {
    let path = match wide_path::wide_to_path(wide) {
        Some(p) => p,
        None => {
            return Err(FsError::Os {
                kind: ErrorKind::InvalidArgument,
                path: String::new(),
            })
        }
    };
    let file = opts
        .open(&path)
        .map_err(|e| FsError::os(&e, path.display().to_string()))?;
    if exclusive {
        // deny-write sharing has no direct unix equivalent; a non-blocking
        // whole-file lock stands in for it, and a held lock translates to
        // the same AccessDenied a Windows sharing violation produces
        lock_exclusive(&file, &path)?;
    }
    Ok(file)
}

#[cfg(unix)]
fn lock_exclusive(file: &File, path: &std::path::Path) -> Result<()> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    let kind = if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        ErrorKind::AccessDenied
    } else {
        ErrorKind::from_io_error(&err)
    };
    Err(FsError::Os {
        kind,
        path: path.display().to_string(),
    })
}

#[cfg(all(not(windows), not(unix)))]
fn lock_exclusive(_file: &File, _path: &std::path::Path) -> Result<()> {
    Ok(())
}
