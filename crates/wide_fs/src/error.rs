//! Error types and native-to-portable error code translation

use std::fmt;
use std::io;

use thiserror::Error;

use crate::encoding::CodePage;

// Win32 error codes recognized by the translation table. Defined locally so
// the table stays identical (and testable) on every platform.
const ERROR_FILE_NOT_FOUND: u32 = 2;
const ERROR_PATH_NOT_FOUND: u32 = 3;
const ERROR_TOO_MANY_OPEN_FILES: u32 = 4;
const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_HANDLE: u32 = 6;
const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
const ERROR_INVALID_BLOCK: u32 = 9;
const ERROR_INVALID_ACCESS: u32 = 12;
const ERROR_INVALID_DATA: u32 = 13;
const ERROR_INVALID_DRIVE: u32 = 15;
const ERROR_WRITE_PROTECT: u32 = 19;
const ERROR_SHARING_VIOLATION: u32 = 32;
const ERROR_LOCK_VIOLATION: u32 = 33;
const ERROR_SHARING_BUFFER_EXCEEDED: u32 = 36;
const ERROR_BAD_NETPATH: u32 = 53;
const ERROR_NETWORK_ACCESS_DENIED: u32 = 65;
const ERROR_FAIL_I24: u32 = 83;
const ERROR_INVALID_PARAMETER: u32 = 87;
const ERROR_DRIVE_LOCKED: u32 = 108;
const ERROR_BROKEN_PIPE: u32 = 109;
const ERROR_DISK_FULL: u32 = 112;
const ERROR_SEEK_ON_DEVICE: u32 = 132;
const ERROR_NOT_LOCKED: u32 = 158;
const ERROR_BAD_PATHNAME: u32 = 161;
const ERROR_LOCK_FAILED: u32 = 167;
const ERROR_ALREADY_EXISTS: u32 = 183;
const ERROR_FILENAME_EXCED_RANGE: u32 = 206;
const ERROR_NESTING_NOT_ALLOWED: u32 = 215;
const ERROR_NO_DATA: u32 = 232;
const ERROR_NOT_ENOUGH_QUOTA: u32 = 1816;

/// Portable error-code space that native OS errors are normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    TooManyOpenFiles,
    AccessDenied,
    BadHandle,
    OutOfMemory,
    InvalidArgument,
    BrokenPipe,
    NoSpace,
    AlreadyExists,
    WouldBlock,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "file or path not found",
            ErrorKind::TooManyOpenFiles => "too many open files",
            ErrorKind::AccessDenied => "access denied",
            ErrorKind::BadHandle => "bad file handle",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::BrokenPipe => "broken pipe",
            ErrorKind::NoSpace => "no space left on device",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::WouldBlock => "operation would block",
            ErrorKind::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

impl ErrorKind {
    /// Translate a raw Win32 error code into the portable space.
    ///
    /// Total over all inputs: codes outside the table fall into the
    /// write-protect..sharing-buffer range check, then default to
    /// `InvalidArgument`. `0` (no error) yields `None`.
    pub fn from_raw_os_error(code: u32) -> Option<ErrorKind> {
        let kind = match code {
            0 => return None,
            ERROR_FILE_NOT_FOUND
            | ERROR_PATH_NOT_FOUND
            | ERROR_INVALID_DRIVE
            | ERROR_BAD_NETPATH
            | ERROR_BAD_PATHNAME
            | ERROR_FILENAME_EXCED_RANGE => ErrorKind::NotFound,
            ERROR_TOO_MANY_OPEN_FILES => ErrorKind::TooManyOpenFiles,
            ERROR_ACCESS_DENIED
            | ERROR_SHARING_VIOLATION
            | ERROR_NETWORK_ACCESS_DENIED
            | ERROR_FAIL_I24
            | ERROR_SEEK_ON_DEVICE
            | ERROR_LOCK_VIOLATION
            | ERROR_DRIVE_LOCKED
            | ERROR_NOT_LOCKED
            | ERROR_LOCK_FAILED => ErrorKind::AccessDenied,
            ERROR_INVALID_HANDLE => ErrorKind::BadHandle,
            ERROR_NOT_ENOUGH_MEMORY | ERROR_INVALID_BLOCK | ERROR_NOT_ENOUGH_QUOTA => {
                ErrorKind::OutOfMemory
            }
            ERROR_INVALID_ACCESS | ERROR_INVALID_DATA | ERROR_INVALID_PARAMETER => {
                ErrorKind::InvalidArgument
            }
            ERROR_BROKEN_PIPE | ERROR_NO_DATA => ErrorKind::BrokenPipe,
            ERROR_DISK_FULL => ErrorKind::NoSpace,
            ERROR_ALREADY_EXISTS => ErrorKind::AlreadyExists,
            ERROR_NESTING_NOT_ALLOWED => ErrorKind::WouldBlock,
            // contiguous range of access-type errors
            c if (ERROR_WRITE_PROTECT..=ERROR_SHARING_BUFFER_EXCEEDED).contains(&c) => {
                ErrorKind::AccessDenied
            }
            _ => ErrorKind::InvalidArgument,
        };
        Some(kind)
    }

    /// Translate an `io::Error` immediately after the failing call.
    pub fn from_io_error(err: &io::Error) -> ErrorKind {
        #[cfg(windows)]
        if let Some(code) = err.raw_os_error() {
            return Self::from_raw_os_error(code as u32).unwrap_or(ErrorKind::Unknown);
        }
        #[cfg(unix)]
        if let Some(code) = err.raw_os_error() {
            return Self::from_errno(code);
        }
        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
            io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            io::ErrorKind::WouldBlock => ErrorKind::WouldBlock,
            io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
            io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
            io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
            _ => ErrorKind::Unknown,
        }
    }

    #[cfg(unix)]
    fn from_errno(code: i32) -> ErrorKind {
        match code {
            libc::ENOENT | libc::ENOTDIR => ErrorKind::NotFound,
            libc::EMFILE | libc::ENFILE => ErrorKind::TooManyOpenFiles,
            libc::EACCES | libc::EPERM => ErrorKind::AccessDenied,
            libc::EBADF => ErrorKind::BadHandle,
            libc::ENOMEM => ErrorKind::OutOfMemory,
            libc::EINVAL => ErrorKind::InvalidArgument,
            libc::EPIPE => ErrorKind::BrokenPipe,
            libc::ENOSPC => ErrorKind::NoSpace,
            libc::EEXIST => ErrorKind::AlreadyExists,
            libc::EAGAIN => ErrorKind::WouldBlock,
            _ => ErrorKind::Unknown,
        }
    }
}

/// File system errors
#[derive(Debug, Error)]
pub enum FsError {
    #[error("string not representable in {0:?} code page")]
    Encoding(CodePage),

    #[error("{kind}: {path}")]
    Os { kind: ErrorKind, path: String },
}

impl FsError {
    /// The portable error code behind this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::Encoding(_) => ErrorKind::InvalidArgument,
            FsError::Os { kind, .. } => *kind,
        }
    }

    pub(crate) fn os(err: &io::Error, path: impl Into<String>) -> FsError {
        FsError::Os {
            kind: ErrorKind::from_io_error(err),
            path: path.into(),
        }
    }
}

/// Lossy display form for byte-string paths used in error messages.
pub(crate) fn display_path(path: &[u8]) -> String {
    String::from_utf8_lossy(path).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_error_translates_to_none() {
        assert_eq!(ErrorKind::from_raw_os_error(0), None);
    }

    #[test]
    fn not_found_family() {
        for code in [2, 3, 15, 53, 161, 206] {
            assert_eq!(ErrorKind::from_raw_os_error(code), Some(ErrorKind::NotFound));
        }
    }

    #[test]
    fn access_family_and_range() {
        // explicit members
        for code in [5, 32, 33, 65, 83, 108, 132, 158, 167] {
            assert_eq!(
                ErrorKind::from_raw_os_error(code),
                Some(ErrorKind::AccessDenied),
                "code {code}"
            );
        }
        // codes inside the write-protect..sharing-buffer range with no
        // explicit table entry
        for code in [19, 21, 27, 36] {
            assert_eq!(
                ErrorKind::from_raw_os_error(code),
                Some(ErrorKind::AccessDenied),
                "code {code}"
            );
        }
    }

    #[test]
    fn remaining_table_entries() {
        assert_eq!(
            ErrorKind::from_raw_os_error(4),
            Some(ErrorKind::TooManyOpenFiles)
        );
        assert_eq!(ErrorKind::from_raw_os_error(6), Some(ErrorKind::BadHandle));
        for code in [8, 9, 1816] {
            assert_eq!(
                ErrorKind::from_raw_os_error(code),
                Some(ErrorKind::OutOfMemory)
            );
        }
        for code in [12, 13, 87] {
            assert_eq!(
                ErrorKind::from_raw_os_error(code),
                Some(ErrorKind::InvalidArgument)
            );
        }
        for code in [109, 232] {
            assert_eq!(
                ErrorKind::from_raw_os_error(code),
                Some(ErrorKind::BrokenPipe)
            );
        }
        assert_eq!(ErrorKind::from_raw_os_error(112), Some(ErrorKind::NoSpace));
        assert_eq!(
            ErrorKind::from_raw_os_error(183),
            Some(ErrorKind::AlreadyExists)
        );
        assert_eq!(
            ErrorKind::from_raw_os_error(215),
            Some(ErrorKind::WouldBlock)
        );
    }

    #[test]
    fn unmapped_codes_still_translate() {
        // total function: anything unknown defaults to InvalidArgument
        for code in [1, 7, 999, 54321, u32::MAX] {
            assert_eq!(
                ErrorKind::from_raw_os_error(code),
                Some(ErrorKind::InvalidArgument),
                "code {code}"
            );
        }
    }

    #[test]
    fn io_error_translation() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(ErrorKind::from_io_error(&err), ErrorKind::NotFound);
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(ErrorKind::from_io_error(&err), ErrorKind::AccessDenied);
    }

    #[cfg(unix)]
    #[test]
    fn errno_translation() {
        let err = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(ErrorKind::from_io_error(&err), ErrorKind::NotFound);
        let err = io::Error::from_raw_os_error(libc::ENOSPC);
        assert_eq!(ErrorKind::from_io_error(&err), ErrorKind::NoSpace);
        let err = io::Error::from_raw_os_error(libc::ENOTDIR);
        assert_eq!(ErrorKind::from_io_error(&err), ErrorKind::NotFound);
    }

    #[test]
    fn fs_error_kind_accessor() {
        let err = FsError::Os {
            kind: ErrorKind::NoSpace,
            path: "x".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NoSpace);
        let err = FsError::Encoding(CodePage::Utf8);
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
