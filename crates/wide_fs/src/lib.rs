//! wide_fs — Unicode-correct file access over code-page encoded byte strings
//!
//! The native file APIs speak wide (UTF-16) strings while the surrounding
//! application works with byte strings in a locale-dependent encoding. This
//! crate bridges the two:
//! - Conversion between byte strings and wide strings under a selectable
//!   code page, with a deterministic two-page fallback order
//! - File opening and an exclusive-access probe through that translation
//!   layer
//! - POSIX-style directory iteration (open/next/close) over the native
//!   batched enumeration, skipping entries whose names cannot be decoded
//! - Translation of native OS errors into a small portable error-code space
//!
//! The process-wide [`EncodingMode`] must be fixed (via
//! [`init_encoding_mode`]) before the first conversion.

mod dir;
mod encoding;
mod error;
mod file_access;
mod wide_path;

pub use dir::{open_dir, open_dir_wide, DirEntry, DirEntryBuf, DirIter};
pub use encoding::{
    encoding_mode, init_encoding_mode, multibyte_to_wide, native_code_page, select_code_page,
    to_utf8, try_to_wide, utf8_to_wide, wide_to_multibyte, CodePage, EncodingMode,
};
pub use error::{ErrorKind, FsError};
pub use file_access::{can_open_exclusive, open_file};
pub use wide_path::{is_separator, join_wide, os_to_wide, SEPARATOR};

pub type Result<T> = std::result::Result<T, FsError>;
