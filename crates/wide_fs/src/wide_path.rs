//! Wide-string path construction

use std::ffi::OsStr;
use std::path::PathBuf;

/// Platform path separator as a wide character.
#[cfg(windows)]
pub const SEPARATOR: u16 = b'\\' as u16;
#[cfg(not(windows))]
pub const SEPARATOR: u16 = b'/' as u16;

/// Whether a wide character is a path separator.
pub fn is_separator(c: u16) -> bool {
    #[cfg(windows)]
    {
        c == b'\\' as u16 || c == b'/' as u16
    }
    #[cfg(not(windows))]
    {
        c == b'/' as u16
    }
}

/// Join a directory path and a file name into a single wide path.
///
/// `dir_len` limits how much of `dir` is used; `None` means the whole slice.
/// Leading separators are stripped from `file_name` when a directory is
/// present, and exactly one separator is inserted at the boundary unless the
/// directory already ends with one. With `dir == None` the file name is
/// returned as-is and `dir_len` is ignored.
pub fn join_wide(dir: Option<&[u16]>, dir_len: Option<usize>, file_name: &[u16]) -> Vec<u16> {
    let (dir, file_name) = match dir {
        None => (&[][..], file_name),
        Some(d) => {
            let mut name = file_name;
            while let Some((&c, rest)) = name.split_first() {
                if !is_separator(c) {
                    break;
                }
                name = rest;
            }
            let len = dir_len.unwrap_or(d.len()).min(d.len());
            (&d[..len], name)
        }
    };

    let mut out = Vec::with_capacity(dir.len() + file_name.len() + 1);
    out.extend_from_slice(dir);
    if let Some(&last) = out.last() {
        if last != SEPARATOR {
            out.push(SEPARATOR);
        }
    }
    out.extend_from_slice(file_name);
    out
}

/// Widen an OS string for use with the native path APIs.
pub fn os_to_wide(s: &OsStr) -> Vec<u16> {
    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        s.encode_wide().collect()
    }
    #[cfg(not(windows))]
    {
        s.to_string_lossy().encode_utf16().collect()
    }
}

/// Turn a wide string into a `PathBuf` for the native backend.
///
/// `None` means the wide string is not valid UTF-16 (possible only on the
/// portable backend, where paths must be real Unicode).
pub(crate) fn wide_to_path(wide: &[u16]) -> Option<PathBuf> {
    #[cfg(windows)]
    {
        use std::ffi::OsString;
        use std::os::windows::ffi::OsStringExt;
        Some(PathBuf::from(OsString::from_wide(wide)))
    }
    #[cfg(not(windows))]
    {
        String::from_utf16(wide).ok().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn sep() -> String {
        char::from_u32(SEPARATOR as u32).unwrap().to_string()
    }

    #[test]
    fn bare_file_name() {
        let name = w("x.txt");
        assert_eq!(join_wide(None, None, &name), name);
        // dir_len is ignored without a directory
        assert_eq!(join_wide(None, Some(3), &name), name);
    }

    #[test]
    fn inserts_single_separator() {
        let dir = w("data");
        let joined = join_wide(Some(&dir), None, &w("x.txt"));
        assert_eq!(joined, w(&format!("data{}x.txt", sep())));
    }

    #[test]
    fn no_doubled_separator() {
        let dir = w(&format!("data{}", sep()));
        let joined = join_wide(Some(&dir), None, &w("x.txt"));
        assert_eq!(joined, w(&format!("data{}x.txt", sep())));
    }

    #[test]
    fn strips_leading_separators_from_file_name() {
        let dir = w("data");
        let name = w(&format!("{0}{0}x.txt", sep()));
        let joined = join_wide(Some(&dir), None, &name);
        assert_eq!(joined, w(&format!("data{}x.txt", sep())));
    }

    #[test]
    fn dir_len_truncates() {
        let dir = w("data-extra");
        let joined = join_wide(Some(&dir), Some(4), &w("x.txt"));
        assert_eq!(joined, w(&format!("data{}x.txt", sep())));
    }

    #[test]
    fn empty_dir_slice_keeps_name_bare() {
        let dir = w("data");
        let joined = join_wide(Some(&dir), Some(0), &w("x.txt"));
        assert_eq!(joined, w("x.txt"));
    }

    #[cfg(windows)]
    #[test]
    fn windows_drive_paths() {
        let dir = w("C:\\data");
        assert_eq!(
            join_wide(Some(&dir), None, &w("\\x.txt")),
            w("C:\\data\\x.txt")
        );
        let dir = w("C:\\data\\");
        assert_eq!(join_wide(Some(&dir), None, &w("x.txt")), w("C:\\data\\x.txt"));
    }
}
