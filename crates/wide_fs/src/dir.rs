//! Directory iteration over the native batched enumeration API
//!
//! A [`DirIter`] is a cursor: one native enumeration handle, one buffered
//! native record, and one decoded name owned for exactly the current entry.
//! Entries whose names the fixed native code page cannot represent are
//! skipped, never surfaced as errors; only access-denied makes opening a
//! directory fail.

use crate::encoding::{self, native_code_page};
use crate::error::{display_path, ErrorKind, FsError};
use crate::wide_path;
use crate::Result;

const DOT: u16 = b'.' as u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// Opened; the first native record is buffered but not yet consumed.
    NotStarted,
    /// Positioned on the n-th matching native record.
    AtIndex(u32),
    /// Enumeration exhausted, or the directory could not be enumerated.
    Ended,
}

/// One directory entry, borrowed from the iterator.
///
/// Both names stay valid only until the next [`DirIter::next`] call or until
/// the iterator is dropped; use [`DirEntry::to_owned`] to retain one.
#[derive(Debug)]
pub struct DirEntry<'a> {
    name: &'a [u8],
    wide_name: &'a [u16],
    is_dir: bool,
}

impl<'a> DirEntry<'a> {
    /// Entry name decoded into the fixed native code page.
    pub fn name(&self) -> &'a [u8] {
        self.name
    }

    /// Entry name as reported by the OS, borrowed from the native record.
    pub fn wide_name(&self) -> &'a [u16] {
        self.wide_name
    }

    /// Whether the native record's attributes mark a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Copy the entry out of the iterator's buffers.
    pub fn to_owned(&self) -> DirEntryBuf {
        DirEntryBuf {
            name: self.name.to_vec(),
            wide_name: self.wide_name.to_vec(),
            is_dir: self.is_dir,
        }
    }
}

/// An owned copy of a [`DirEntry`].
#[derive(Debug, Clone)]
pub struct DirEntryBuf {
    pub name: Vec<u8>,
    pub wide_name: Vec<u16>,
    pub is_dir: bool,
}

/// Cursor over one directory's entries.
pub struct DirIter {
    native: Option<Native>,
    state: CursorState,
    /// Decoded name of the current entry; released before each advance.
    name: Option<Vec<u8>>,
}

/// Open a directory given as a byte-string path.
///
/// Retries with the secondary code page unless the first attempt failed with
/// access-denied. Access-denied is the only error; a directory that cannot
/// be enumerated for any other reason (or is empty) yields an iterator that
/// is already ended.
pub fn open_dir(path: &[u8]) -> Result<DirIter> {
    // the native search wants a wildcard-suffixed pattern; the portable
    // backend enumerates the directory itself
    #[cfg(windows)]
    let target = {
        let mut p = path.to_vec();
        p.extend_from_slice(b"\\*");
        p
    };
    #[cfg(not(windows))]
    let target = path.to_vec();

    let mode = encoding::encoding_mode();
    let mut denied = false;
    let mut opened = None;
    for try_no in 0..2 {
        let code_page = encoding::select_code_page(mode, try_no);
        let Some(wide) = encoding::multibyte_to_wide(&target, code_page) else {
            continue;
        };
        match Native::open(&wide) {
            Ok(native) => {
                opened = Some(native);
                break;
            }
            Err(ErrorKind::AccessDenied) => {
                denied = true;
                break;
            }
            Err(kind) => {
                tracing::debug!(
                    path = %display_path(path),
                    try_no,
                    ?kind,
                    "directory enumeration attempt failed"
                );
            }
        }
    }

    if denied {
        return Err(FsError::Os {
            kind: ErrorKind::AccessDenied,
            path: display_path(path),
        });
    }
    Ok(DirIter::from_outcome(opened.unwrap_or(None)))
}

/// Open a directory given as a wide path, without code-page fallback.
pub fn open_dir_wide(path: &[u16]) -> Result<DirIter> {
    #[cfg(windows)]
    let target = wide_path::join_wide(Some(path), None, &[b'*' as u16]);
    #[cfg(not(windows))]
    let target = path.to_vec();

    match Native::open(&target) {
        Err(ErrorKind::AccessDenied) => Err(FsError::Os {
            kind: ErrorKind::AccessDenied,
            path: String::from_utf16_lossy(path),
        }),
        Err(_) => Ok(DirIter::from_outcome(None)),
        Ok(outcome) => Ok(DirIter::from_outcome(outcome)),
    }
}

impl DirIter {
    fn from_outcome(native: Option<Native>) -> DirIter {
        let state = if native.is_some() {
            CursorState::NotStarted
        } else {
            CursorState::Ended
        };
        DirIter {
            native,
            state,
            name: None,
        }
    }

    /// Advance to the next entry, skipping `.` and `..` and any entry whose
    /// name the native code page cannot represent.
    ///
    /// Returns `None` once the enumeration is exhausted; further calls keep
    /// returning `None`.
    pub fn next(&mut self) -> Option<DirEntry<'_>> {
        // release the previous entry's decoded name before advancing
        self.name = None;
        let native = match self.native.as_mut() {
            Some(n) if self.state != CursorState::Ended => n,
            _ => return None,
        };

        loop {
            match self.state {
                CursorState::NotStarted => self.state = CursorState::AtIndex(1),
                CursorState::AtIndex(n) => {
                    if !native.advance() {
                        self.state = CursorState::Ended;
                        return None;
                    }
                    self.state = CursorState::AtIndex(n + 1);
                }
                CursorState::Ended => return None,
            }

            let decoded = {
                let wide_name = native.wide_name();
                if matches!(wide_name, [DOT] | [DOT, DOT]) {
                    continue;
                }
                encoding::wide_to_multibyte(wide_name, Some(native_code_page()))
            };
            match decoded {
                Some((bytes, false)) => {
                    self.name = Some(bytes);
                    break;
                }
                _ => {
                    // quietly skip an unrepresentable name and keep searching
                    tracing::debug!("skipping directory entry with undecodable name");
                }
            }
        }

        let native = self.native.as_ref()?;
        Some(DirEntry {
            name: self.name.as_deref().unwrap_or(&[]),
            wide_name: native.wide_name(),
            is_dir: native.is_dir(),
        })
    }

    /// Close the iterator, releasing the native handle and buffers.
    pub fn close(self) {}
}

#[cfg(windows)]
struct Native {
    handle: windows::Win32::Foundation::HANDLE,
    data: windows::Win32::Storage::FileSystem::WIN32_FIND_DATAW,
}

#[cfg(windows)]
impl Native {
    /// Start a native search; `Ok(Some)` buffers the first record.
    fn open(pattern: &[u16]) -> std::result::Result<Option<Native>, ErrorKind> {
        use windows::core::PCWSTR;
        use windows::Win32::Storage::FileSystem::{FindFirstFileW, WIN32_FIND_DATAW};

        let mut terminated = pattern.to_vec();
        terminated.push(0);
        let mut data = WIN32_FIND_DATAW::default();
        match unsafe { FindFirstFileW(PCWSTR(terminated.as_ptr()), &mut data) } {
            Ok(handle) => Ok(Some(Native { handle, data })),
            Err(err) => {
                let code = (err.code().0 & 0xFFFF) as u32;
                Err(ErrorKind::from_raw_os_error(code).unwrap_or(ErrorKind::Unknown))
            }
        }
    }

    fn advance(&mut self) -> bool {
        use windows::Win32::Storage::FileSystem::FindNextFileW;
        unsafe { FindNextFileW(self.handle, &mut self.data) }.is_ok()
    }

    fn wide_name(&self) -> &[u16] {
        let name = &self.data.cFileName;
        let len = name.iter().position(|&c| c == 0).unwrap_or(name.len());
        &name[..len]
    }

    fn is_dir(&self) -> bool {
        use windows::Win32::Storage::FileSystem::FILE_ATTRIBUTE_DIRECTORY;
        self.data.dwFileAttributes & FILE_ATTRIBUTE_DIRECTORY.0 != 0
    }
}

#[cfg(windows)]
impl Drop for Native {
    fn drop(&mut self) {
        use windows::Win32::Storage::FileSystem::FindClose;
        unsafe {
            let _ = FindClose(self.handle);
        }
    }
}

#[cfg(not(windows))]
struct Native {
    read_dir: std::fs::ReadDir,
    wide_name: Vec<u16>,
    is_dir: bool,
}

#[cfg(not(windows))]
impl Native {
    /// Open and buffer the first record; `Ok(None)` means the directory
    /// opened but holds no entries.
    fn open(path: &[u16]) -> std::result::Result<Option<Native>, ErrorKind> {
        let path = wide_path::wide_to_path(path).ok_or(ErrorKind::InvalidArgument)?;
        let read_dir = std::fs::read_dir(&path).map_err(|e| ErrorKind::from_io_error(&e))?;
        let mut native = Native {
            read_dir,
            wide_name: Vec::new(),
            is_dir: false,
        };
        Ok(native.advance().then_some(native))
    }

    fn advance(&mut self) -> bool {
        loop {
            match self.read_dir.next() {
                None => return false,
                Some(Err(err)) => {
                    tracing::debug!(%err, "directory enumeration stopped early");
                    return false;
                }
                Some(Ok(entry)) => {
                    let name = entry.file_name();
                    // names that are not valid Unicode cannot be widened;
                    // skip them like any other undecodable entry
                    let Some(name) = name.to_str() else { continue };
                    self.wide_name = name.encode_utf16().collect();
                    self.is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    return true;
                }
            }
        }
    }

    fn wide_name(&self) -> &[u16] {
        &self.wide_name
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}
