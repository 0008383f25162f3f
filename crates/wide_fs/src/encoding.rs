//! Code-page aware conversion between byte strings and wide strings
//!
//! Byte strings arriving from the outside world are encoded in one of three
//! code pages: UTF-8, the OS "ANSI" locale page, or the OEM console page.
//! Which one is authoritative is a process-wide choice fixed at startup;
//! conversions that fail under the primary page are retried once with the
//! secondary page by the callers in `file_access` and `dir`.

use once_cell::sync::OnceCell;

/// Process-wide choice of the authoritative code page family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    /// Byte strings are UTF-8.
    Utf8,
    /// Byte strings use the OEM console code page.
    Oem,
    /// Byte strings use the OS-local ANSI code page.
    Ansi,
}

impl Default for EncodingMode {
    fn default() -> Self {
        #[cfg(windows)]
        {
            EncodingMode::Ansi
        }
        #[cfg(not(windows))]
        {
            EncodingMode::Utf8
        }
    }
}

static MODE: OnceCell<EncodingMode> = OnceCell::new();

/// Fix the process-wide encoding mode.
///
/// Must be called before any conversion, at most once. Returns `false` if the
/// mode was already fixed (by an earlier call or by first use).
pub fn init_encoding_mode(mode: EncodingMode) -> bool {
    MODE.set(mode).is_ok()
}

/// The active process-wide encoding mode.
pub fn encoding_mode() -> EncodingMode {
    *MODE.get_or_init(EncodingMode::default)
}

/// A concrete code page a conversion runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePage {
    Utf8,
    Ansi,
    Oem,
}

#[cfg(windows)]
impl CodePage {
    fn native(self) -> u32 {
        use windows::Win32::Globalization::{CP_ACP, CP_OEMCP, CP_UTF8};
        match self {
            CodePage::Utf8 => CP_UTF8,
            CodePage::Ansi => CP_ACP,
            CodePage::Oem => CP_OEMCP,
        }
    }
}

#[cfg(not(windows))]
impl CodePage {
    // The portable backend stands in for the Windows code pages with fixed
    // encodings: windows-1252 for the ANSI locale page and IBM866 for the OEM
    // console page, so the two fallback attempts still target distinct pages.
    fn encoding(self) -> &'static encoding_rs::Encoding {
        match self {
            CodePage::Utf8 => encoding_rs::UTF_8,
            CodePage::Ansi => encoding_rs::WINDOWS_1252,
            CodePage::Oem => encoding_rs::IBM866,
        }
    }
}

/// The fixed code page the OS reports directory entry names in.
///
/// Independent of [`encoding_mode`]: enumeration results always come back in
/// one consistent page.
pub fn native_code_page() -> CodePage {
    #[cfg(windows)]
    {
        CodePage::Ansi
    }
    #[cfg(not(windows))]
    {
        CodePage::Utf8
    }
}

/// Pick the code page for a primary (`try_no == 0`) or secondary
/// (`try_no == 1`) conversion attempt under the given mode.
///
/// Utf8 mode tries [Utf8, Ansi]; Oem mode tries [Oem, Utf8]; Ansi mode tries
/// [Ansi, Utf8]. The Utf8-mode fallback is deliberately the ANSI page, never
/// OEM.
pub fn select_code_page(mode: EncodingMode, try_no: usize) -> CodePage {
    debug_assert!(try_no < 2);
    let primary_is_utf8 = mode == EncodingMode::Utf8;
    let is_utf8_attempt = try_no == usize::from(!primary_is_utf8);
    if is_utf8_attempt {
        CodePage::Utf8
    } else if mode == EncodingMode::Oem {
        CodePage::Oem
    } else {
        CodePage::Ansi
    }
}

/// Convert a byte string to a wide string using the primary or secondary
/// code page of the active encoding mode.
pub fn try_to_wide(text: &[u8], try_no: usize) -> Option<Vec<u16>> {
    to_wide_for_mode(text, encoding_mode(), try_no)
}

fn to_wide_for_mode(text: &[u8], mode: EncodingMode, try_no: usize) -> Option<Vec<u16>> {
    multibyte_to_wide(text, select_code_page(mode, try_no))
}

/// Convert a UTF-8 byte string to a wide string, regardless of the active
/// encoding mode.
pub fn utf8_to_wide(text: &[u8]) -> Option<Vec<u16>> {
    multibyte_to_wide(text, CodePage::Utf8)
}

/// Strictly convert a byte string to a wide string under `code_page`.
///
/// Returns `None` if any byte sequence is not valid in the code page.
#[cfg(windows)]
pub fn multibyte_to_wide(text: &[u8], code_page: CodePage) -> Option<Vec<u16>> {
    use windows::Win32::Globalization::{
        MultiByteToWideChar, MB_ERR_INVALID_CHARS, MULTI_BYTE_TO_WIDE_CHAR_FLAGS,
    };

    if text.is_empty() {
        return Some(Vec::new());
    }
    // size probe first, strict; then the real conversion into an exactly
    // sized buffer
    let size = unsafe { MultiByteToWideChar(code_page.native(), MB_ERR_INVALID_CHARS, text, None) };
    if size <= 0 {
        return None;
    }
    let mut buf = vec![0u16; size as usize];
    let written = unsafe {
        MultiByteToWideChar(
            code_page.native(),
            MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0),
            text,
            Some(&mut buf),
        )
    };
    if written <= 0 {
        return None;
    }
    buf.truncate(written as usize);
    Some(buf)
}

#[cfg(not(windows))]
pub fn multibyte_to_wide(text: &[u8], code_page: CodePage) -> Option<Vec<u16>> {
    if text.is_empty() {
        return Some(Vec::new());
    }
    // no BOM sniffing: the caller picked the code page, honor it literally
    let (decoded, had_errors) = code_page.encoding().decode_without_bom_handling(text);
    if had_errors {
        return None;
    }
    Some(decoded.encode_utf16().collect())
}

/// Convert a wide string back to a byte string.
///
/// `code_page == None` resolves to the primary page of the active encoding
/// mode at call time. The second element reports lossy substitution; it is
/// `false` by construction for the UTF-8 page, where the native conversion
/// refuses to track substitutions.
#[cfg(windows)]
pub fn wide_to_multibyte(wide: &[u16], code_page: Option<CodePage>) -> Option<(Vec<u8>, bool)> {
    use windows::core::PCSTR;
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::Globalization::WideCharToMultiByte;

    let code_page = code_page.unwrap_or_else(|| select_code_page(encoding_mode(), 0));
    if wide.is_empty() {
        return Some((Vec::new(), false));
    }
    // lpUsedDefaultChar must stay null for CP_UTF8 or the call fails
    let track_lossy = code_page != CodePage::Utf8;
    let mut used_default = BOOL(0);

    let size = unsafe {
        WideCharToMultiByte(code_page.native(), 0, wide, None, PCSTR::null(), None)
    };
    if size <= 0 {
        return None;
    }
    let mut buf = vec![0u8; size as usize];
    let written = unsafe {
        WideCharToMultiByte(
            code_page.native(),
            0,
            wide,
            Some(&mut buf),
            PCSTR::null(),
            track_lossy.then_some(&mut used_default as *mut BOOL),
        )
    };
    if written <= 0 {
        return None;
    }
    buf.truncate(written as usize);
    Some((buf, track_lossy && used_default.as_bool()))
}

#[cfg(not(windows))]
pub fn wide_to_multibyte(wide: &[u16], code_page: Option<CodePage>) -> Option<(Vec<u8>, bool)> {
    let code_page = code_page.unwrap_or_else(|| select_code_page(encoding_mode(), 0));
    if wide.is_empty() {
        return Some((Vec::new(), false));
    }
    let text = String::from_utf16(wide).ok()?;
    let (encoded, _, lossy) = code_page.encoding().encode(&text);
    let lossy = lossy && code_page != CodePage::Utf8;
    Some((encoded.into_owned(), lossy))
}

/// Convert a byte string from the active encoding mode to UTF-8.
///
/// When the mode is already UTF-8 this is a validated copy; otherwise the
/// string round-trips through the primary code page.
pub fn to_utf8(text: &[u8]) -> Option<String> {
    if encoding_mode() == EncodingMode::Utf8 {
        return String::from_utf8(text.to_vec()).ok();
    }
    let wide = try_to_wide(text, 0)?;
    let (bytes, _) = wide_to_multibyte(&wide, Some(CodePage::Utf8))?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn selector_policy() {
        assert_eq!(select_code_page(EncodingMode::Utf8, 0), CodePage::Utf8);
        // the Utf8-mode fallback is the ANSI page, never Oem
        assert_eq!(select_code_page(EncodingMode::Utf8, 1), CodePage::Ansi);
        assert_eq!(select_code_page(EncodingMode::Oem, 0), CodePage::Oem);
        assert_eq!(select_code_page(EncodingMode::Oem, 1), CodePage::Utf8);
        assert_eq!(select_code_page(EncodingMode::Ansi, 0), CodePage::Ansi);
        assert_eq!(select_code_page(EncodingMode::Ansi, 1), CodePage::Utf8);
    }

    #[test]
    fn mode_can_be_fixed_only_once() {
        // pin the platform default so tests running in the same process keep
        // observing the mode they already assume
        let _ = init_encoding_mode(EncodingMode::default());
        assert!(!init_encoding_mode(EncodingMode::Oem));
        assert_eq!(encoding_mode(), EncodingMode::default());
    }

    #[test]
    fn selector_attempts_are_distinct() {
        for mode in [EncodingMode::Utf8, EncodingMode::Oem, EncodingMode::Ansi] {
            assert_ne!(select_code_page(mode, 0), select_code_page(mode, 1));
        }
    }

    #[test]
    fn utf8_round_trip() {
        let text = "Hello, 世界!".as_bytes();
        let w = multibyte_to_wide(text, CodePage::Utf8).unwrap();
        let (back, lossy) = wide_to_multibyte(&w, Some(CodePage::Utf8)).unwrap();
        assert_eq!(back, text);
        assert!(!lossy);
    }

    #[test]
    fn utf8_rejects_invalid_sequences() {
        assert!(multibyte_to_wide(b"ok \xff\xfe", CodePage::Utf8).is_none());
        assert!(utf8_to_wide(b"\x80").is_none());
    }

    #[test]
    fn empty_strings_convert() {
        assert_eq!(multibyte_to_wide(b"", CodePage::Utf8), Some(Vec::new()));
        let (bytes, lossy) = wide_to_multibyte(&[], Some(CodePage::Ansi)).unwrap();
        assert!(bytes.is_empty());
        assert!(!lossy);
    }

    #[cfg(not(windows))]
    #[test]
    fn ansi_round_trip() {
        // "héllo" in windows-1252
        let text = b"h\xe9llo";
        let w = multibyte_to_wide(text, CodePage::Ansi).unwrap();
        assert_eq!(w, wide("héllo"));
        let (back, lossy) = wide_to_multibyte(&w, Some(CodePage::Ansi)).unwrap();
        assert_eq!(back, text);
        assert!(!lossy);
    }

    #[cfg(not(windows))]
    #[test]
    fn ansi_keeps_utf8_bom_bytes_literal() {
        // "ï»¿A" in windows-1252 happens to start with the UTF-8 BOM bytes;
        // the requested page must be honored, not sniffed away
        let text = b"\xef\xbb\xbfA";
        let w = multibyte_to_wide(text, CodePage::Ansi).unwrap();
        assert_eq!(w, wide("ï»¿A"));
        let (back, lossy) = wide_to_multibyte(&w, Some(CodePage::Ansi)).unwrap();
        assert_eq!(back, text);
        assert!(!lossy);
    }

    #[cfg(not(windows))]
    #[test]
    fn lossy_substitution_is_reported() {
        let w = wide("日本語");
        let (_, lossy) = wide_to_multibyte(&w, Some(CodePage::Ansi)).unwrap();
        assert!(lossy);
        // the UTF-8 page can represent anything, never lossy
        let (bytes, lossy) = wide_to_multibyte(&w, Some(CodePage::Utf8)).unwrap();
        assert_eq!(bytes, "日本語".as_bytes());
        assert!(!lossy);
    }

    #[cfg(not(windows))]
    #[test]
    fn fallback_attempt_accepts_what_primary_rejects() {
        // not valid UTF-8, but any byte decodes under the ANSI stand-in
        let text = b"caf\xe9";
        assert!(to_wide_for_mode(text, EncodingMode::Utf8, 0).is_none());
        assert!(to_wide_for_mode(text, EncodingMode::Utf8, 1).is_some());
    }

    #[test]
    fn to_utf8_ascii_is_identity() {
        assert_eq!(to_utf8(b"plain.txt").as_deref(), Some("plain.txt"));
    }

    #[test]
    fn unspecified_code_page_resolves_to_active_mode() {
        let w = wide("abc");
        let (bytes, _) = wide_to_multibyte(&w, None).unwrap();
        assert_eq!(bytes, b"abc");
    }
}
