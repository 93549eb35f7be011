//! Wide-string and error conversions shared by the Win32 backends.

use autorun_core::Error;
use windows::Win32::Foundation::WIN32_ERROR;

/// Encodes `s` as a NUL-terminated UTF-16 string.
pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decodes UTF-16 up to the first NUL (or the end of the buffer).
pub(crate) fn from_wide(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

/// Converts a failed registry/SCM status code into an [`Error::Native`].
pub(crate) fn win32_error(
    operation: &'static str,
    target: impl Into<String>,
    status: WIN32_ERROR,
) -> Error {
    let message = windows::core::Error::from_hresult(status.to_hresult()).message();
    Error::native(operation, target, status.0 as i32, message)
}

/// Converts a `windows::core::Error` (HRESULT) into an [`Error::Native`].
pub(crate) fn com_error(
    operation: &'static str,
    target: impl Into<String>,
    error: &windows::core::Error,
) -> Error {
    Error::native(operation, target, error.code().0, error.message())
}
