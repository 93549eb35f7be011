//! Scoped suspension of WOW64 file system redirection.

use std::ffi::c_void;

use windows::Win32::Storage::FileSystem::{
    Wow64DisableWow64FsRedirection, Wow64RevertWow64FsRedirection,
};
use windows::Win32::System::Threading::{GetCurrentProcess, IsWow64Process};

/// While alive, a 32-bit process on 64-bit Windows sees the real
/// `System32` instead of `SysWOW64`. A no-op for native processes.
///
/// Redirection is per thread, so the guard must be dropped on the thread
/// that created it.
pub struct RedirectionScope {
    /// Cookie from a successful disable; `None` if nothing was changed.
    old_value: Option<*mut c_void>,
}

impl RedirectionScope {
    pub fn new() -> Self {
        if !is_wow64() {
            return Self { old_value: None };
        }
        let mut old_value: *mut c_void = std::ptr::null_mut();
        // SAFETY: `old_value` is a valid out pointer; it is only passed back
        // to Wow64RevertWow64FsRedirection on this thread.
        let disabled = unsafe { Wow64DisableWow64FsRedirection(&mut old_value) };
        match disabled {
            Ok(()) => Self {
                old_value: Some(old_value),
            },
            Err(e) => {
                autorun_core::log_debug!("could not disable WOW64 redirection: {e}");
                Self { old_value: None }
            }
        }
    }

    /// Whether redirection is currently suspended by this guard.
    pub fn is_active(&self) -> bool {
        self.old_value.is_some()
    }
}

impl Default for RedirectionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RedirectionScope {
    fn drop(&mut self) {
        if let Some(old_value) = self.old_value.take() {
            // SAFETY: `old_value` came from the matching disable call.
            let _ = unsafe { Wow64RevertWow64FsRedirection(old_value) };
        }
    }
}

/// `true` for a 32-bit process on 64-bit Windows.
pub fn is_wow64() -> bool {
    let mut wow64 = Default::default();
    // SAFETY: GetCurrentProcess returns a pseudo handle that needs no
    // closing; `wow64` is a valid out pointer.
    let ok = unsafe { IsWow64Process(GetCurrentProcess(), &mut wow64) };
    ok.is_ok() && wow64.as_bool()
}
