use windows::Win32::System::Com::{COINIT_MULTITHREADED, CoInitializeEx, CoUninitialize};

/// Keeps COM initialized on the calling thread for the guard's lifetime.
///
/// Listing runs each provider on its own short-lived thread, so the guard
/// is taken per operation rather than once per thread.
pub(crate) struct ComInit {
    initialized: bool,
}

impl ComInit {
    pub(crate) fn new() -> Self {
        // SAFETY: CoInitializeEx is safe to call; a thread that is already
        // initialized returns S_FALSE, which still needs a matching
        // CoUninitialize. RPC_E_CHANGED_MODE (already in an STA) does not.
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        Self {
            initialized: hr.is_ok(),
        }
    }
}

impl Drop for ComInit {
    fn drop(&mut self) {
        if self.initialized {
            // SAFETY: balances the successful CoInitializeEx in `new`.
            unsafe { CoUninitialize() };
        }
    }
}
