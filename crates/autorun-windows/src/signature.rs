//! Authenticode publisher check for service binaries.

use std::fs::File;
use std::io::ErrorKind;
use std::os::windows::io::AsRawHandle;
use std::ptr;

use autorun_core::command_line;
use autorun_core::config::DEFAULT_TRUSTED_ISSUER;
use autorun_core::PublisherFilter;
use windows::Win32::Foundation::{HANDLE, HWND};
use windows::Win32::Security::Cryptography::{
    CERT_X500_NAME_STR, CRYPT_INTEGER_BLOB, CertNameToStrW, X509_ASN_ENCODING,
};
use windows::Win32::Security::WinTrust::{
    WINTRUST_ACTION_GENERIC_VERIFY_V2, WINTRUST_DATA, WINTRUST_DATA_0, WINTRUST_FILE_INFO,
    WTD_CHOICE_FILE, WTD_REVOKE_NONE, WTD_STATEACTION_CLOSE, WTD_STATEACTION_VERIFY,
    WTD_UI_NONE, WTHelperGetProvCertFromChain, WTHelperGetProvSignerFromChain,
    WTHelperProvDataFromStateData, WinVerifyTrust,
};
use windows::core::PCWSTR;

use crate::native::{from_wide, wide};
use crate::wow64::RedirectionScope;

/// Trusts binaries whose embedded signature verifies and whose signing
/// certificate was issued by a configured issuer.
#[derive(Debug, Clone)]
pub struct SignatureFilter {
    issuer: String,
}

impl SignatureFilter {
    /// `issuer` is matched as a substring of the X.500 issuer name.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    fn check_file(&self, path: &str, file: &File) -> bool {
        match signer_issuer(path, file) {
            Some(issuer) => issuer.contains(&self.issuer),
            None => false,
        }
    }
}

impl Default for SignatureFilter {
    fn default() -> Self {
        Self::new(DEFAULT_TRUSTED_ISSUER)
    }
}

impl PublisherFilter for SignatureFilter {
    fn is_trusted_publisher(&self, path: &str) -> bool {
        let path = command_line::executable_path(path);
        let path = path.strip_prefix(r"\??\").unwrap_or(&path);
        if path.is_empty() {
            return false;
        }

        match File::open(path) {
            Ok(file) => self.check_file(path, &file),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                // A 32-bit build sees SysWOW64 in place of System32.
                let _scope = RedirectionScope::new();
                File::open(path)
                    .map(|file| self.check_file(path, &file))
                    .unwrap_or(false)
            }
            Err(_) => false,
        }
    }
}

/// Verifies the file's embedded signature and returns the issuer of the
/// first signer's certificate, or `None` if the file is not trusted.
fn signer_issuer(path: &str, file: &File) -> Option<String> {
    let wide_path = wide(path);
    let mut file_info = WINTRUST_FILE_INFO {
        cbStruct: size_of::<WINTRUST_FILE_INFO>() as u32,
        pcwszFilePath: PCWSTR(wide_path.as_ptr()),
        hFile: HANDLE(file.as_raw_handle()),
        pgKnownSubject: ptr::null_mut(),
    };
    let mut data = WINTRUST_DATA {
        cbStruct: size_of::<WINTRUST_DATA>() as u32,
        dwUIChoice: WTD_UI_NONE,
        fdwRevocationChecks: WTD_REVOKE_NONE,
        dwUnionChoice: WTD_CHOICE_FILE,
        Anonymous: WINTRUST_DATA_0 {
            pFile: &mut file_info,
        },
        dwStateAction: WTD_STATEACTION_VERIFY,
        ..Default::default()
    };
    let mut action = WINTRUST_ACTION_GENERIC_VERIFY_V2;

    // SAFETY: `data` points at `file_info`, which points at `wide_path` and
    // an open handle; all outlive both calls. The state opened by VERIFY is
    // released by the CLOSE call below.
    let status = unsafe {
        WinVerifyTrust(
            HWND::default(),
            &mut action,
            ptr::from_mut(&mut data).cast(),
        )
    };
    let issuer = if status == 0 {
        // SAFETY: the state data stays valid until the CLOSE call.
        unsafe { first_signer_issuer(data.hWVTStateData) }
    } else {
        autorun_core::log_debug!("{path} is not trusted (0x{status:08X})");
        None
    };

    data.dwStateAction = WTD_STATEACTION_CLOSE;
    // SAFETY: closes the state opened above.
    unsafe {
        WinVerifyTrust(
            HWND::default(),
            &mut action,
            ptr::from_mut(&mut data).cast(),
        )
    };
    issuer
}

/// # Safety
/// `state` must be verification state that has not been closed yet.
unsafe fn first_signer_issuer(state: HANDLE) -> Option<String> {
    // SAFETY: every pointer is null-checked before it is dereferenced and
    // belongs to `state`.
    unsafe {
        let provider = WTHelperProvDataFromStateData(state);
        if provider.is_null() {
            return None;
        }
        let signer = WTHelperGetProvSignerFromChain(provider, 0, false, 0);
        if signer.is_null() {
            return None;
        }
        let cert = WTHelperGetProvCertFromChain(signer, 0);
        if cert.is_null() || (*cert).pCert.is_null() {
            return None;
        }
        let info = (*(*cert).pCert).pCertInfo;
        if info.is_null() {
            return None;
        }
        name_to_string(&(*info).Issuer)
    }
}

fn name_to_string(name: &CRYPT_INTEGER_BLOB) -> Option<String> {
    // SAFETY: a `None` buffer asks for the length including the terminator.
    let len = unsafe { CertNameToStrW(X509_ASN_ENCODING, name, CERT_X500_NAME_STR, None) };
    if len <= 1 {
        return None;
    }
    let mut buf = vec![0u16; len as usize];
    // SAFETY: `buf` holds `len` units.
    unsafe { CertNameToStrW(X509_ASN_ENCODING, name, CERT_X500_NAME_STR, Some(&mut buf)) };
    Some(from_wide(&buf))
}
