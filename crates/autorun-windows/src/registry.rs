//! [`RegistryStore`] over the Win32 registry API.
//!
//! Every key is opened with `KEY_WOW64_64KEY` so a 32-bit build sees the
//! same `Run` and `Services` keys as the rest of the system.

use autorun_core::{Error, Hive, RegValue, RegistryStore, Result};
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_MORE_DATA, ERROR_NO_MORE_ITEMS};
use windows::Win32::System::Environment::ExpandEnvironmentStringsW;
use windows::Win32::System::Registry::{
    HKEY, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE, KEY_SET_VALUE,
    KEY_WOW64_64KEY, REG_BINARY, REG_DWORD, REG_EXPAND_SZ, REG_OPTION_NON_VOLATILE,
    REG_SAM_FLAGS, REG_SZ, REG_VALUE_TYPE, RegCloseKey, RegCreateKeyExW, RegDeleteValueW,
    RegEnumValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
};
use windows::core::{PCWSTR, PWSTR};

use crate::native::{from_wide, wide, win32_error};

/// Longest value name the registry allows, plus the terminator.
const MAX_VALUE_NAME: usize = 16_384;

/// The local machine's registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct WinRegistry;

/// An open key, closed on drop.
struct Key(HKEY);

impl Key {
    /// Opens an existing key. `None` if it does not exist.
    fn open(hive: Hive, path: &str, access: REG_SAM_FLAGS) -> Result<Option<Self>> {
        let wide_path = wide(path);
        let mut key = HKEY::default();
        // SAFETY: RegOpenKeyExW is a standard Win32 registry API. We pass a
        // NUL-terminated path and a valid out pointer; the key is closed by Drop.
        let status = unsafe {
            RegOpenKeyExW(
                root(hive),
                PCWSTR(wide_path.as_ptr()),
                None,
                access | KEY_WOW64_64KEY,
                &mut key,
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status.is_err() {
            return Err(win32_error("open registry key", display(hive, path), status));
        }
        Ok(Some(Self(key)))
    }

    /// Opens a key, creating it and any missing parents.
    fn create(hive: Hive, path: &str, access: REG_SAM_FLAGS) -> Result<Self> {
        let wide_path = wide(path);
        let mut key = HKEY::default();
        // SAFETY: RegCreateKeyExW is a standard Win32 registry API. No class,
        // default security, and a valid out pointer for the handle.
        let status = unsafe {
            RegCreateKeyExW(
                root(hive),
                PCWSTR(wide_path.as_ptr()),
                None,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                access | KEY_WOW64_64KEY,
                None,
                &mut key,
                None,
            )
        };
        if status.is_err() {
            return Err(win32_error("create registry key", display(hive, path), status));
        }
        Ok(Self(key))
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        // SAFETY: the handle came from RegOpenKeyExW/RegCreateKeyExW and is
        // closed exactly once.
        let _ = unsafe { RegCloseKey(self.0) };
    }
}

impl RegistryStore for WinRegistry {
    fn value_names(&self, hive: Hive, key_path: &str) -> Result<Option<Vec<String>>> {
        let Some(key) = Key::open(hive, key_path, KEY_QUERY_VALUE)? else {
            return Ok(None);
        };

        let mut names = Vec::new();
        let mut buf = vec![0u16; MAX_VALUE_NAME];
        for index in 0u32.. {
            let mut len = buf.len() as u32;
            // SAFETY: `buf` holds `len` UTF-16 units; type and data are not
            // requested.
            let status = unsafe {
                RegEnumValueW(
                    key.0,
                    index,
                    Some(PWSTR(buf.as_mut_ptr())),
                    &mut len,
                    None,
                    None,
                    None,
                    None,
                )
            };
            if status == ERROR_NO_MORE_ITEMS {
                break;
            }
            if status.is_err() {
                return Err(win32_error(
                    "enumerate registry values",
                    display(hive, key_path),
                    status,
                ));
            }
            names.push(String::from_utf16_lossy(&buf[..len as usize]));
        }
        Ok(Some(names))
    }

    fn read_value(&self, hive: Hive, key_path: &str, name: &str) -> Result<Option<RegValue>> {
        let Some(key) = Key::open(hive, key_path, KEY_QUERY_VALUE)? else {
            return Ok(None);
        };
        let wide_name = wide(name);
        let target = || format!("{}\\{name}", display(hive, key_path));

        let mut kind = REG_VALUE_TYPE::default();
        let mut size = 0u32;
        // SAFETY: size query only; no data buffer is passed.
        let status = unsafe {
            RegQueryValueExW(
                key.0,
                PCWSTR(wide_name.as_ptr()),
                None,
                Some(&mut kind),
                None,
                Some(&mut size),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status.is_err() {
            return Err(win32_error("read registry value", target(), status));
        }

        let mut data = vec![0u8; size as usize];
        loop {
            let mut len = data.len() as u32;
            // SAFETY: `data` is valid for `len` bytes.
            let status = unsafe {
                RegQueryValueExW(
                    key.0,
                    PCWSTR(wide_name.as_ptr()),
                    None,
                    Some(&mut kind),
                    Some(data.as_mut_ptr()),
                    Some(&mut len),
                )
            };
            if status == ERROR_MORE_DATA {
                // The value grew between the two calls.
                data.resize(len as usize, 0);
                continue;
            }
            if status == ERROR_FILE_NOT_FOUND {
                return Ok(None);
            }
            if status.is_err() {
                return Err(win32_error("read registry value", target(), status));
            }
            data.truncate(len as usize);
            break;
        }

        Ok(decode(kind, &data))
    }

    fn write_value(
        &self,
        hive: Hive,
        key_path: &str,
        name: &str,
        value: &RegValue,
    ) -> Result<()> {
        let key = Key::open(hive, key_path, KEY_SET_VALUE)?
            .ok_or_else(|| Error::not_found("registry key", display(hive, key_path)))?;
        let wide_name = wide(name);
        let (kind, bytes) = encode(value);
        // SAFETY: RegSetValueExW is a standard Win32 registry API. `bytes`
        // carries the exact byte length of the data.
        let status = unsafe {
            RegSetValueExW(key.0, PCWSTR(wide_name.as_ptr()), None, kind, Some(&bytes))
        };
        if status.is_err() {
            return Err(win32_error(
                "write registry value",
                format!("{}\\{name}", display(hive, key_path)),
                status,
            ));
        }
        Ok(())
    }

    fn delete_value(&self, hive: Hive, key_path: &str, name: &str) -> Result<bool> {
        let Some(key) = Key::open(hive, key_path, KEY_SET_VALUE)? else {
            return Ok(false);
        };
        let wide_name = wide(name);
        // SAFETY: RegDeleteValueW is a standard Win32 registry API.
        let status = unsafe { RegDeleteValueW(key.0, PCWSTR(wide_name.as_ptr())) };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(false);
        }
        if status.is_err() {
            return Err(win32_error(
                "delete registry value",
                format!("{}\\{name}", display(hive, key_path)),
                status,
            ));
        }
        Ok(true)
    }

    fn create_key(&self, hive: Hive, key_path: &str) -> Result<()> {
        Key::create(hive, key_path, KEY_SET_VALUE).map(drop)
    }
}

fn root(hive: Hive) -> HKEY {
    match hive {
        Hive::CurrentUser => HKEY_CURRENT_USER,
        Hive::LocalMachine => HKEY_LOCAL_MACHINE,
    }
}

fn display(hive: Hive, path: &str) -> String {
    format!("{hive}\\{path}")
}

fn decode(kind: REG_VALUE_TYPE, data: &[u8]) -> Option<RegValue> {
    match kind {
        REG_SZ => Some(RegValue::String(utf16_from_bytes(data))),
        REG_EXPAND_SZ => Some(RegValue::String(expand(&utf16_from_bytes(data)))),
        REG_BINARY => Some(RegValue::Binary(data.to_vec())),
        REG_DWORD => {
            let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
            Some(RegValue::Dword(u32::from_le_bytes(bytes)))
        }
        other => {
            autorun_core::log_debug!("ignoring registry value of type {}", other.0);
            None
        }
    }
}

fn encode(value: &RegValue) -> (REG_VALUE_TYPE, Vec<u8>) {
    match value {
        RegValue::String(s) => (
            REG_SZ,
            wide(s).iter().flat_map(|c| c.to_le_bytes()).collect(),
        ),
        RegValue::Binary(b) => (REG_BINARY, b.clone()),
        RegValue::Dword(v) => (REG_DWORD, v.to_le_bytes().to_vec()),
    }
}

fn utf16_from_bytes(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    from_wide(&units)
}

/// Expands `%VAR%` references; returns the input unchanged on failure.
fn expand(s: &str) -> String {
    let src = wide(s);
    // SAFETY: a `None` destination only asks for the required length.
    let needed = unsafe { ExpandEnvironmentStringsW(PCWSTR(src.as_ptr()), None) };
    if needed == 0 {
        return s.to_string();
    }
    let mut buf = vec![0u16; needed as usize];
    // SAFETY: `buf` has room for `needed` units including the terminator.
    let written = unsafe { ExpandEnvironmentStringsW(PCWSTR(src.as_ptr()), Some(&mut buf)) };
    if written == 0 || written as usize > buf.len() {
        return s.to_string();
    }
    from_wide(&buf)
}
