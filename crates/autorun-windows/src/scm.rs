//! [`ServiceControl`] over the Service Control Manager.

use autorun_core::{Error, InstalledService, Result, ServiceControl, StartType};
use windows::Win32::Foundation::{ERROR_MORE_DATA, ERROR_SERVICE_DOES_NOT_EXIST};
use windows::Win32::System::Services::{
    CloseServiceHandle, CreateServiceW, ChangeServiceConfigW, DeleteService,
    ENUM_SERVICE_STATUS_PROCESSW, ENUM_SERVICE_TYPE, EnumServicesStatusExW, OpenSCManagerW,
    OpenServiceW, SC_ENUM_PROCESS_INFO, SC_HANDLE, SC_MANAGER_CONNECT, SC_MANAGER_CREATE_SERVICE,
    SC_MANAGER_ENUMERATE_SERVICE, SERVICE_CHANGE_CONFIG, SERVICE_ERROR, SERVICE_ERROR_NORMAL,
    SERVICE_NO_CHANGE, SERVICE_START_TYPE, SERVICE_STATE_ALL, SERVICE_WIN32,
    SERVICE_WIN32_OWN_PROCESS,
};
use windows::core::PCWSTR;

use crate::native::{com_error, wide};

/// Standard `DELETE` access right.
const DELETE: u32 = 0x0001_0000;

/// Largest buffer `EnumServicesStatusExW` accepts in one call.
const ENUM_BUFFER_BYTES: usize = 256 * 1024;

/// The local Service Control Manager.
#[derive(Debug, Default, Clone, Copy)]
pub struct WinServiceControl;

/// An SCM or service handle, closed on drop.
struct ScHandle(SC_HANDLE);

impl ScHandle {
    fn manager(access: u32) -> Result<Self> {
        // SAFETY: null machine and database names select the local active
        // database.
        unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), access) }
            .map(Self)
            .map_err(|e| com_error("open service control manager", "local", &e))
    }

    fn service(&self, name: &str, access: u32) -> Result<Self> {
        let wide_name = wide(name);
        // SAFETY: `self.0` is an open SCM handle and the name is NUL-terminated.
        unsafe { OpenServiceW(self.0, PCWSTR(wide_name.as_ptr()), access) }
            .map(Self)
            .map_err(|e| service_error("open service", name, &e))
    }
}

impl Drop for ScHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by the SCM and is closed once.
        let _ = unsafe { CloseServiceHandle(self.0) };
    }
}

impl ServiceControl for WinServiceControl {
    fn installed_services(&self) -> Result<Vec<InstalledService>> {
        let scm = ScHandle::manager(SC_MANAGER_ENUMERATE_SERVICE)?;
        let mut services = Vec::new();
        let mut buffer = vec![0u8; ENUM_BUFFER_BYTES];
        let mut resume = 0u32;

        loop {
            let mut needed = 0u32;
            let mut returned = 0u32;
            // SAFETY: `buffer` is writable for its full length; the counters
            // and resume handle are valid out pointers.
            let result = unsafe {
                EnumServicesStatusExW(
                    scm.0,
                    SC_ENUM_PROCESS_INFO,
                    SERVICE_WIN32,
                    SERVICE_STATE_ALL,
                    Some(&mut buffer),
                    &mut needed,
                    &mut returned,
                    Some(&mut resume),
                    PCWSTR::null(),
                )
            };
            let more = match result {
                Ok(()) => false,
                Err(e) if e.code() == ERROR_MORE_DATA.to_hresult() => true,
                Err(e) => return Err(com_error("enumerate services", "local", &e)),
            };

            let records = buffer.as_ptr().cast::<ENUM_SERVICE_STATUS_PROCESSW>();
            for i in 0..returned as usize {
                // SAFETY: the SCM wrote `returned` records at the start of
                // `buffer`; their string pointers point into `buffer`, which
                // is not touched until the next call.
                let record = unsafe { records.add(i).read_unaligned() };
                let (Ok(name), Ok(display_name)) = (
                    unsafe { record.lpServiceName.to_string() },
                    unsafe { record.lpDisplayName.to_string() },
                ) else {
                    continue;
                };
                services.push(InstalledService { name, display_name });
            }

            if !more {
                break;
            }
            if returned == 0 && needed as usize > buffer.len() {
                buffer.resize(needed as usize, 0);
            }
        }

        autorun_core::log_debug!("SCM reported {} Win32 services", services.len());
        Ok(services)
    }

    fn create_service(
        &self,
        name: &str,
        display_name: &str,
        command_line: &str,
        start_type: StartType,
    ) -> Result<()> {
        let scm = ScHandle::manager(SC_MANAGER_CONNECT | SC_MANAGER_CREATE_SERVICE)?;
        let wide_name = wide(name);
        let wide_display = wide(display_name);
        let wide_command = wide(command_line);
        // SAFETY: every string is NUL-terminated and outlives the call; no
        // load order group, dependencies or account (LocalSystem).
        let handle = unsafe {
            CreateServiceW(
                scm.0,
                PCWSTR(wide_name.as_ptr()),
                PCWSTR(wide_display.as_ptr()),
                SERVICE_CHANGE_CONFIG,
                SERVICE_WIN32_OWN_PROCESS,
                SERVICE_START_TYPE(start_type.raw()),
                SERVICE_ERROR_NORMAL,
                PCWSTR(wide_command.as_ptr()),
                PCWSTR::null(),
                None,
                PCWSTR::null(),
                PCWSTR::null(),
                PCWSTR::null(),
            )
        }
        .map_err(|e| com_error("create service", name, &e))?;
        drop(ScHandle(handle));
        Ok(())
    }

    fn reconfigure_service(
        &self,
        name: &str,
        display_name: &str,
        command_line: &str,
    ) -> Result<()> {
        let scm = ScHandle::manager(SC_MANAGER_CONNECT)?;
        let service = scm.service(name, SERVICE_CHANGE_CONFIG)?;
        let wide_display = wide(display_name);
        let wide_command = wide(command_line);
        // SAFETY: SERVICE_NO_CHANGE leaves type, start type and error control
        // as they are; null pointers leave the other settings untouched.
        unsafe {
            ChangeServiceConfigW(
                service.0,
                ENUM_SERVICE_TYPE(SERVICE_NO_CHANGE),
                SERVICE_START_TYPE(SERVICE_NO_CHANGE),
                SERVICE_ERROR(SERVICE_NO_CHANGE),
                PCWSTR(wide_command.as_ptr()),
                PCWSTR::null(),
                None,
                PCWSTR::null(),
                PCWSTR::null(),
                PCWSTR::null(),
                PCWSTR(wide_display.as_ptr()),
            )
        }
        .map_err(|e| service_error("change service config", name, &e))
    }

    fn delete_service(&self, name: &str) -> Result<()> {
        let scm = ScHandle::manager(SC_MANAGER_CONNECT)?;
        let service = scm.service(name, DELETE)?;
        // SAFETY: `service` was opened with DELETE access.
        unsafe { DeleteService(service.0) }.map_err(|e| service_error("delete service", name, &e))
    }
}

fn service_error(operation: &'static str, name: &str, error: &windows::core::Error) -> Error {
    if error.code() == ERROR_SERVICE_DOES_NOT_EXIST.to_hresult() {
        return Error::not_found("service", name);
    }
    com_error(operation, name, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_includes_core_services() {
        // Arrange
        let scm = WinServiceControl;

        // Act
        let services = scm.installed_services().unwrap();

        // Assert
        assert!(
            services
                .iter()
                .any(|s| s.name.eq_ignore_ascii_case("EventLog"))
        );
    }

    #[test]
    fn deleting_unknown_service_is_not_found() {
        let err = WinServiceControl
            .delete_service("autorun-test-no-such-service")
            .unwrap_err();

        assert!(err.is_not_found());
    }
}
