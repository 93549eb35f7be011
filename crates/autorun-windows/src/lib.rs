/// COM apartment guard.
#[cfg(windows)]
mod com;

/// Wide strings and Win32 error conversion.
#[cfg(windows)]
mod native;

/// Registry access via the Reg* API.
#[cfg(windows)]
pub mod registry;

/// Service Control Manager access.
#[cfg(windows)]
pub mod scm;

/// Authenticode signature filter.
#[cfg(windows)]
pub mod signature;

/// Task Scheduler 2.0 access via COM.
#[cfg(windows)]
pub mod task_scheduler;

/// WOW64 file system redirection guard.
#[cfg(windows)]
pub mod wow64;

#[cfg(windows)]
pub use registry::WinRegistry;
#[cfg(windows)]
pub use scm::WinServiceControl;
#[cfg(windows)]
pub use signature::SignatureFilter;
#[cfg(windows)]
pub use task_scheduler::WinTaskScheduler;
#[cfg(windows)]
pub use wow64::RedirectionScope;

use autorun_core::{AutostartManager, Config};

/// Builds a manager with the registry, scheduled task and service
/// providers, in that listing order, configured from `config`.
#[cfg(windows)]
pub fn default_manager(config: &Config) -> AutostartManager {
    use autorun_core::{RegistryProvider, ServiceProvider, TaskProvider};

    let tasks = TaskProvider::new(WinTaskScheduler)
        .with_excluded_folders(config.tasks.excluded_folders.clone())
        .with_description(config.tasks.description.clone());
    let services = ServiceProvider::new(
        WinRegistry,
        WinServiceControl,
        SignatureFilter::new(config.services.trusted_issuer.clone()),
    )
    .hide_trusted(config.services.hide_trusted_publishers);

    AutostartManager::new(vec![
        Box::new(RegistryProvider::new(WinRegistry)),
        Box::new(tasks),
        Box::new(services),
    ])
}

/// Autostart mechanisms only exist on Windows; elsewhere no provider is
/// registered and every routed call fails with a routing error.
#[cfg(not(windows))]
pub fn default_manager(_config: &Config) -> AutostartManager {
    AutostartManager::new(Vec::new())
}

/// Whether this build can reach the native autostart mechanisms.
pub const fn is_supported() -> bool {
    cfg!(windows)
}
