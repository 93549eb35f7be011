pub mod command_line;
pub mod config;
pub mod entry;
pub mod error;
pub mod location;
pub mod log;
pub mod manager;
pub mod provider;
pub mod registry;
pub mod service;
pub mod task;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use entry::{AutostartEntry, AutostartType};
pub use error::{Error, NativeError, Result};
pub use location::{Hive, Location, RegistryLocation};
pub use manager::AutostartManager;
pub use provider::AutostartProvider;
pub use registry::{RegValue, RegistryProvider, RegistryStore};
pub use service::{InstalledService, PublisherFilter, ServiceControl, ServiceProvider, StartType};
pub use task::{ExecAction, NewTask, RegisteredTask, TaskProvider, TaskScheduler, TriggerKind};
