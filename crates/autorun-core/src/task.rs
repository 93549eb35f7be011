//! Scheduled tasks that run at logon or boot.

use crate::error::require;
use crate::location::{MICROSOFT_TASK_FOLDER, parse_task_path, root_task_path};
use crate::provider::recreate;
use crate::{AutostartEntry, AutostartProvider, AutostartType, Error, Result};

/// Path shown for tasks whose first action does not run a program.
pub const UNAVAILABLE_PATH: &str = "N/A";

/// Registration description used when none is configured.
pub const DEFAULT_DESCRIPTION: &str = "Autostart task created by autorun";

/// The trigger types relevant to autostart. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Logon,
    Boot,
    Other,
}

/// Program and arguments of an exec action.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecAction {
    pub path: String,
    pub arguments: Option<String>,
}

/// A task as read from the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredTask {
    /// Leaf name.
    pub name: String,
    /// Full path including folders, e.g. `\Vendor\Updater`.
    pub path: String,
    pub enabled: bool,
    pub triggers: Vec<TriggerKind>,
    /// The first action, when it is an exec action.
    pub exec_action: Option<ExecAction>,
}

impl RegisteredTask {
    fn runs_at_startup(&self) -> bool {
        self.triggers
            .iter()
            .any(|t| matches!(t, TriggerKind::Logon | TriggerKind::Boot))
    }
}

/// Definition of a task to register: one logon trigger, one exec action,
/// interactive-token principal, battery restrictions off and concurrent
/// instances ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub action: ExecAction,
    pub enabled: bool,
}

/// Task Scheduler operations. Paths are full task paths.
pub trait TaskScheduler: Send + Sync {
    /// Every registered task in every folder, hidden ones included.
    fn tasks(&self) -> Result<Vec<RegisteredTask>>;

    /// Registers `task` in the root folder, replacing a task of the same name.
    fn register(&self, task: &NewTask) -> Result<()>;

    /// Replaces the first exec action's path and arguments and commits.
    ///
    /// [`Error::NotFound`] if the task or its exec action is missing.
    fn update_action(&self, path: &str, action: &ExecAction) -> Result<()>;

    /// [`Error::NotFound`] if the task is missing.
    fn set_enabled(&self, path: &str, enabled: bool) -> Result<()>;

    /// [`Error::NotFound`] if the task is missing.
    fn delete(&self, path: &str) -> Result<()>;
}

impl<T: TaskScheduler + ?Sized> TaskScheduler for &T {
    fn tasks(&self) -> Result<Vec<RegisteredTask>> {
        (**self).tasks()
    }
    fn register(&self, task: &NewTask) -> Result<()> {
        (**self).register(task)
    }
    fn update_action(&self, path: &str, action: &ExecAction) -> Result<()> {
        (**self).update_action(path, action)
    }
    fn set_enabled(&self, path: &str, enabled: bool) -> Result<()> {
        (**self).set_enabled(path, enabled)
    }
    fn delete(&self, path: &str) -> Result<()> {
        (**self).delete(path)
    }
}

/// Provider for [`AutostartType::ScheduledTask`] entries.
pub struct TaskProvider<S> {
    scheduler: S,
    excluded_folders: Vec<String>,
    description: String,
}

impl<S: TaskScheduler> TaskProvider<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            excluded_folders: vec![MICROSOFT_TASK_FOLDER.to_string()],
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }

    /// Folder prefixes whose tasks are never listed.
    pub fn with_excluded_folders(mut self, folders: Vec<String>) -> Self {
        self.excluded_folders = folders;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excluded_folders.iter().any(|folder| {
            path.get(..folder.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(folder))
        })
    }

    fn to_entry(task: RegisteredTask) -> AutostartEntry {
        let (executable_path, arguments) = match task.exec_action {
            Some(action) => (action.path, action.arguments.filter(|a| !a.trim().is_empty())),
            None => (UNAVAILABLE_PATH.to_string(), None),
        };
        AutostartEntry {
            name: task.name,
            executable_path,
            arguments,
            kind: AutostartType::ScheduledTask,
            location: task.path,
            is_enabled: task.enabled,
        }
    }
}

impl<S: TaskScheduler> AutostartProvider for TaskProvider<S> {
    fn kind(&self) -> AutostartType {
        AutostartType::ScheduledTask
    }

    fn list(&self) -> Result<Vec<AutostartEntry>> {
        let entries = self
            .scheduler
            .tasks()?
            .into_iter()
            .filter(|task| task.runs_at_startup() && !self.is_excluded(&task.path))
            .map(Self::to_entry)
            .collect();
        Ok(entries)
    }

    fn create(&self, entry: &AutostartEntry) -> Result<()> {
        require("task name", &entry.name)?;
        require("executable path", &entry.executable_path)?;

        self.scheduler.register(&NewTask {
            name: entry.name.trim_start_matches('\\').to_string(),
            description: self.description.clone(),
            action: action_of(entry),
            enabled: entry.is_enabled,
        })
    }

    fn enable(&self, entry: &AutostartEntry) -> Result<()> {
        self.scheduler.set_enabled(&parse(entry)?, true)
    }

    fn disable(&self, entry: &AutostartEntry) -> Result<()> {
        self.scheduler.set_enabled(&parse(entry)?, false)
    }

    fn modify(&self, original: &AutostartEntry, updated: &AutostartEntry) -> Result<()> {
        require("task name", &updated.name)?;
        require("executable path", &updated.executable_path)?;
        let path = parse(original)?;

        if original.name != updated.name {
            self.delete(original)?;
            return recreate(original, updated, || self.create(updated));
        }
        self.scheduler.update_action(&path, &action_of(updated))
    }

    fn delete(&self, entry: &AutostartEntry) -> Result<()> {
        let path = parse(entry)?;
        match self.scheduler.delete(&path) {
            Err(Error::NotFound { .. }) => {
                crate::log_debug!("task {path} already gone");
                Ok(())
            }
            other => other,
        }
    }
}

fn action_of(entry: &AutostartEntry) -> ExecAction {
    ExecAction {
        path: entry.executable_path.trim().to_string(),
        arguments: entry
            .arguments
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
    }
}

fn parse(entry: &AutostartEntry) -> Result<String> {
    parse_task_path(&entry.location)
}

/// Location a task created from `entry` ends up at.
pub fn created_location(entry: &AutostartEntry) -> String {
    root_task_path(&entry.name)
}
