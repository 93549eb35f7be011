//! [`TaskScheduler`] over the Task Scheduler 2.0 COM API.

use autorun_core::location::task_folder;
use autorun_core::{
    Error, ExecAction, NewTask, RegisteredTask, Result, TaskScheduler, TriggerKind,
};
use windows::Win32::Foundation::{
    ERROR_FILE_NOT_FOUND, ERROR_PATH_NOT_FOUND, VARIANT_BOOL, VARIANT_FALSE, VARIANT_TRUE,
};
use windows::Win32::System::Com::{CLSCTX_INPROC_SERVER, CoCreateInstance};
use windows::Win32::System::TaskScheduler::{
    IActionCollection, IExecAction, IRegisteredTask, ITaskDefinition, ITaskFolder, ITaskService,
    TASK_ACTION_EXEC, TASK_CREATE_OR_UPDATE, TASK_ENUM_HIDDEN, TASK_INSTANCES_IGNORE_NEW,
    TASK_LOGON_INTERACTIVE_TOKEN, TASK_TRIGGER_BOOT, TASK_TRIGGER_LOGON, TASK_UPDATE,
    TaskScheduler as TaskSchedulerClass,
};
use windows::core::{BSTR, Interface, VARIANT};

use crate::com::ComInit;
use crate::native::com_error;

/// The local Task Scheduler service.
#[derive(Debug, Default, Clone, Copy)]
pub struct WinTaskScheduler;

/// A connected `ITaskService`. Fields drop in order, so the service is
/// released before COM is torn down.
struct Session {
    service: ITaskService,
    _com: ComInit,
}

impl Session {
    fn connect() -> Result<Self> {
        let com = ComInit::new();
        let service = connect_service().map_err(|e| com_error("connect to task scheduler", "local", &e))?;
        Ok(Self { service, _com: com })
    }

    fn folder(&self, path: &str) -> windows::core::Result<ITaskFolder> {
        // SAFETY: the service is connected; the BSTR lives across the call.
        unsafe { self.service.GetFolder(&BSTR::from(path)) }
    }

    fn task(&self, path: &str) -> windows::core::Result<IRegisteredTask> {
        // SAFETY: as above; GetTask accepts a full path from the root folder.
        unsafe { self.folder("\\")?.GetTask(&BSTR::from(path)) }
    }
}

fn connect_service() -> windows::core::Result<ITaskService> {
    // SAFETY: COM is initialized on this thread by the caller's ComInit.
    let service: ITaskService =
        unsafe { CoCreateInstance(&TaskSchedulerClass, None, CLSCTX_INPROC_SERVER)? };
    let empty = VARIANT::default();
    // SAFETY: empty VARIANTs connect to the local machine as the current user.
    unsafe { service.Connect(&empty, &empty, &empty, &empty)? };
    Ok(service)
}

impl TaskScheduler for WinTaskScheduler {
    fn tasks(&self) -> Result<Vec<RegisteredTask>> {
        let session = Session::connect()?;
        let root = session
            .folder("\\")
            .map_err(|e| com_error("open task folder", "\\", &e))?;
        let mut tasks = Vec::new();
        collect(&root, &mut tasks).map_err(|e| com_error("enumerate tasks", "\\", &e))?;
        Ok(tasks)
    }

    fn register(&self, task: &NewTask) -> Result<()> {
        let session = Session::connect()?;
        register(&session, task).map_err(|e| com_error("register task", task.name.as_str(), &e))
    }

    fn update_action(&self, path: &str, action: &ExecAction) -> Result<()> {
        let session = Session::connect()?;
        let registered = session
            .task(path)
            .map_err(|e| task_error("open task", path, &e))?;
        // SAFETY: `registered` is a live task from the connected service.
        let definition = unsafe { registered.Definition() }
            .map_err(|e| task_error("read task definition", path, &e))?;
        let exec = first_exec_action(&definition)
            .map_err(|e| task_error("read task actions", path, &e))?
            .ok_or_else(|| Error::not_found("exec action", path))?;

        apply_action(&exec, action)
            .and_then(|()| commit(&session, path, &definition))
            .map_err(|e| task_error("update task", path, &e))
    }

    fn set_enabled(&self, path: &str, enabled: bool) -> Result<()> {
        let session = Session::connect()?;
        let registered = session
            .task(path)
            .map_err(|e| task_error("open task", path, &e))?;
        // SAFETY: `registered` is a live task from the connected service.
        unsafe { registered.SetEnabled(variant_bool(enabled)) }
            .map_err(|e| task_error("set task state", path, &e))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let session = Session::connect()?;
        let folder = session
            .folder(task_folder(path))
            .map_err(|e| task_error("open task folder", path, &e))?;
        let name = path.rsplit('\\').next().unwrap_or(path);
        // SAFETY: the folder is live; flags must be 0.
        unsafe { folder.DeleteTask(&BSTR::from(name), 0) }
            .map_err(|e| task_error("delete task", path, &e))
    }
}

/// Appends every task under `folder` and its subfolders.
///
/// Subfolders that cannot be read (usually access denied) are skipped.
fn collect(folder: &ITaskFolder, out: &mut Vec<RegisteredTask>) -> windows::core::Result<()> {
    // SAFETY: all calls below are on live COM objects from the same session;
    // collections are 1-based.
    let tasks = unsafe { folder.GetTasks(TASK_ENUM_HIDDEN.0)? };
    let count = unsafe { tasks.Count()? };
    for index in 1..=count {
        let task = unsafe { tasks.get_Item(&VARIANT::from(index))? };
        match read_task(&task) {
            Ok(task) => out.push(task),
            Err(e) => autorun_core::log_debug!("skipping unreadable task: {e}"),
        }
    }

    let folders = unsafe { folder.GetFolders(0)? };
    let count = unsafe { folders.Count()? };
    for index in 1..=count {
        let sub = unsafe { folders.get_Item(&VARIANT::from(index))? };
        if let Err(e) = collect(&sub, out) {
            let path = unsafe { sub.Path() }.map(|p| p.to_string()).unwrap_or_default();
            autorun_core::log_debug!("skipping task folder {path}: {e}");
        }
    }
    Ok(())
}

fn read_task(task: &IRegisteredTask) -> windows::core::Result<RegisteredTask> {
    // SAFETY: `task` is a live registered task; collections are 1-based.
    unsafe {
        let definition = task.Definition()?;

        let triggers = definition.Triggers()?;
        let mut kinds = Vec::new();
        for index in 1..=triggers.Count()? {
            let kind = match triggers.get_Item(index)?.Type()? {
                TASK_TRIGGER_LOGON => TriggerKind::Logon,
                TASK_TRIGGER_BOOT => TriggerKind::Boot,
                _ => TriggerKind::Other,
            };
            kinds.push(kind);
        }

        let exec_action = match first_action(&definition.Actions()?)? {
            Some(exec) => Some(ExecAction {
                path: exec.Path()?.to_string(),
                arguments: Some(exec.Arguments()?.to_string()).filter(|a| !a.is_empty()),
            }),
            None => None,
        };

        Ok(RegisteredTask {
            name: task.Name()?.to_string(),
            path: task.Path()?.to_string(),
            enabled: task.Enabled()?.as_bool(),
            triggers: kinds,
            exec_action,
        })
    }
}

/// The first action, if it is an exec action.
fn first_action(actions: &IActionCollection) -> windows::core::Result<Option<IExecAction>> {
    // SAFETY: `actions` is live; the index is within Count.
    unsafe {
        if actions.Count()? < 1 {
            return Ok(None);
        }
        Ok(actions.get_Item(1)?.cast::<IExecAction>().ok())
    }
}

/// The first exec action anywhere in the definition.
fn first_exec_action(definition: &ITaskDefinition) -> windows::core::Result<Option<IExecAction>> {
    // SAFETY: `definition` is live; indices are within Count.
    unsafe {
        let actions = definition.Actions()?;
        for index in 1..=actions.Count()? {
            if let Ok(exec) = actions.get_Item(index)?.cast::<IExecAction>() {
                return Ok(Some(exec));
            }
        }
        Ok(None)
    }
}

fn apply_action(exec: &IExecAction, action: &ExecAction) -> windows::core::Result<()> {
    // SAFETY: `exec` is a live action of a definition owned by the caller.
    unsafe {
        exec.SetPath(&BSTR::from(action.path.as_str()))?;
        exec.SetArguments(&BSTR::from(action.arguments.as_deref().unwrap_or_default()))
    }
}

fn register(session: &Session, task: &NewTask) -> windows::core::Result<()> {
    // SAFETY: every object comes from the connected service and is used on
    // this thread only.
    unsafe {
        let definition = session.service.NewTask(0)?;
        definition
            .RegistrationInfo()?
            .SetDescription(&BSTR::from(task.description.as_str()))?;
        definition
            .Principal()?
            .SetLogonType(TASK_LOGON_INTERACTIVE_TOKEN)?;
        definition.Triggers()?.Create(TASK_TRIGGER_LOGON)?;

        let exec: IExecAction = definition.Actions()?.Create(TASK_ACTION_EXEC)?.cast()?;
        apply_action(&exec, &task.action)?;

        let settings = definition.Settings()?;
        settings.SetStopIfGoingOnBatteries(VARIANT_FALSE)?;
        settings.SetDisallowStartIfOnBatteries(VARIANT_FALSE)?;
        settings.SetMultipleInstances(TASK_INSTANCES_IGNORE_NEW)?;
        settings.SetEnabled(variant_bool(task.enabled))?;

        let empty = VARIANT::default();
        session.folder("\\")?.RegisterTaskDefinition(
            &BSTR::from(task.name.as_str()),
            &definition,
            TASK_CREATE_OR_UPDATE.0,
            &empty,
            &empty,
            TASK_LOGON_INTERACTIVE_TOKEN,
            &empty,
        )?;
    }
    Ok(())
}

/// Re-registers an edited definition under its existing path and principal.
fn commit(session: &Session, path: &str, definition: &ITaskDefinition) -> windows::core::Result<()> {
    // SAFETY: as in `register`.
    unsafe {
        let principal = definition.Principal()?;
        let logon_type = principal.LogonType()?;
        let user = principal.UserId()?;
        let user = if user.is_empty() {
            VARIANT::default()
        } else {
            VARIANT::from(user)
        };
        let empty = VARIANT::default();
        session.folder("\\")?.RegisterTaskDefinition(
            &BSTR::from(path),
            definition,
            TASK_UPDATE.0,
            &user,
            &empty,
            logon_type,
            &empty,
        )?;
    }
    Ok(())
}

fn variant_bool(value: bool) -> VARIANT_BOOL {
    if value { VARIANT_TRUE } else { VARIANT_FALSE }
}

fn task_error(operation: &'static str, path: &str, error: &windows::core::Error) -> Error {
    let code = error.code();
    if code == ERROR_FILE_NOT_FOUND.to_hresult() || code == ERROR_PATH_NOT_FOUND.to_hresult() {
        return Error::not_found("scheduled task", path);
    }
    com_error(operation, path, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_walks_subfolders() {
        let tasks = WinTaskScheduler.tasks().unwrap();

        assert!(tasks.iter().all(|t| t.path.starts_with('\\')));
        assert!(tasks.iter().any(|t| t.path.matches('\\').count() > 1));
    }

    #[test]
    fn toggling_unknown_task_is_not_found() {
        let err = WinTaskScheduler
            .set_enabled(r"\autorun-test-no-such-task", true)
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn deleting_unknown_task_is_not_found() {
        let err = WinTaskScheduler
            .delete(r"\autorun-test-no-such-task")
            .unwrap_err();

        assert!(err.is_not_found());
    }
}
