use autorun_core::location::RegistryLocation;
use autorun_core::task::created_location;
use autorun_core::{AutostartEntry, AutostartManager, AutostartType, Hive};

use super::fail;
use crate::CreateArgs;

pub fn execute(manager: &AutostartManager, args: &CreateArgs) {
    let entry = build(args).unwrap_or_else(|e| fail(e));
    match manager.create(&entry) {
        Ok(()) => println!("Created {entry}."),
        Err(e) => fail(e),
    }
}

fn build(args: &CreateArgs) -> Result<AutostartEntry, String> {
    let mut entry = AutostartEntry::new(&args.name, &args.path, args.kind, "")
        .with_enabled(!args.disabled);
    if let Some(arguments) = &args.args {
        entry = entry.with_arguments(arguments);
    }

    entry.location = match (&args.location, args.kind) {
        (Some(location), _) => location.clone(),
        (None, AutostartType::Registry) => RegistryLocation::run_key(Hive::CurrentUser).to_string(),
        (None, AutostartType::ScheduledTask) => created_location(&entry),
        (None, AutostartType::ThirdPartyService) => {
            return Err("--location (the service name) is required for services".into());
        }
    };
    Ok(entry)
}
