use autorun_core::AutostartManager;

use super::{fail, resolve};
use crate::EntryArgs;

pub fn execute(manager: &AutostartManager, args: &EntryArgs) {
    let entry = resolve(manager, args);
    match manager.toggle(&entry) {
        Ok(true) => println!("Enabled {entry}."),
        Ok(false) => println!("Disabled {entry}."),
        Err(e) => fail(e),
    }
}
