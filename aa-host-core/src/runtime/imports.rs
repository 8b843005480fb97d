//! Host import definitions for the Wasmtime runtime.
//!
//! This module defines all the host functions imported by guest modules under the "env" module.

use super::UnitState;
use crate::abi::{ABI_VERSION, IMPORT_MODULE, host_imports};

use wasmtime::{Caller, Extern, Linker};

/// Longest guest log line forwarded to the host log, in bytes.
const MAX_LOG_LEN: usize = 1024;

/// Define all host imports expected by guests under module `"env"`.
///
/// Must be called before instantiating the module.
pub fn define_imports(linker: &mut Linker<UnitState>) -> Result<(), anyhow::Error> {
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::ABI_VERSION,
        |_caller: Caller<'_, UnitState>| -> u32 { ABI_VERSION },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::LOG,
        |mut caller: Caller<'_, UnitState>, ptr: u32, len: u32| {
            let Some(line) = read_guest_str(&mut caller, ptr, len) else {
                return;
            };
            tracing::info!(target: "aa_guest", module = %caller.data().module, "{line}");
        },
    )?;

    Ok(())
}

fn read_guest_str(caller: &mut Caller<'_, UnitState>, ptr: u32, len: u32) -> Option<String> {
    let memory = caller
        .get_export("memory")
        .and_then(Extern::into_memory)?;
    let start = ptr as usize;
    let end = start.checked_add((len as usize).min(MAX_LOG_LEN))?;
    let bytes = memory.data(&*caller).get(start..end)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}
