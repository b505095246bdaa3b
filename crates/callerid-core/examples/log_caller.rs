//! Attach caller metadata to log records.
//!
//! ```text
//! cargo run -p callerid-core --example log_caller
//! CALLERID_LOG_FORMAT=json cargo run -p callerid-core --example log_caller
//! ```

use std::hint::black_box;

use callerid_core::{caller_info, registry};
use callerid_utils::{info, init_logging, warn};

/// Logs `message` with the location of whoever called `log_here`.
#[inline(never)]
fn log_here(message: &str)
{
    match caller_info(1) {
        Ok(caller) => info!(
            caller = %caller,
            module = caller.module(),
            version = caller.module_version(),
            "{message}"
        ),
        Err(err) => warn!("{message} (caller unknown: {err})"),
    }
}

#[inline(never)]
fn handle_request(id: u32)
{
    log_here(&format!("handling request {id}"));
    black_box(id);
}

fn main() -> Result<(), Box<dyn std::error::Error>>
{
    init_logging()?;

    match registry().build_snapshot() {
        Some(build) => info!(
            main = %build.main_module(),
            dependencies = build.dependencies().len(),
            "attributing callers with the embedded dependency manifest"
        ),
        None => info!("no embedded dependency manifest; attributing callers by path"),
    }

    for id in 0..3 {
        handle_request(id);
    }
    info!(call_sites = registry().cached_call_sites(), "done");
    Ok(())
}
