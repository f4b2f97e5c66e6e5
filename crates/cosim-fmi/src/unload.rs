//! Releases the process runtime when the library is unloaded.
//!
//! On ELF targets a `.fini_array` entry runs during `dlclose` or process exit,
//! where joining the lifecycle thread is safe. On Windows the loader lock is
//! held in `DllMain`, so the lifecycle thread is detached instead of joined.

use cosim_runtime::Teardown;
use cosim_runtime::lifecycle;

/// Drops the library's reference to the process-wide runtime. Components
/// still alive keep it running until they are freed.
#[unsafe(no_mangle)]
pub extern "C" fn cosim_finalize_runtime() {
    let _ = std::panic::catch_unwind(|| lifecycle::finalize_process_runtime(Teardown::Join));
}

#[cfg(all(target_os = "linux", not(test)))]
#[used]
#[unsafe(link_section = ".fini_array")]
static FINALIZE_ON_UNLOAD: extern "C" fn() = on_unload;

#[cfg(all(target_os = "linux", not(test)))]
extern "C" fn on_unload() {
    let _ = std::panic::catch_unwind(|| lifecycle::finalize_process_runtime(Teardown::Join));
}

#[cfg(windows)]
mod windows {
    use std::os::raw::{c_int, c_ulong, c_void};

    use cosim_runtime::Teardown;
    use cosim_runtime::lifecycle;

    const DLL_PROCESS_DETACH: c_ulong = 0;

    #[unsafe(no_mangle)]
    extern "system" fn DllMain(_module: *mut c_void, reason: c_ulong, _reserved: *mut c_void) -> c_int {
        if reason == DLL_PROCESS_DETACH {
            let _ = std::panic::catch_unwind(|| {
                lifecycle::finalize_process_runtime(Teardown::Detach)
            });
        }
        1
    }
}
